// ==========================================
// 行数据同步导入 - 对账引擎
// ==========================================
// 职责: 解码行 → 按主键匹配实体 → 逐字段比较 → 暂存变更
//       → 汇总为 ChangeSet（新建 / 更新 / 删除 / 历史）
// 红线: 引擎不做持久化；暂存期间不修改实体，finish 时才写入新值
// ==========================================
// 流程:
// 1. 每个数据源按其主键字段重建索引（取实体当前值：暂存值优先）
// 2. 逐行: 表头 → should_import → 主键 → 新建/匹配 → 字段比较 → 源级校验
// 3. finish: 必填检查 → 任务级校验 → 历史记录 → 写入新值 → 删除候选
// ==========================================

use crate::domain::entity::{Entity, EntitySchema, HistoryEntity};
use crate::domain::value::FieldValue;
use crate::engine::factory::EntityFactory;
use crate::engine::hooks::{ImportHooks, StagedSummary};
use crate::engine::progress::ProgressSink;
use crate::engine::report::{ReconciliationCounters, SourceReport};
use crate::importer::coercion::CoercionRegistry;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_source::{FieldUpdates, ImportSource};
use crate::importer::row_decoder::{DecodedRow, DecodedRows, RowDecoder};
use crate::mapping::Mapping;
use crate::repository::{ChangeSet, EntityUpdate};
use chrono::Local;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

// ==========================================
// FinishOptions - 写入阶段策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishOptions {
    /// 被跟踪字段变化时写历史
    pub keep_history: bool,
    /// 删除未被任何数据源匹配的已有实体
    pub delete_unmatched: bool,
    /// 必填字段为空时拒绝该实体
    pub reject_null_required: bool,
}

impl Default for FinishOptions {
    fn default() -> Self {
        Self {
            keep_history: true,
            delete_unmatched: false,
            reject_null_required: true,
        }
    }
}

// ==========================================
// ReconciliationResult - 对账结果
// ==========================================
#[derive(Debug)]
pub struct ReconciliationResult<E, H> {
    pub counters: ReconciliationCounters,
    pub changes: ChangeSet<E, H>,
    /// 未匹配的已有实体（启用删除时已移入 changes.deleted）
    pub delete_candidates: Vec<E>,
}

// 工作集中的实体
#[derive(Debug)]
struct WorkingEntity<E> {
    entity: E,
    created_in_run: bool,
    /// 被任一数据源的行匹配过
    matched: bool,
    /// 曾进入某个数据源的主键索引
    indexed: bool,
    /// 本次运行中新建、之后被源级校验拒绝
    discarded: bool,
    /// 曾被源级校验拒绝
    rejected: bool,
    pending: FieldUpdates,
}

impl<E: Entity> WorkingEntity<E> {
    fn existing(entity: E) -> Self {
        Self {
            entity,
            created_in_run: false,
            matched: false,
            indexed: false,
            discarded: false,
            rejected: false,
            pending: FieldUpdates::new(),
        }
    }

    fn created(entity: E) -> Self {
        Self {
            created_in_run: true,
            matched: true,
            ..Self::existing(entity)
        }
    }

    /// 暂存值优先，否则为实体上的值
    fn current_value(&self, field: &str) -> FieldValue {
        match self.pending.get(field) {
            Some(value) => value.clone(),
            None => self.entity.field(field),
        }
    }

    // 丢弃与存储值相同的暂存字段
    fn drop_noop_updates(&mut self) {
        let noop: Vec<String> = self
            .pending
            .iter()
            .filter(|(field, update)| update.value == self.entity.field(field))
            .map(|(field, _)| field.to_string())
            .collect();
        for field in noop {
            self.pending.cancel(&field);
        }
    }
}

// ==========================================
// ReconciliationEngine
// ==========================================
/// 对账引擎（单次运行）
///
/// # 用法
/// 1. `new(existing, schema)`
/// 2. 对每个数据源调用 `reconcile_source`（按加入顺序）
/// 3. `finish` 得到计数与变更集
#[derive(Debug)]
pub struct ReconciliationEngine<E> {
    schema: EntitySchema,
    entities: Vec<WorkingEntity<E>>,
    /// 成功解码的数据行（不含表头），用于删除门控
    rows_decoded: usize,
}

impl<E: Entity> ReconciliationEngine<E> {
    /// # 参数
    /// - existing: 参与对账的已有实体
    /// - schema: 字段类型与必填约束
    pub fn new(existing: Vec<E>, schema: EntitySchema) -> Self {
        let entities = existing.into_iter().map(WorkingEntity::existing).collect();
        Self {
            schema,
            entities,
            rows_decoded: 0,
        }
    }

    /// 成功解码的数据行数（全部数据源）
    pub fn rows_decoded(&self) -> usize {
        self.rows_decoded
    }

    /// 当前暂存概况
    pub fn summary(&self) -> StagedSummary {
        let live = self.entities.iter().filter(|w| !w.discarded);
        let mut summary = StagedSummary::default();
        for working in live {
            summary.entities += 1;
            if working.created_in_run {
                summary.pending_creates += 1;
            } else if !working.pending.is_empty() {
                summary.pending_updates += 1;
            }
        }
        summary
    }

    /// 读取一个数据源并暂存变更
    ///
    /// # 参数
    /// - source: 数据源
    /// - factory: 新建实体用
    /// - coercions: 类型转换注册表
    /// - progress: 进度通知
    /// - cancel: 取消标志（每行检查一次）
    ///
    /// # 返回
    /// - Ok(SourceReport): 该数据源的计数
    /// - Err: 解码失败（AbortRun）/ 数据源读取失败 / 已取消
    pub fn reconcile_source<F>(
        &mut self,
        source: &dyn ImportSource,
        factory: &F,
        coercions: &CoercionRegistry,
        progress: &mut dyn ProgressSink,
        cancel: Option<&AtomicBool>,
    ) -> ImportResult<SourceReport>
    where
        F: EntityFactory<Entity = E> + ?Sized,
    {
        let name = source.name();
        let mapping = source.mapping();
        let mode = source.mode();
        let key_field = mapping.key_column_name();
        let mut report = SourceReport::new(name, mode);

        info!(source = name, mode = %mode, key_field, "开始对账数据源");
        progress.source_started(name);

        // 索引: 主键 → 工作集下标；同键多实体时后者覆盖前者
        // unseen 含全部进入索引的实体（包括被同键覆盖的）
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut unseen: BTreeSet<usize> = BTreeSet::new();
        for (idx, working) in self.entities.iter_mut().enumerate() {
            if working.discarded {
                continue;
            }
            if let Some(key) = mapping.normalize_key(&working.current_value(key_field)) {
                working.indexed = true;
                unseen.insert(idx);
                if let Some(shadowed) = index.insert(key, idx) {
                    debug!(source = name, shadowed, kept = idx, "已有实体主键重复");
                }
            }
        }

        let column_names = source.column_names()?;
        let decoder = RowDecoder::new(mapping, &self.schema, coercions)
            .with_column_names(&column_names)
            .map_err(|message| ImportError::SourceError {
                source_name: name.to_string(),
                message,
            })?;
        let mut rows = DecodedRows::new(
            source.open()?,
            decoder,
            name,
            source.decode_error_policy(),
        );

        loop {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                warn!(source = name, "导入已取消");
                return Err(ImportError::Cancelled {
                    source_name: name.to_string(),
                });
            }

            let Some(row) = rows.next() else {
                break;
            };
            let row = row?;
            let row_index = row.row_index();
            progress.row_processed(name, row_index + 1);
            self.rows_decoded += 1;

            if !source.should_import(&row) {
                report.ignored += 1;
                continue;
            }

            let key = row.get(key_field).and_then(|value| mapping.normalize_key(value));
            let Some(key) = key else {
                warn!(source = name, row = row_index, key_field, "主键为空,已跳过");
                report.ignored_missing_key += 1;
                continue;
            };

            let (idx, creating) = match index.get(&key) {
                Some(&idx) => {
                    self.entities[idx].matched = true;
                    unseen.remove(&idx);
                    if !mode.allows_update() {
                        report.ignored_not_updated += 1;
                        continue;
                    }
                    (idx, false)
                }
                None => {
                    if !mode.allows_create() {
                        debug!(source = name, row = row_index, key = %key, "模式不允许新建");
                        report.ignored_not_created += 1;
                        continue;
                    }
                    self.entities
                        .push(WorkingEntity::created(factory.create_model()));
                    (self.entities.len() - 1, true)
                }
            };

            stage_row(&mut self.entities[idx], &row, mapping, creating);
            report.read += 1;

            let working = &self.entities[idx];
            let needs_validation = working.created_in_run || !working.pending.is_empty();
            if needs_validation
                && !source.validate_updates(&working.entity, &row, &working.pending, creating)
            {
                debug!(source = name, row = row_index, key = %key, creating, "数据源校验拒绝");
                report.rejected += 1;
                if creating {
                    self.entities.pop();
                    continue;
                }
                let working = &mut self.entities[idx];
                working.pending.clear();
                working.rejected = true;
                if working.created_in_run {
                    working.discarded = true;
                    index.remove(&key);
                }
                continue;
            }

            if creating {
                index.insert(key, idx);
            }
        }
        report.header_rows = rows.header_rows();
        report.decode_errors = rows.decode_errors();

        for &idx in &unseen {
            let working = &mut self.entities[idx];
            source.on_data_not_found(&working.entity, &mut working.pending);
            working.drop_noop_updates();
        }
        report.not_found = unseen.len();

        progress.source_finished(&report);
        Ok(report)
    }

    /// 写入阶段：校验并应用全部暂存变更
    ///
    /// # 参数
    /// - factory: 创建历史记录用
    /// - hooks: 任务级校验
    /// - options: 历史 / 删除 / 必填策略
    /// - progress: 进度通知
    ///
    /// # 返回
    /// 计数 + 变更集 + 删除候选
    pub fn finish<F>(
        self,
        factory: &F,
        hooks: &dyn ImportHooks<E, F::History>,
        options: FinishOptions,
        progress: &mut dyn ProgressSink,
    ) -> ReconciliationResult<E, F::History>
    where
        F: EntityFactory<Entity = E> + ?Sized,
    {
        let ReconciliationEngine {
            schema,
            entities,
            rows_decoded,
        } = self;

        let recorded_at = Local::now().naive_local();
        let total = entities.len();
        let mut counters = ReconciliationCounters::default();
        let mut changes = ChangeSet::new();
        let mut candidates = Vec::new();

        for (done, mut working) in entities.into_iter().enumerate() {
            progress.applying(done + 1, total);

            if working.discarded {
                continue;
            }

            let creating = working.created_in_run;
            if !creating && working.pending.is_empty() {
                if working.matched {
                    if !working.rejected {
                        counters.unchanged += 1;
                    }
                } else if working.indexed {
                    candidates.push(working.entity);
                }
                continue;
            }

            if options.reject_null_required {
                let missing = schema
                    .required_fields()
                    .find(|field| working.current_value(field).is_null());
                if let Some(field) = missing {
                    warn!(field, creating, "必填字段为空,拒绝写入");
                    counters.rejected += 1;
                    continue;
                }
            }

            if !hooks.validate_updates(&working.entity, &working.pending, creating) {
                debug!(creating, "任务校验拒绝");
                counters.rejected += 1;
                continue;
            }

            let has_tracked = working.pending.iter().any(|(_, update)| update.tracked);
            let mut history = if !creating && options.keep_history && has_tracked {
                factory.create_history_model(&working.entity)
            } else {
                None
            };

            let mut changed_fields = Vec::with_capacity(working.pending.len());
            let mut previous_values = BTreeMap::new();
            for (field, update) in working.pending.drain() {
                let old = working.entity.field(&field);
                if update.tracked {
                    if let Some(history) = history.as_mut() {
                        history.record_change(&field, old.clone(), update.value.clone());
                    }
                }
                working.entity.set_field(&field, update.value);
                previous_values.insert(field.clone(), old);
                changed_fields.push(field);
            }

            if creating {
                counters.created += 1;
                changes.created.push(working.entity);
                continue;
            }

            counters.updated += 1;
            if let Some(mut history) = history {
                history.set_recorded_at(recorded_at);
                changes.history.push(history);
                counters.history_created += 1;
            }
            changes.updated.push(EntityUpdate {
                entity: working.entity,
                changed_fields,
                previous_values,
            });
        }

        counters.delete_candidates = candidates.len();
        let delete_candidates = if options.delete_unmatched && rows_decoded > 0 {
            counters.deleted = candidates.len();
            changes.deleted = candidates;
            Vec::new()
        } else {
            if options.delete_unmatched && !candidates.is_empty() {
                warn!(candidates = candidates.len(), "未读取到任何数据行,跳过删除");
            }
            candidates
        };

        info!(
            created = counters.created,
            updated = counters.updated,
            unchanged = counters.unchanged,
            rejected = counters.rejected,
            history_created = counters.history_created,
            deleted = counters.deleted,
            "对账完成"
        );

        ReconciliationResult {
            counters,
            changes,
            delete_candidates,
        }
    }
}

// 逐字段比较一行与实体当前值，暂存差异
fn stage_row<E: Entity>(
    working: &mut WorkingEntity<E>,
    row: &DecodedRow,
    mapping: &Mapping,
    creating: bool,
) {
    for binding in mapping.bindings() {
        let field = binding.name();
        if !creating && !binding.should_update() {
            continue;
        }
        let Some(new_value) = row.get(field) else {
            continue;
        };

        let current = working.current_value(field);
        if !creating && binding.update_only_if_null() && !current.is_null() {
            continue;
        }
        if binding.values_equal(new_value, &current) {
            continue;
        }

        // 回到存储值 = 撤销之前的暂存
        let stored = working.entity.field(field);
        if binding.values_equal(new_value, &stored) {
            working.pending.cancel(field);
            continue;
        }

        let tracked = binding.keep_history() && !creating;
        working.pending.stage(field, new_value.clone(), tracked);
    }
}
