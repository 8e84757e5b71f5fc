// ==========================================
// 行数据同步导入 - 导入任务
// ==========================================
// 职责: 编排一次完整导入
//       pre_process → 加载已有实体 → 逐个数据源对账 → post_process
//       → finish → pre_commit → 原子提交（试运行跳过）→ post_commit
// 红线: 任一步骤出错即返回 Err，不做部分写入
// ==========================================

use crate::config::ImportConfig;
use crate::engine::factory::EntityFactory;
use crate::engine::hooks::{HookStats, ImportHooks, NoHooks};
use crate::engine::progress::{ProgressSink, TracingProgress};
use crate::engine::reconciliation::ReconciliationEngine;
use crate::engine::report::ImportReport;
use crate::importer::coercion::CoercionRegistry;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_source::ImportSource;
use crate::repository::EntityStore;
use chrono::Local;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

type Hooks<S> = Box<dyn ImportHooks<<S as EntityStore>::Entity, <S as EntityStore>::History>>;

// ==========================================
// ImportTask
// ==========================================
/// 一次导入任务（数据源按加入顺序处理）
///
/// # 示例
/// ```
/// use rowsync::config::ImportConfig;
/// use rowsync::domain::Record;
/// use rowsync::engine::{FnFactory, ImportTask};
/// use rowsync::importer::MemorySource;
/// use rowsync::mapping::Mapping;
/// use rowsync::repository::InMemoryStore;
///
/// let mapping = Mapping::builder().auto("id").auto("name").build().unwrap();
/// let source = MemorySource::from_text_rows(
///     "people",
///     mapping,
///     vec![vec!["id", "name"], vec!["1", "Anna"]],
/// );
///
/// let store: InMemoryStore<Record, Record> = InMemoryStore::new("id");
/// let mut task = ImportTask::new(store, FnFactory::new(Record::new), ImportConfig::default())
///     .add_source(Box::new(source));
///
/// let report = task.run().unwrap();
/// assert_eq!(report.created, 1);
/// assert_eq!(task.store().entities().len(), 1);
/// ```
pub struct ImportTask<S, F>
where
    S: EntityStore,
    F: EntityFactory<Entity = S::Entity, History = S::History>,
{
    store: S,
    factory: F,
    config: ImportConfig,
    sources: Vec<Box<dyn ImportSource>>,
    hooks: Hooks<S>,
    progress: Box<dyn ProgressSink>,
    coercions: CoercionRegistry,
    cancel: Option<Arc<AtomicBool>>,
}

impl<S, F> ImportTask<S, F>
where
    S: EntityStore,
    F: EntityFactory<Entity = S::Entity, History = S::History>,
{
    /// # 参数
    /// - store: 实体存储
    /// - factory: 新建实体 / 历史记录
    /// - config: 运行策略
    pub fn new(store: S, factory: F, config: ImportConfig) -> Self {
        let progress = TracingProgress::new(config.progress_every);
        let coercions = CoercionRegistry::new(config.date_order);
        Self {
            store,
            factory,
            config,
            sources: Vec::new(),
            hooks: Box::new(NoHooks),
            progress: Box::new(progress),
            coercions,
            cancel: None,
        }
    }

    pub fn add_source(mut self, source: Box<dyn ImportSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_hooks<K>(mut self, hooks: K) -> Self
    where
        K: ImportHooks<S::Entity, S::History> + 'static,
    {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn with_progress<P>(mut self, progress: P) -> Self
    where
        P: ProgressSink + 'static,
    {
        self.progress = Box::new(progress);
        self
    }

    /// 替换类型转换注册表（默认按 config.date_order 构造）
    pub fn with_coercions(mut self, coercions: CoercionRegistry) -> Self {
        self.coercions = coercions;
        self
    }

    /// 设置后在下一行读取前中止导入
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// 执行导入
    ///
    /// # 返回
    /// - Ok(ImportReport): 计数与各数据源统计
    /// - Err(ImportError): 解码 / 数据源 / 钩子 / 取消 / 持久化失败，存储不变
    #[instrument(skip(self), fields(sources = self.sources.len(), dry_run = self.config.dry_run))]
    pub fn run(&mut self) -> ImportResult<ImportReport> {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        let mut report = ImportReport::new(
            run_id.clone(),
            self.config.dry_run,
            Local::now().naive_local(),
        );
        info!(run_id = %run_id, "开始导入");

        let stats = self
            .hooks
            .pre_process()
            .map_err(|e| ImportError::hook("pre_process", e))?;
        record_stats(&mut report, "pre_process", stats);

        // 1. 已有实体
        let schema = self.store.schema()?;
        let existing = self.store.load_all()?;
        let loaded = existing.len();
        let existing = self
            .hooks
            .select_existing(existing)
            .map_err(|e| ImportError::hook("select_existing", e))?;
        info!(loaded, selected = existing.len(), "已加载已有实体");

        // 2. 逐个数据源对账
        let mut engine = ReconciliationEngine::new(existing, schema);
        let cancel = self.cancel.as_deref();
        for source in &self.sources {
            let source_report = engine.reconcile_source(
                source.as_ref(),
                &self.factory,
                &self.coercions,
                self.progress.as_mut(),
                cancel,
            )?;
            report.sources.push(source_report);
        }

        let staged = engine.summary();
        info!(
            rows = engine.rows_decoded(),
            pending_creates = staged.pending_creates,
            pending_updates = staged.pending_updates,
            "数据源读取完成"
        );
        let stats = self
            .hooks
            .post_process(&staged)
            .map_err(|e| ImportError::hook("post_process", e))?;
        record_stats(&mut report, "post_process", stats);

        // 3. 校验并应用暂存变更
        let result = engine.finish(
            &self.factory,
            self.hooks.as_ref(),
            self.config.finish_options(),
            self.progress.as_mut(),
        );
        report.apply_counters(&result.counters);

        let stats = self
            .hooks
            .pre_commit(&result.changes)
            .map_err(|e| ImportError::hook("pre_commit", e))?;
        record_stats(&mut report, "pre_commit", stats);

        // 4. 提交
        if self.config.dry_run {
            info!(changes = result.changes.len(), "试运行,跳过提交");
        } else if !result.changes.is_empty() {
            if let Err(e) = self.store.persist(&result.changes) {
                warn!(error = %e, "提交失败,已回滚");
                return Err(e.into());
            }
        }

        let stats = self
            .hooks
            .post_commit(&result.changes)
            .map_err(|e| ImportError::hook("post_commit", e))?;
        record_stats(&mut report, "post_commit", stats);

        report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            run_id = %run_id,
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            rejected = report.rejected,
            skipped = report.skipped(),
            elapsed_ms = report.elapsed_ms,
            "导入完成"
        );
        Ok(report)
    }
}

fn record_stats(report: &mut ImportReport, hook: &str, stats: HookStats) {
    if !stats.is_empty() {
        report.hook_stats.insert(hook.to_string(), stats);
    }
}
