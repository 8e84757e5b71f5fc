// ==========================================
// 行数据同步导入 - 导入报告
// ==========================================
// 内容: 数据源级计数 + 对账计数 + 钩子统计
// 输出: serde 序列化（JSON）
// ==========================================

use crate::domain::types::ImportMode;
use crate::engine::hooks::HookStats;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// SourceReport - 单个数据源的读取统计
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    pub name: String,
    pub mode: ImportMode,
    /// 参与对账的行（新建或匹配到实体）
    pub read: usize,
    /// 跳过的表头行
    pub header_rows: usize,
    /// should_import 过滤掉的行
    pub ignored: usize,
    pub ignored_missing_key: usize,
    /// 模式不允许新建
    pub ignored_not_created: usize,
    /// 模式不允许更新
    pub ignored_not_updated: usize,
    /// 解码失败且按 SkipRow 跳过的行
    pub decode_errors: usize,
    /// 源级校验拒绝
    pub rejected: usize,
    /// 已有实体未出现在本数据源中
    pub not_found: usize,
}

impl SourceReport {
    pub fn new(name: impl Into<String>, mode: ImportMode) -> Self {
        Self {
            name: name.into(),
            mode,
            ..Self::default()
        }
    }

    /// 未参与对账的数据行
    pub fn skipped(&self) -> usize {
        self.ignored
            + self.ignored_missing_key
            + self.ignored_not_created
            + self.ignored_not_updated
            + self.decode_errors
            + self.rejected
    }
}

// ==========================================
// ReconciliationCounters - 对账计数
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationCounters {
    pub created: usize,
    pub updated: usize,
    /// 被匹配但无有效变化的已有实体
    pub unchanged: usize,
    /// 写入前被拒绝（必填为空 / 任务级校验）
    pub rejected: usize,
    pub history_created: usize,
    pub deleted: usize,
    /// 未被任何数据源匹配的已有实体
    pub delete_candidates: usize,
}

// ==========================================
// ImportReport - 一次导入的结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub run_id: String,
    pub dry_run: bool,
    pub started_at: NaiveDateTime,
    pub elapsed_ms: u64,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub rejected: usize,
    pub history_created: usize,
    pub deleted: usize,
    pub delete_candidates: usize,
    pub sources: Vec<SourceReport>,
    /// 钩子名 → 钩子返回的统计
    pub hook_stats: BTreeMap<String, HookStats>,
}

impl ImportReport {
    pub(crate) fn new(run_id: String, dry_run: bool, started_at: NaiveDateTime) -> Self {
        Self {
            run_id,
            dry_run,
            started_at,
            elapsed_ms: 0,
            created: 0,
            updated: 0,
            unchanged: 0,
            rejected: 0,
            history_created: 0,
            deleted: 0,
            delete_candidates: 0,
            sources: Vec::new(),
            hook_stats: BTreeMap::new(),
        }
    }

    pub(crate) fn apply_counters(&mut self, counters: &ReconciliationCounters) {
        self.created = counters.created;
        self.updated = counters.updated;
        self.unchanged = counters.unchanged;
        self.rejected = counters.rejected;
        self.history_created = counters.history_created;
        self.deleted = counters.deleted;
        self.delete_candidates = counters.delete_candidates;
    }

    pub fn counters(&self) -> ReconciliationCounters {
        ReconciliationCounters {
            created: self.created,
            updated: self.updated,
            unchanged: self.unchanged,
            rejected: self.rejected,
            history_created: self.history_created,
            deleted: self.deleted,
            delete_candidates: self.delete_candidates,
        }
    }

    /// 全部数据源中未参与对账的行
    pub fn skipped(&self) -> usize {
        self.sources.iter().map(SourceReport::skipped).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
