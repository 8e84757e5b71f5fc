// ==========================================
// 行数据同步导入 - 任务钩子
// ==========================================
// 时机: pre_process → select_existing → (读取数据源) → post_process
//       → validate_updates（逐实体）→ pre_commit → (提交) → post_commit
// 返回: 各阶段的统计会汇总进 ImportReport::hook_stats
// ==========================================

use crate::importer::FieldUpdates;
use crate::repository::ChangeSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 钩子统计（名称 → 数量）
pub type HookStats = BTreeMap<String, i64>;

/// 读取全部数据源后的暂存概况
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedSummary {
    /// 工作集中的实体数（已有 + 新建）
    pub entities: usize,
    /// 待新建
    pub pending_creates: usize,
    /// 有待写入字段的已有实体
    pub pending_updates: usize,
}

// ==========================================
// ImportHooks Trait
// ==========================================
pub trait ImportHooks<E, H> {
    /// 读取数据源之前
    fn pre_process(&mut self) -> anyhow::Result<HookStats> {
        Ok(HookStats::new())
    }

    /// 筛选参与对账的已有实体（默认全部）
    fn select_existing(&mut self, existing: Vec<E>) -> anyhow::Result<Vec<E>> {
        Ok(existing)
    }

    /// 全部数据源读取完成、写入之前
    fn post_process(&mut self, _staged: &StagedSummary) -> anyhow::Result<HookStats> {
        Ok(HookStats::new())
    }

    /// 任务级校验（在必填检查之后）；false = 拒绝该实体的全部变更
    fn validate_updates(&self, _entity: &E, _updates: &FieldUpdates, _creating: bool) -> bool {
        true
    }

    /// 提交之前（试运行同样调用）
    fn pre_commit(&mut self, _changes: &ChangeSet<E, H>) -> anyhow::Result<HookStats> {
        Ok(HookStats::new())
    }

    /// 提交之后（试运行同样调用）
    fn post_commit(&mut self, _changes: &ChangeSet<E, H>) -> anyhow::Result<HookStats> {
        Ok(HookStats::new())
    }
}

/// 无钩子
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl<E, H> ImportHooks<E, H> for NoHooks {}
