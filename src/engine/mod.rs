// ==========================================
// 行数据同步导入 - 引擎层
// ==========================================
// 职责: 对账规则 + 导入任务编排
// 红线: Engine 不拼 SQL，持久化只经由 EntityStore
// ==========================================

pub mod factory;
pub mod hooks;
pub mod import_task;
pub mod progress;
pub mod reconciliation;
pub mod report;

// 重导出核心引擎
pub use factory::{EntityFactory, FnFactory};
pub use hooks::{HookStats, ImportHooks, NoHooks, StagedSummary};
pub use import_task::ImportTask;
pub use progress::{NoProgress, ProgressSink, TracingProgress};
pub use reconciliation::{FinishOptions, ReconciliationEngine, ReconciliationResult};
pub use report::{ImportReport, ReconciliationCounters, SourceReport};
