// ==========================================
// 行数据同步导入 - 仓储层
// ==========================================
// 职责: 已有实体加载 + 变更集原子提交
// 红线: Repository 不含对账规则，只做数据读写
// ==========================================

pub mod entity_store;
pub mod error;
pub mod memory_store;
pub mod sqlite_store;

pub use entity_store::{ChangeSet, EntityStore, EntityUpdate};
pub use error::{RepositoryError, RepositoryResult};
pub use memory_store::InMemoryStore;
pub use sqlite_store::{quote_ident, ColumnInfo, SqliteEntityStore};
