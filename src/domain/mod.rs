// ==========================================
// 行数据同步导入 - 领域模型层
// ==========================================
// 职责: 字段值、实体接口、字段声明类型
// 红线: 不含数据访问逻辑,不含对账逻辑
// ==========================================

pub mod entity;
pub mod record;
pub mod types;
pub mod value;

// 重导出核心类型
pub use entity::{
    Entity, EntitySchema, HistoryEntity, HISTORY_DATE_FIELD, HISTORY_NEW_PREFIX,
    HISTORY_OLD_PREFIX,
};
pub use record::Record;
pub use types::{DateOrder, FieldKind, FieldType, ImportMode};
pub use value::FieldValue;
