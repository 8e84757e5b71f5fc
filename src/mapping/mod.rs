// ==========================================
// 行数据同步导入 - 映射层
// ==========================================
// 职责: 声明输入列 → 实体字段的绑定、主键字段、表头行
// ==========================================

pub mod binding;
pub mod columns;
pub mod definition;
pub mod error;

pub use binding::{BindingSource, Comparator, Computer, FieldBinding, FieldOptions, Parser};
pub use columns::{column_index, column_name};
pub use definition::{
    KeyNormalizer, Mapping, MappingBuilder, DEFAULT_HEADER_LINE, DEFAULT_KEY_FIELD, NO_HEADER,
};
pub use error::MappingError;
