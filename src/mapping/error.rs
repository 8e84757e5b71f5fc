// ==========================================
// 行数据同步导入 - 映射配置错误
// ==========================================
// 时机: Mapping 构建时立即报告（任何导入开始之前）
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 映射配置错误（ConfigurationError）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("字段名为空")]
    EmptyFieldName,

    #[error("字段重复定义: {0}")]
    DuplicateField(String),

    #[error("列号重复 (字段 {field}): 第 {column} 列已被字段 {existing} 使用")]
    DuplicateColumn {
        field: String,
        column: usize,
        existing: String,
    },

    #[error("列号非递增 (字段 {field}): 第 {column} 列位于第 {previous} 列之后")]
    ColumnOutOfOrder {
        field: String,
        column: usize,
        previous: usize,
    },

    #[error("列名无效 (字段 {field}): {column}")]
    InvalidColumnRef { field: String, column: String },

    #[error("计算字段缺少输入列: {0}")]
    EmptyComputedColumns(String),

    #[error("按名绑定的列名为空 (字段 {0})")]
    EmptyColumnName(String),

    #[error("主键字段不唯一: {first} / {second}")]
    MultipleKeyFields { first: String, second: String },

    #[error("主键声明冲突: 指定为 {declared}，但字段 {flagged} 标记为主键")]
    KeyConflict { declared: String, flagged: String },

    #[error("映射中找不到主键字段: {0}")]
    KeyFieldNotFound(String),

    #[error("表头行号无效: {0}（应 >= -1）")]
    InvalidHeaderLine(i64),
}
