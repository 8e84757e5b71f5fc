// ==========================================
// 行数据同步导入 - 领域类型定义
// ==========================================
// 职责: 字段声明类型、导入模式、日期顺序
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 字段声明类型 (Field Type)
// ==========================================
// 来源: 实体 schema（如 SQLite 列声明类型）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldType {
    Bool,
    Int,
    Float,
    Text { max_len: Option<usize> },
    Date,
    DateTime,
    Time,
}

impl FieldType {
    /// 无长度限制的文本
    pub fn text() -> Self {
        FieldType::Text { max_len: None }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            FieldType::Bool => FieldKind::Bool,
            FieldType::Int => FieldKind::Int,
            FieldType::Float => FieldKind::Float,
            FieldType::Text { .. } => FieldKind::Text,
            FieldType::Date => FieldKind::Date,
            FieldType::DateTime => FieldKind::DateTime,
            FieldType::Time => FieldKind::Time,
        }
    }

    /// 由 SQL 声明类型推断（SQLite 亲和性规则的简化版）
    ///
    /// # 示例
    /// - "INTEGER" → Int
    /// - "VARCHAR(10)" → Text { max_len: Some(10) }
    /// - "DATETIME" / "TIMESTAMP" → DateTime
    pub fn from_sql_decl(decl: &str) -> FieldType {
        let upper = decl.trim().to_uppercase();

        if upper.starts_with("BOOL") {
            FieldType::Bool
        } else if upper.contains("DATETIME") || upper.contains("TIMESTAMP") {
            FieldType::DateTime
        } else if upper.contains("DATE") {
            FieldType::Date
        } else if upper.contains("TIME") {
            FieldType::Time
        } else if upper.contains("INT") {
            FieldType::Int
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            FieldType::Text {
                max_len: parse_length(&upper),
            }
        } else if upper.contains("REAL")
            || upper.contains("FLOA")
            || upper.contains("DOUB")
            || upper.contains("NUMERIC")
            || upper.contains("DECIMAL")
        {
            FieldType::Float
        } else {
            FieldType::text()
        }
    }
}

// "VARCHAR(10)" → Some(10)
fn parse_length(decl: &str) -> Option<usize> {
    let start = decl.find('(')?;
    let end = decl[start..].find(')')? + start;
    decl[start + 1..end].trim().parse().ok()
}

// ==========================================
// 类型族 (Field Kind)
// ==========================================
// 用途: 类型转换策略注册表的键（不含长度等参数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Bool,
    Int,
    Float,
    Text,
    Date,
    DateTime,
    Time,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Bool => write!(f, "bool"),
            FieldKind::Int => write!(f, "int"),
            FieldKind::Float => write!(f, "float"),
            FieldKind::Text => write!(f, "text"),
            FieldKind::Date => write!(f, "date"),
            FieldKind::DateTime => write!(f, "datetime"),
            FieldKind::Time => write!(f, "time"),
        }
    }
}

// ==========================================
// 导入模式 (Import Mode)
// ==========================================
// 控制数据源是否允许新建 / 更新实体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportMode {
    Create,
    Update,
    #[default]
    CreateAndUpdate,
}

impl ImportMode {
    pub fn allows_create(self) -> bool {
        matches!(self, ImportMode::Create | ImportMode::CreateAndUpdate)
    }

    pub fn allows_update(self) -> bool {
        matches!(self, ImportMode::Update | ImportMode::CreateAndUpdate)
    }
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportMode::Create => write!(f, "CREATE"),
            ImportMode::Update => write!(f, "UPDATE"),
            ImportMode::CreateAndUpdate => write!(f, "CREATE_AND_UPDATE"),
        }
    }
}

// ==========================================
// 日期顺序 (Date Order)
// ==========================================
// 用于解析 "01/02/2024" 一类有歧义的日期
// 按首选顺序解析失败时回退到另一种顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DateOrder {
    #[default]
    DayFirst,
    MonthFirst,
}
