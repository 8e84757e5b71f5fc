// ==========================================
// 行数据同步导入 - 字段值
// ==========================================
// 职责: 单元格/实体字段的统一值类型
// 存储: 与 SQLite 值互转（ToSql / from_sql_ref）
// ==========================================

use crate::domain::types::FieldType;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 日期存储格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// 日期时间存储格式
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// 时间存储格式
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// 整数值且落在 i64 范围内的浮点数 → i64
///
/// i64::MAX as f64 即 2^63，本身已越界，故上界取开区间
pub fn whole_float_as_i64(value: f64) -> Option<i64> {
    let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
    if value.fract() == 0.0 && in_range {
        Some(value as i64)
    } else {
        None
    }
}

// ==========================================
// FieldValue - 字段值
// ==========================================
// 来源:
// - 文本源（CSV/Excel）: 一律为 Text，解码时按声明类型转换
// - 结构化源（SQL 查询）: 已带类型
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
}

impl FieldValue {
    /// 文本值快捷构造
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// "空值"判定（用于 warn_if_empty）
    ///
    /// NULL / 空白文本 / false / 0 视为空
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Bool(b) => !b,
            FieldValue::Int(i) => *i == 0,
            FieldValue::Float(f) => *f == 0.0,
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Date(_) | FieldValue::DateTime(_) | FieldValue::Time(_) => false,
        }
    }

    /// 文本视图（仅 Text 返回 Some）
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// 默认主键归一化
    ///
    /// # 规则
    /// - NULL / 空白文本 → None（无主键）
    /// - 文本去首尾空白
    /// - 整数值的浮点数按整数输出（1.0 → "1"），与整型主键对齐
    pub fn key_string(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            FieldValue::Float(f) => match whole_float_as_i64(*f) {
                Some(i) => Some(i.to_string()),
                None => Some(f.to_string()),
            },
            other => Some(other.to_string()),
        }
    }

    /// 从 SQLite 读取值，按声明类型还原
    ///
    /// 未声明类型时按存储类原样映射（INTEGER → Int, REAL → Float, TEXT → Text）
    pub fn from_sql_ref(value: ValueRef<'_>, declared: Option<&FieldType>) -> FieldValue {
        let raw = match value {
            ValueRef::Null => return FieldValue::Null,
            ValueRef::Integer(i) => FieldValue::Int(i),
            ValueRef::Real(f) => FieldValue::Float(f),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                FieldValue::Text(String::from_utf8_lossy(bytes).into_owned())
            }
        };

        match (declared, raw) {
            (Some(FieldType::Bool), FieldValue::Int(i)) => FieldValue::Bool(i != 0),
            (Some(FieldType::Float), FieldValue::Int(i)) => FieldValue::Float(i as f64),
            (Some(FieldType::Date), FieldValue::Text(s)) => NaiveDate::parse_from_str(&s, DATE_FORMAT)
                .map(FieldValue::Date)
                .unwrap_or(FieldValue::Text(s)),
            (Some(FieldType::DateTime), FieldValue::Text(s)) => {
                NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT)
                    .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S"))
                    .map(FieldValue::DateTime)
                    .unwrap_or(FieldValue::Text(s))
            }
            (Some(FieldType::Time), FieldValue::Text(s)) => NaiveTime::parse_from_str(&s, TIME_FORMAT)
                .map(FieldValue::Time)
                .unwrap_or(FieldValue::Text(s)),
            (_, raw) => raw,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            FieldValue::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            FieldValue::Time(t) => write!(f, "{}", t.format(TIME_FORMAT)),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

// 日期类统一写为文本，与 from_sql_ref 的解析格式一致
impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            FieldValue::Null => ToSqlOutput::Owned(Value::Null),
            FieldValue::Bool(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            FieldValue::Int(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            FieldValue::Float(f) => ToSqlOutput::Owned(Value::Real(*f)),
            FieldValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            FieldValue::Date(_) | FieldValue::DateTime(_) | FieldValue::Time(_) => {
                ToSqlOutput::Owned(Value::Text(self.to_string()))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_string_normalization() {
        assert_eq!(FieldValue::Null.key_string(), None);
        assert_eq!(FieldValue::text("   ").key_string(), None);
        assert_eq!(FieldValue::text(" A1 ").key_string(), Some("A1".to_string()));
        assert_eq!(FieldValue::Int(3).key_string(), Some("3".to_string()));
        assert_eq!(FieldValue::Float(3.0).key_string(), Some("3".to_string()));
        assert_eq!(FieldValue::Float(3.5).key_string(), Some("3.5".to_string()));
        // 超出 i64 范围的整数值不截断
        assert_eq!(
            FieldValue::Float(1e20).key_string(),
            Some("100000000000000000000".to_string())
        );
    }

    #[test]
    fn test_is_empty() {
        assert!(FieldValue::Null.is_empty());
        assert!(FieldValue::text("").is_empty());
        assert!(FieldValue::Int(0).is_empty());
        assert!(!FieldValue::text("x").is_empty());
        assert!(!FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()).is_empty());
    }

    #[test]
    fn test_from_sql_ref_with_declared_type() {
        assert_eq!(
            FieldValue::from_sql_ref(ValueRef::Integer(1), Some(&FieldType::Bool)),
            FieldValue::Bool(true)
        );
        assert_eq!(
            FieldValue::from_sql_ref(ValueRef::Text(b"2024-03-05"), Some(&FieldType::Date)),
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap())
        );
        assert_eq!(
            FieldValue::from_sql_ref(ValueRef::Integer(7), None),
            FieldValue::Int(7)
        );
        assert_eq!(FieldValue::from_sql_ref(ValueRef::Null, None), FieldValue::Null);
    }

    #[test]
    fn test_serde_tagged() {
        let json = serde_json::to_string(&FieldValue::Int(5)).unwrap();
        assert_eq!(json, r#"{"type":"int","value":5}"#);
        let back: FieldValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FieldValue::Int(5));
    }
}
