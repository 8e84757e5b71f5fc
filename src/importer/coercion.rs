// ==========================================
// 行数据同步导入 - 类型转换策略
// ==========================================
// 职责: 按实体 schema 声明类型把原始单元格转换为字段值
// 设计: 注册表（类型族 → 转换函数），调用方可整体替换某类转换
// 红线: schema 未声明的字段原样透传
// ==========================================

use crate::domain::types::{DateOrder, FieldKind, FieldType};
use crate::domain::value::{whole_float_as_i64, FieldValue, TIME_FORMAT};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 转换函数: (原始值, 声明类型) → 字段值 / 错误描述
pub type Coercer = Arc<dyn Fn(&FieldValue, &FieldType) -> Result<FieldValue, String> + Send + Sync>;

/// 表示"无上限"的日期时间哨兵值
pub const MAX_DATETIME_SENTINEL: &str = "10000-01-01 0:00:00";

/// 哨兵值对应的日期（按秒精度存储后仍可原样读回）
pub fn max_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// 哨兵值对应的日期时间
pub fn max_datetime() -> NaiveDateTime {
    max_date()
        .and_hms_opt(23, 59, 59)
        .unwrap_or(NaiveDateTime::MAX)
}

/// 视为 true 的布尔文本（小写比较）
const TRUE_WORDS: [&str; 6] = ["yes", "true", "t", "1", "oui", "vrai"];

// ==========================================
// CoercionRegistry - 类型转换注册表
// ==========================================
#[derive(Clone)]
pub struct CoercionRegistry {
    coercers: HashMap<FieldKind, Coercer>,
    date_order: DateOrder,
}

impl Default for CoercionRegistry {
    fn default() -> Self {
        Self::new(DateOrder::default())
    }
}

impl CoercionRegistry {
    /// 创建带默认转换规则的注册表
    ///
    /// # 参数
    /// - date_order: 有歧义日期（01/02/2024）的首选解析顺序
    pub fn new(date_order: DateOrder) -> Self {
        let mut coercers: HashMap<FieldKind, Coercer> = HashMap::new();
        coercers.insert(FieldKind::Bool, Arc::new(|v, _| coerce_bool(v)));
        coercers.insert(FieldKind::Int, Arc::new(|v, _| coerce_int(v)));
        coercers.insert(FieldKind::Float, Arc::new(|v, _| coerce_float(v)));
        coercers.insert(FieldKind::Text, Arc::new(coerce_text));
        coercers.insert(
            FieldKind::Date,
            Arc::new(move |v, _| coerce_date(v, date_order)),
        );
        coercers.insert(
            FieldKind::DateTime,
            Arc::new(move |v, _| coerce_datetime(v, date_order)),
        );
        coercers.insert(FieldKind::Time, Arc::new(|v, _| coerce_time(v)));

        Self {
            coercers,
            date_order,
        }
    }

    pub fn date_order(&self) -> DateOrder {
        self.date_order
    }

    /// 替换某一类型族的转换函数
    pub fn register<F>(&mut self, kind: FieldKind, coercer: F) -> &mut Self
    where
        F: Fn(&FieldValue, &FieldType) -> Result<FieldValue, String> + Send + Sync + 'static,
    {
        self.coercers.insert(kind, Arc::new(coercer));
        self
    }

    /// 按声明类型转换
    ///
    /// # 返回
    /// - 未声明类型: 原值
    /// - 类型族未注册转换函数: 原值
    pub fn coerce(
        &self,
        value: &FieldValue,
        field_type: Option<&FieldType>,
    ) -> Result<FieldValue, String> {
        let Some(field_type) = field_type else {
            return Ok(value.clone());
        };
        match self.coercers.get(&field_type.kind()) {
            Some(coercer) => coercer(value, field_type),
            None => Ok(value.clone()),
        }
    }
}

impl fmt::Debug for CoercionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<String> = self.coercers.keys().map(|k| k.to_string()).collect();
        kinds.sort();
        f.debug_struct("CoercionRegistry")
            .field("kinds", &kinds)
            .field("date_order", &self.date_order)
            .finish()
    }
}

// 空白文本视为 NULL
fn non_blank(value: &FieldValue) -> Option<&str> {
    match value {
        FieldValue::Text(s) if !s.trim().is_empty() => Some(s.trim()),
        _ => None,
    }
}

fn is_blank(value: &FieldValue) -> bool {
    match value {
        FieldValue::Null => true,
        FieldValue::Text(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn incompatible(value: &FieldValue, target: &str) -> String {
    format!("无法将 {:?} 转换为 {}", value, target)
}

// ===== 布尔 =====

/// 布尔文本判定（yes/true/t/1/oui/vrai 为真，其余为假）
pub fn str_to_bool(value: &str) -> bool {
    let lower = value.trim().to_lowercase();
    TRUE_WORDS.contains(&lower.as_str())
}

fn coerce_bool(value: &FieldValue) -> Result<FieldValue, String> {
    if is_blank(value) {
        return Ok(FieldValue::Null);
    }
    match value {
        FieldValue::Bool(_) => Ok(value.clone()),
        FieldValue::Int(i) => Ok(FieldValue::Bool(*i != 0)),
        FieldValue::Float(f) => Ok(FieldValue::Bool(*f != 0.0)),
        FieldValue::Text(s) => Ok(FieldValue::Bool(str_to_bool(s))),
        other => Err(incompatible(other, "bool")),
    }
}

// ===== 数值 =====

fn coerce_int(value: &FieldValue) -> Result<FieldValue, String> {
    if is_blank(value) {
        return Ok(FieldValue::Null);
    }
    match value {
        FieldValue::Int(_) => Ok(value.clone()),
        FieldValue::Bool(b) => Ok(FieldValue::Int(i64::from(*b))),
        FieldValue::Float(f) => whole_float_as_i64(*f)
            .map(FieldValue::Int)
            .ok_or_else(|| format!("无法转换为整数（非整数或超出范围）: {}", f)),
        FieldValue::Text(s) => s
            .trim()
            .parse::<i64>()
            .map(FieldValue::Int)
            .map_err(|_| format!("无法解析为整数: {}", s.trim())),
        other => Err(incompatible(other, "int")),
    }
}

fn coerce_float(value: &FieldValue) -> Result<FieldValue, String> {
    if is_blank(value) {
        return Ok(FieldValue::Null);
    }
    match value {
        FieldValue::Float(_) => Ok(value.clone()),
        FieldValue::Int(i) => Ok(FieldValue::Float(*i as f64)),
        FieldValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map(FieldValue::Float)
            .map_err(|_| format!("无法解析为浮点数: {}", s.trim())),
        other => Err(incompatible(other, "float")),
    }
}

// ===== 文本 =====

fn coerce_text(value: &FieldValue, field_type: &FieldType) -> Result<FieldValue, String> {
    if is_blank(value) {
        return Ok(FieldValue::Null);
    }
    let text = match value {
        FieldValue::Text(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    let text = match field_type {
        FieldType::Text {
            max_len: Some(max_len),
        } if text.chars().count() > *max_len => text.chars().take(*max_len).collect(),
        _ => text,
    };
    Ok(FieldValue::Text(text))
}

// ===== 日期 / 时间 =====

// 按首选顺序解析，失败时回退到另一种顺序
fn parse_with_order<T>(
    text: &str,
    separator: char,
    order: DateOrder,
    suffix: &str,
    parse: impl Fn(&str, &str) -> chrono::ParseResult<T>,
) -> Option<T> {
    let day_first = format!("%d{sep}%m{sep}%Y{suffix}", sep = separator, suffix = suffix);
    let month_first = format!("%m{sep}%d{sep}%Y{suffix}", sep = separator, suffix = suffix);
    let (first, second) = match order {
        DateOrder::DayFirst => (day_first, month_first),
        DateOrder::MonthFirst => (month_first, day_first),
    };
    parse(text, &first).or_else(|_| parse(text, &second)).ok()
}

fn separator_of(text: &str) -> Option<char> {
    if text.contains('/') {
        Some('/')
    } else if text.contains('.') {
        Some('.')
    } else {
        None
    }
}

/// 宽松日期解析
///
/// # 支持格式
/// - 01/02/2024、01.02.2024（按 order 解析，失败时交换日/月）
/// - 2024-02-01、20240201
/// - 哨兵值 "10000-01-01 0:00:00" → 9999-12-31
pub fn parse_date(text: &str, order: DateOrder) -> Option<NaiveDate> {
    let stripped = text.trim();
    if stripped == MAX_DATETIME_SENTINEL {
        return Some(max_date());
    }
    if let Some(sep) = separator_of(stripped) {
        return parse_with_order(stripped, sep, order, "", NaiveDate::parse_from_str);
    }
    NaiveDate::parse_from_str(stripped, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(stripped, "%Y%m%d"))
        .ok()
        .or_else(|| parse_datetime(stripped, order).map(|dt| dt.date()))
}

/// 宽松日期时间解析
///
/// # 支持格式
/// - 01/02/2024 10:30:00、01.02.2024 10:30:00（按 order 解析，失败时交换日/月）
/// - 2024-02-01 10:30:00、2024-02-01T10:30:00、20240201103000
/// - 仅日期 → 当日 00:00:00
/// - 哨兵值 "10000-01-01 0:00:00" → 9999-12-31 23:59:59
pub fn parse_datetime(text: &str, order: DateOrder) -> Option<NaiveDateTime> {
    let stripped = text.trim();
    if stripped == MAX_DATETIME_SENTINEL {
        return Some(max_datetime());
    }
    if let Some(sep) = separator_of(stripped) {
        return parse_with_order(
            stripped,
            sep,
            order,
            " %H:%M:%S",
            NaiveDateTime::parse_from_str,
        )
        .or_else(|| {
            parse_with_order(stripped, sep, order, "", NaiveDate::parse_from_str)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        });
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y%m%d%H%M%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(stripped, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(stripped, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(stripped, "%Y%m%d"))
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn coerce_date(value: &FieldValue, order: DateOrder) -> Result<FieldValue, String> {
    if is_blank(value) {
        return Ok(FieldValue::Null);
    }
    match value {
        FieldValue::Date(_) => Ok(value.clone()),
        FieldValue::DateTime(dt) => Ok(FieldValue::Date(dt.date())),
        FieldValue::Text(_) => {
            let text = non_blank(value).unwrap_or_default();
            parse_date(text, order)
                .map(FieldValue::Date)
                .ok_or_else(|| format!("日期格式错误: {}", text))
        }
        other => Err(incompatible(other, "date")),
    }
}

fn coerce_datetime(value: &FieldValue, order: DateOrder) -> Result<FieldValue, String> {
    if is_blank(value) {
        return Ok(FieldValue::Null);
    }
    match value {
        FieldValue::DateTime(_) => Ok(value.clone()),
        FieldValue::Date(d) => d
            .and_hms_opt(0, 0, 0)
            .map(FieldValue::DateTime)
            .ok_or_else(|| incompatible(value, "datetime")),
        FieldValue::Text(_) => {
            let text = non_blank(value).unwrap_or_default();
            parse_datetime(text, order)
                .map(FieldValue::DateTime)
                .ok_or_else(|| format!("日期时间格式错误: {}", text))
        }
        other => Err(incompatible(other, "datetime")),
    }
}

fn coerce_time(value: &FieldValue) -> Result<FieldValue, String> {
    if is_blank(value) {
        return Ok(FieldValue::Null);
    }
    match value {
        FieldValue::Time(_) => Ok(value.clone()),
        FieldValue::DateTime(dt) => Ok(FieldValue::Time(dt.time())),
        FieldValue::Text(_) => {
            let text = non_blank(value).unwrap_or_default();
            NaiveTime::parse_from_str(text, TIME_FORMAT)
                .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
                .map(FieldValue::Time)
                .map_err(|_| format!("时间格式错误: {}", text))
        }
        other => Err(incompatible(other, "time")),
    }
}
