// ==========================================
// 行数据同步导入 - 动态记录
// ==========================================
// 用途: 内置存储（SQLite / 内存）使用的通用实体
// 同时可作为历史记录实体（old_x / new_x / date）
// ==========================================

use crate::domain::entity::{
    Entity, HistoryEntity, HISTORY_DATE_FIELD, HISTORY_NEW_PREFIX, HISTORY_OLD_PREFIX,
};
use crate::domain::value::FieldValue;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    rowid: Option<i64>,
    values: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// 带 rowid 的记录（从存储加载时使用）
    pub fn with_rowid(rowid: i64) -> Self {
        Self {
            rowid: Some(rowid),
            values: BTreeMap::new(),
        }
    }

    /// 链式设置字段
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn rowid(&self) -> Option<i64> {
        self.rowid
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn values(&self) -> &BTreeMap<String, FieldValue> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Entity for Record {
    fn field(&self, name: &str) -> FieldValue {
        self.values.get(name).cloned().unwrap_or(FieldValue::Null)
    }

    fn set_field(&mut self, name: &str, value: FieldValue) {
        self.values.insert(name.to_string(), value);
    }
}

impl HistoryEntity for Record {
    fn record_change(&mut self, field: &str, old: FieldValue, new: FieldValue) {
        self.values
            .insert(format!("{}{}", HISTORY_OLD_PREFIX, field), old);
        self.values
            .insert(format!("{}{}", HISTORY_NEW_PREFIX, field), new);
    }

    fn set_recorded_at(&mut self, at: NaiveDateTime) {
        self.values
            .insert(HISTORY_DATE_FIELD.to_string(), FieldValue::DateTime(at));
    }
}
