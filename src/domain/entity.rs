// ==========================================
// 行数据同步导入 - 实体接口
// ==========================================
// 职责: 定义对账引擎读写实体所需的最小接口
// 红线: 实体归调用方的模型层所有，引擎只暂存变更
// ==========================================

use crate::domain::types::FieldType;
use crate::domain::value::FieldValue;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 历史记录中旧值字段前缀
pub const HISTORY_OLD_PREFIX: &str = "old_";
/// 历史记录中新值字段前缀
pub const HISTORY_NEW_PREFIX: &str = "new_";
/// 历史记录时间字段
pub const HISTORY_DATE_FIELD: &str = "date";

// ==========================================
// Entity Trait
// ==========================================
// 用途: 按字段名读写的可变记录
// 实现者: Record（动态记录），或调用方自己的模型
pub trait Entity {
    /// 读取字段当前值（不存在的字段返回 NULL）
    fn field(&self, name: &str) -> FieldValue;

    /// 写入字段值
    fn set_field(&mut self, name: &str, value: FieldValue);
}

// ==========================================
// HistoryEntity Trait
// ==========================================
// 用途: 记录被跟踪字段的新旧值
// 约定: 每个被跟踪字段 x 对应 old_x / new_x 两个字段
pub trait HistoryEntity {
    fn record_change(&mut self, field: &str, old: FieldValue, new: FieldValue);

    fn set_recorded_at(&mut self, at: NaiveDateTime);
}

// ==========================================
// EntitySchema - 实体字段声明
// ==========================================
/// 实体字段类型与必填约束
///
/// 空 schema 表示不做类型转换（原样透传文本）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    fields: BTreeMap<String, FieldType>,
    required: BTreeSet<String>,
}

impl EntitySchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// 声明字段类型
    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(name.into(), field_type);
        self
    }

    /// 声明必填字段（NOT NULL 且无默认值）
    pub fn with_required(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        self.required.insert(name.clone());
        self.fields.insert(name, field_type);
        self
    }

    pub fn field_type(&self, name: &str) -> Option<&FieldType> {
        self.fields.get(name)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.contains(name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.required.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
