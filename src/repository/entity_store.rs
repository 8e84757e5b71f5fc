// ==========================================
// 行数据同步导入 - 实体存储接口
// ==========================================
// 职责: 定义导入所需的持久化契约（不包含实现）
// 语义: 工作单元，persist 要么全部提交，要么全部不生效
// 红线: 存储不含对账逻辑，只做加载与写入
// ==========================================

use crate::domain::entity::{Entity, EntitySchema, HistoryEntity};
use crate::domain::value::FieldValue;
use crate::repository::error::RepositoryResult;
use std::collections::BTreeMap;

// ==========================================
// EntityUpdate - 已有实体的更新
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct EntityUpdate<E> {
    /// 已应用新值的实体
    pub entity: E,
    /// 实际变化的字段名
    pub changed_fields: Vec<String>,
    /// 变化字段在加载时的值（存储据此定位被改了主键的实体）
    pub previous_values: BTreeMap<String, FieldValue>,
}

impl<E: Entity> EntityUpdate<E> {
    /// 加载时的字段值：未变化的字段取实体当前值
    pub fn loaded_value(&self, field: &str) -> FieldValue {
        match self.previous_values.get(field) {
            Some(value) => value.clone(),
            None => self.entity.field(field),
        }
    }
}

// ==========================================
// ChangeSet - 一次导入的全部变更
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet<E, H> {
    pub created: Vec<E>,
    pub updated: Vec<EntityUpdate<E>>,
    pub deleted: Vec<E>,
    pub history: Vec<H>,
}

impl<E, H> Default for ChangeSet<E, H> {
    fn default() -> Self {
        Self {
            created: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
            history: Vec::new(),
        }
    }
}

impl<E, H> ChangeSet<E, H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.updated.is_empty()
            && self.deleted.is_empty()
            && self.history.is_empty()
    }

    /// 写入操作总数
    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len() + self.history.len()
    }
}

// ==========================================
// EntityStore Trait
// ==========================================
// 实现者: SqliteEntityStore / InMemoryStore，或调用方自己的模型层
pub trait EntityStore {
    type Entity: Entity;
    type History: HistoryEntity;

    /// 字段类型与必填约束（空 schema = 不做类型转换）
    fn schema(&self) -> RepositoryResult<EntitySchema>;

    /// 加载全部已有实体
    fn load_all(&self) -> RepositoryResult<Vec<Self::Entity>>;

    /// 原子提交变更集
    ///
    /// # 返回
    /// - Ok(()): 全部写入
    /// - Err: 未写入任何内容
    fn persist(&mut self, changes: &ChangeSet<Self::Entity, Self::History>) -> RepositoryResult<()>;
}
