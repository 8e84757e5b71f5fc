// ==========================================
// 行数据同步导入 - 内存实体存储
// ==========================================
// 用途: 测试与调用方自有模型的轻量存储
// 原子性: 在副本上应用整个变更集，全部成功后再替换
// 定位: 以加载时 key_field 的值定位已有实体（更新可能改写主键字段）
// ==========================================

use crate::domain::entity::{Entity, EntitySchema, HistoryEntity};
use crate::domain::value::FieldValue;
use crate::repository::entity_store::{ChangeSet, EntityStore};
use crate::repository::error::{RepositoryError, RepositoryResult};
use tracing::debug;

pub struct InMemoryStore<E, H> {
    key_field: String,
    schema: EntitySchema,
    entities: Vec<E>,
    history: Vec<H>,
}

impl<E, H> InMemoryStore<E, H>
where
    E: Entity + Clone,
    H: HistoryEntity + Clone,
{
    /// 创建空存储
    ///
    /// # 参数
    /// - key_field: 定位实体的字段名
    pub fn new(key_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
            schema: EntitySchema::new(),
            entities: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn with_schema(mut self, schema: EntitySchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_entities(mut self, entities: Vec<E>) -> Self {
        self.entities = entities;
        self
    }

    pub fn entities(&self) -> &[E] {
        &self.entities
    }

    pub fn history(&self) -> &[H] {
        &self.history
    }

    /// 按主键查找
    pub fn find(&self, key: &str) -> Option<&E> {
        position_of(&self.entities, &self.key_field, key).map(|i| &self.entities[i])
    }

    fn key_of(&self, entity: &E) -> RepositoryResult<String> {
        self.key_from(entity.field(&self.key_field))
    }

    fn key_from(&self, value: FieldValue) -> RepositoryResult<String> {
        value.key_string().ok_or_else(|| {
            RepositoryError::InternalError(format!("实体缺少主键字段 {}", self.key_field))
        })
    }
}

fn position_of<E: Entity>(entities: &[E], key_field: &str, key: &str) -> Option<usize> {
    entities
        .iter()
        .position(|e| e.field(key_field).key_string().as_deref() == Some(key))
}

impl<E, H> EntityStore for InMemoryStore<E, H>
where
    E: Entity + Clone,
    H: HistoryEntity + Clone,
{
    type Entity = E;
    type History = H;

    fn schema(&self) -> RepositoryResult<EntitySchema> {
        Ok(self.schema.clone())
    }

    fn load_all(&self) -> RepositoryResult<Vec<E>> {
        Ok(self.entities.clone())
    }

    fn persist(&mut self, changes: &ChangeSet<E, H>) -> RepositoryResult<()> {
        let mut next = self.entities.clone();

        for update in &changes.updated {
            let key = self.key_from(update.loaded_value(&self.key_field))?;
            let index = position_of(&next, &self.key_field, &key).ok_or_else(|| {
                RepositoryError::NotFound {
                    entity: "entity".to_string(),
                    key: key.clone(),
                }
            })?;
            next[index] = update.entity.clone();
        }

        for entity in &changes.deleted {
            let key = self.key_of(entity)?;
            let index = position_of(&next, &self.key_field, &key).ok_or_else(|| {
                RepositoryError::NotFound {
                    entity: "entity".to_string(),
                    key: key.clone(),
                }
            })?;
            next.remove(index);
        }

        for entity in &changes.created {
            let key = self.key_of(entity)?;
            if position_of(&next, &self.key_field, &key).is_some() {
                return Err(RepositoryError::UniqueConstraintViolation(format!(
                    "{} = {}",
                    self.key_field, key
                )));
            }
            next.push(entity.clone());
        }

        self.entities = next;
        self.history.extend(changes.history.iter().cloned());

        debug!(
            created = changes.created.len(),
            updated = changes.updated.len(),
            deleted = changes.deleted.len(),
            history = changes.history.len(),
            "内存存储已提交"
        );
        Ok(())
    }
}
