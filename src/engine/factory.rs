// ==========================================
// 行数据同步导入 - 实体工厂
// ==========================================
// 职责: 新建实体 / 历史记录（由调用方注入，替代子类化）
// ==========================================

use crate::domain::entity::{Entity, HistoryEntity};
use std::fmt;

// ==========================================
// EntityFactory Trait
// ==========================================
pub trait EntityFactory {
    type Entity: Entity;
    type History: HistoryEntity;

    /// 新建一个未持久化的空实体
    fn create_model(&self) -> Self::Entity;

    /// 为即将更新的实体创建历史记录
    ///
    /// # 返回
    /// - None: 不记录历史（即使被跟踪字段有变化）
    fn create_history_model(&self, _entity: &Self::Entity) -> Option<Self::History> {
        None
    }
}

type CreateFn<E> = Box<dyn Fn() -> E>;
type HistoryFn<E, H> = Box<dyn Fn(&E) -> Option<H>>;

// ==========================================
// FnFactory - 闭包实现的工厂
// ==========================================
/// 由闭包构造的工厂
///
/// # 示例
/// ```
/// use rowsync::domain::{Entity, FieldValue, Record};
/// use rowsync::engine::{EntityFactory, FnFactory};
///
/// let factory = FnFactory::new(Record::new).with_history(|device: &Record| {
///     Some(Record::new().with("model_id", device.field("id")))
/// });
///
/// let device = Record::new().with("id", 7i64);
/// let history = factory.create_history_model(&device).unwrap();
/// assert_eq!(history.field("model_id"), FieldValue::Int(7));
/// ```
pub struct FnFactory<E, H> {
    create: CreateFn<E>,
    history: Option<HistoryFn<E, H>>,
}

impl<E, H> FnFactory<E, H> {
    pub fn new<C>(create: C) -> Self
    where
        C: Fn() -> E + 'static,
    {
        Self {
            create: Box::new(create),
            history: None,
        }
    }

    pub fn with_history<F>(mut self, history: F) -> Self
    where
        F: Fn(&E) -> Option<H> + 'static,
    {
        self.history = Some(Box::new(history));
        self
    }
}

impl<E, H> EntityFactory for FnFactory<E, H>
where
    E: Entity,
    H: HistoryEntity,
{
    type Entity = E;
    type History = H;

    fn create_model(&self) -> E {
        (self.create)()
    }

    fn create_history_model(&self, entity: &E) -> Option<H> {
        self.history.as_ref().and_then(|history| history(entity))
    }
}

impl<E, H> fmt::Debug for FnFactory<E, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFactory")
            .field("history", &self.history.is_some())
            .finish()
    }
}
