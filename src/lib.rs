// ==========================================
// 行数据同步导入 - 核心库
// ==========================================
// 定位: 表格数据（CSV / Excel / SQL 查询）→ 字段映射 → 与已有实体对账
//       → 新建 / 更新 / 历史记录 / 删除，一次原子提交
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 字段值与实体接口
pub mod domain;

// 映射层 - 列 → 字段绑定
pub mod mapping;

// 导入层 - 数据源与行解码
pub mod importer;

// 引擎层 - 对账与任务编排
pub mod engine;

// 数据仓储层 - 实体存储
pub mod repository;

// 配置层 - 运行策略
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

pub use config::ImportConfig;
pub use domain::{Entity, EntitySchema, FieldType, FieldValue, HistoryEntity, ImportMode, Record};
pub use engine::{
    EntityFactory, FnFactory, ImportHooks, ImportReport, ImportTask, ReconciliationEngine,
    SourceReport,
};
pub use importer::{
    CsvSource, DecodeErrorPolicy, ExcelSource, ImportError, ImportResult, ImportSource,
    MemorySource, SqliteQuerySource,
};
pub use mapping::{FieldOptions, Mapping, MappingError};
pub use repository::{ChangeSet, EntityStore, InMemoryStore, RepositoryError, SqliteEntityStore};

// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
