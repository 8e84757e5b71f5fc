// ==========================================
// 行数据同步导入 - 配置层
// ==========================================
// 职责: 导入任务运行策略，支持 JSON / config_kv 覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config;
pub mod import_config_trait;

pub use config_manager::{config_keys, ConfigManager, GLOBAL_SCOPE};
pub use import_config::{ImportConfig, DEFAULT_PROGRESS_EVERY};
pub use import_config_trait::ImportConfigReader;
