// ==========================================
// 行数据同步导入 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config::DEFAULT_PROGRESS_EVERY;
use crate::config::import_config_trait::ImportConfigReader;
use crate::db::{configure_sqlite_connection, open_sqlite_connection};
use crate::domain::types::DateOrder;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::str_to_bool;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// 全局配置作用域
pub const GLOBAL_SCOPE: &str = "global";

const FALSE_WORDS: [&str; 6] = ["no", "false", "f", "0", "non", "faux"];

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    pub const DRY_RUN: &str = "import_dry_run";
    pub const KEEP_HISTORY: &str = "import_keep_history";
    pub const DELETE_UNMATCHED: &str = "import_delete_unmatched";
    pub const REJECT_NULL_REQUIRED: &str = "import_reject_null_required";
    pub const PROGRESS_EVERY: &str = "import_progress_every";
    pub const DATE_ORDER: &str = "import_date_order";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ImportResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ImportResult<Self> {
        {
            let guard = lock(&conn)?;
            configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    /// 建表（已存在则跳过）
    pub fn ensure_schema(&self) -> ImportResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS config_kv (
                scope_id TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (scope_id, key)
            );",
        )?;
        Ok(())
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> ImportResult<Option<String>> {
        let conn = lock(&self.conn)?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| ImportError::ConfigReadError {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ImportResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3",
            params![GLOBAL_SCOPE, key, value],
        )?;
        debug!(key, value, "配置已写入");
        Ok(())
    }

    /// global scope 全部配置的 JSON 快照
    pub fn get_config_snapshot(&self) -> ImportResult<String> {
        let conn = lock(&self.conn)?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }
        serde_json::to_string(&config_map).map_err(|e| ImportError::InternalError(e.to_string()))
    }

    fn get_bool(&self, key: &str, default: bool) -> ImportResult<bool> {
        match self.get_global_config_value(key)? {
            None => Ok(default),
            Some(value) => {
                let lower = value.trim().to_lowercase();
                if str_to_bool(&lower) {
                    Ok(true)
                } else if FALSE_WORDS.contains(&lower.as_str()) {
                    Ok(false)
                } else {
                    Err(ImportError::ConfigValueError {
                        key: key.to_string(),
                        value,
                        message: "应为布尔值".to_string(),
                    })
                }
            }
        }
    }

    fn get_parsed<T>(&self, key: &str, default: T) -> ImportResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_global_config_value(key)? {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse::<T>()
                .map_err(|e| ImportError::ConfigValueError {
                    key: key.to_string(),
                    message: e.to_string(),
                    value,
                }),
        }
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
impl ImportConfigReader for ConfigManager {
    fn get_dry_run(&self) -> ImportResult<bool> {
        self.get_bool(config_keys::DRY_RUN, false)
    }

    fn get_keep_history(&self) -> ImportResult<bool> {
        self.get_bool(config_keys::KEEP_HISTORY, true)
    }

    fn get_delete_unmatched(&self) -> ImportResult<bool> {
        self.get_bool(config_keys::DELETE_UNMATCHED, false)
    }

    fn get_reject_null_required(&self) -> ImportResult<bool> {
        self.get_bool(config_keys::REJECT_NULL_REQUIRED, true)
    }

    fn get_progress_every(&self) -> ImportResult<usize> {
        self.get_parsed(config_keys::PROGRESS_EVERY, DEFAULT_PROGRESS_EVERY)
    }

    fn get_date_order(&self) -> ImportResult<DateOrder> {
        let value = match self.get_global_config_value(config_keys::DATE_ORDER)? {
            Some(value) => value,
            None => return Ok(DateOrder::DayFirst),
        };
        match value.trim().to_uppercase().as_str() {
            "DAY_FIRST" | "DMY" => Ok(DateOrder::DayFirst),
            "MONTH_FIRST" | "MDY" => Ok(DateOrder::MonthFirst),
            _ => Err(ImportError::ConfigValueError {
                key: config_keys::DATE_ORDER.to_string(),
                value,
                message: "应为 DAY_FIRST 或 MONTH_FIRST".to_string(),
            }),
        }
    }
}

fn lock(conn: &Mutex<Connection>) -> ImportResult<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|e| ImportError::ConfigReadError {
        key: "config_kv".to_string(),
        message: format!("锁获取失败: {}", e),
    })
}
