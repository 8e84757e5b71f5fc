// ==========================================
// 行数据同步导入 - SQLite 实体存储
// ==========================================
// 职责: 以 Record 读写任意 SQLite 表（可选历史表）
// schema: PRAGMA table_info，声明类型 → FieldType，
//         NOT NULL 且无默认值的非主键列 → 必填
// 红线: persist 在单个事务内完成，失败即回滚
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::entity::{Entity, EntitySchema};
use crate::domain::record::Record;
use crate::domain::types::FieldType;
use crate::domain::value::FieldValue;
use crate::repository::entity_store::{ChangeSet, EntityStore, EntityUpdate};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params_from_iter, Connection, Transaction};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// 列定义（PRAGMA table_info 的一行）
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub has_default: bool,
    pub primary_key: bool,
}

/// 标识符加双引号（内部双引号转义）
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// ==========================================
// SqliteEntityStore
// ==========================================
pub struct SqliteEntityStore {
    conn: Arc<Mutex<Connection>>,
    table: String,
    key_column: String,
    history_table: Option<String>,
}

impl SqliteEntityStore {
    /// 从已有连接创建
    ///
    /// # 参数
    /// - conn: 共享连接
    /// - table: 实体表名（需为 rowid 表）
    /// - key_column: 无 rowid 时定位记录的列
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        table: impl Into<String>,
        key_column: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            table: table.into(),
            key_column: key_column.into(),
            history_table: None,
        }
    }

    /// 打开数据库文件并创建
    pub fn open(
        db_path: &str,
        table: impl Into<String>,
        key_column: impl Into<String>,
    ) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self::new(Arc::new(Mutex::new(conn)), table, key_column))
    }

    /// 历史记录写入的表
    pub fn with_history_table(mut self, table: impl Into<String>) -> Self {
        self.history_table = Some(table.into());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn lock(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取表的列定义
    pub fn columns(&self) -> RepositoryResult<Vec<ColumnInfo>> {
        let conn = self.lock()?;
        read_columns(&conn, &self.table)
    }

    // ===== 写入（事务内） =====

    fn insert_record(tx: &Transaction, table: &str, record: &Record) -> RepositoryResult<()> {
        if record.is_empty() {
            tx.execute(&format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table)), [])?;
            return Ok(());
        }

        let names: Vec<String> = record.values().keys().map(|k| quote_ident(k)).collect();
        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            names.join(", "),
            placeholders.join(", ")
        );
        tx.execute(&sql, params_from_iter(record.values().values()))?;
        Ok(())
    }

    fn update_record(&self, tx: &Transaction, update: &EntityUpdate<Record>) -> RepositoryResult<()> {
        let record = &update.entity;
        let changed_fields = &update.changed_fields;
        if changed_fields.is_empty() {
            return Ok(());
        }

        let assignments: Vec<String> = changed_fields
            .iter()
            .enumerate()
            .map(|(i, name)| format!("{} = ?{}", quote_ident(name), i + 1))
            .collect();
        let mut params: Vec<FieldValue> = changed_fields.iter().map(|f| record.field(f)).collect();

        // 主键列本身可能被更新，按加载时的值定位
        let (locator, locator_value) = match record.rowid() {
            Some(rowid) => ("rowid".to_string(), FieldValue::Int(rowid)),
            None => (
                quote_ident(&self.key_column),
                update.loaded_value(&self.key_column),
            ),
        };
        params.push(locator_value.clone());

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote_ident(&self.table),
            assignments.join(", "),
            locator,
            params.len()
        );
        let affected = tx.execute(&sql, params_from_iter(params.iter()))?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: self.table.clone(),
                key: locator_value.to_string(),
            });
        }
        Ok(())
    }

    fn delete_record(&self, tx: &Transaction, record: &Record) -> RepositoryResult<()> {
        let (locator, locator_value) = self.locator(record);
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            quote_ident(&self.table),
            locator
        );
        let affected = tx.execute(&sql, [&locator_value])?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: self.table.clone(),
                key: locator_value.to_string(),
            });
        }
        Ok(())
    }

    // 优先 rowid，否则按 key 列
    fn locator(&self, record: &Record) -> (String, FieldValue) {
        match record.rowid() {
            Some(rowid) => ("rowid".to_string(), FieldValue::Int(rowid)),
            None => (quote_ident(&self.key_column), record.field(&self.key_column)),
        }
    }
}

fn read_columns(conn: &Connection, table: &str) -> RepositoryResult<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let rows = stmt.query_map([], |row| {
        Ok(ColumnInfo {
            name: row.get(1)?,
            declared_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            not_null: row.get::<_, i64>(3)? != 0,
            has_default: row.get::<_, Option<String>>(4)?.is_some(),
            primary_key: row.get::<_, i64>(5)? != 0,
        })
    })?;

    let mut columns = Vec::new();
    for row in rows {
        columns.push(row?);
    }

    if columns.is_empty() {
        return Err(RepositoryError::SchemaError(format!("表不存在: {}", table)));
    }
    Ok(columns)
}

fn schema_from_columns(columns: &[ColumnInfo]) -> EntitySchema {
    columns.iter().fold(EntitySchema::new(), |schema, column| {
        let field_type = FieldType::from_sql_decl(&column.declared_type);
        if column.not_null && !column.has_default && !column.primary_key {
            schema.with_required(column.name.clone(), field_type)
        } else {
            schema.with_field(column.name.clone(), field_type)
        }
    })
}

impl EntityStore for SqliteEntityStore {
    type Entity = Record;
    type History = Record;

    fn schema(&self) -> RepositoryResult<EntitySchema> {
        Ok(schema_from_columns(&self.columns()?))
    }

    fn load_all(&self) -> RepositoryResult<Vec<Record>> {
        let conn = self.lock()?;
        let columns = read_columns(&conn, &self.table)?;
        let schema = schema_from_columns(&columns);

        let select_list: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();
        let sql = format!(
            "SELECT rowid, {} FROM {} ORDER BY rowid",
            select_list.join(", "),
            quote_ident(&self.table)
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            let mut record = Record::with_rowid(row.get(0)?);
            for (i, column) in columns.iter().enumerate() {
                let value = FieldValue::from_sql_ref(row.get_ref(i + 1)?, schema.field_type(&column.name));
                record.set_field(&column.name, value);
            }
            Ok(record)
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        debug!(table = %self.table, count = records.len(), "已加载实体");
        Ok(records)
    }

    fn persist(&mut self, changes: &ChangeSet<Record, Record>) -> RepositoryResult<()> {
        if !changes.history.is_empty() && self.history_table.is_none() {
            return Err(RepositoryError::SchemaError(format!(
                "表 {} 未配置历史表，无法写入 {} 条历史记录",
                self.table,
                changes.history.len()
            )));
        }

        let conn = self.lock()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        for record in &changes.created {
            Self::insert_record(&tx, &self.table, record)?;
        }
        for update in &changes.updated {
            self.update_record(&tx, update)?;
        }
        for record in &changes.deleted {
            self.delete_record(&tx, record)?;
        }
        if let Some(history_table) = &self.history_table {
            for record in &changes.history {
                Self::insert_record(&tx, history_table, record)?;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(
            table = %self.table,
            created = changes.created.len(),
            updated = changes.updated.len(),
            deleted = changes.deleted.len(),
            history = changes.history.len(),
            "变更集已提交"
        );
        Ok(())
    }
}
