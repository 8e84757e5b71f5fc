// ==========================================
// 行数据同步导入 - SQL 查询数据源
// ==========================================
// 用途: 把另一张表（或任意 SELECT）作为行数据源
// 说明: 单元格保留 SQLite 存储类型（INTEGER / REAL / TEXT / NULL）
// ==========================================

use crate::domain::types::ImportMode;
use crate::domain::value::FieldValue;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_source::{DecodeErrorPolicy, ImportSource, RowIter};
use crate::importer::row_decoder::RawRow;
use crate::mapping::Mapping;
use rusqlite::{params_from_iter, Connection};
use std::sync::{Arc, Mutex};
use tracing::debug;

pub struct SqliteQuerySource {
    name: String,
    conn: Arc<Mutex<Connection>>,
    sql: String,
    params: Vec<FieldValue>,
    mapping: Mapping,
    mode: ImportMode,
    decode_error_policy: DecodeErrorPolicy,
}

impl SqliteQuerySource {
    /// 创建查询数据源
    ///
    /// # 参数
    /// - conn: 共享连接
    /// - sql: SELECT 语句；结果列可按列号（auto/col）或列名（named）绑定
    /// - mapping: 列映射（通常 no_header）
    pub fn new(conn: Arc<Mutex<Connection>>, sql: impl Into<String>, mapping: Mapping) -> Self {
        Self {
            name: "query".to_string(),
            conn,
            sql: sql.into(),
            params: Vec::new(),
            mapping,
            mode: ImportMode::CreateAndUpdate,
            decode_error_policy: DecodeErrorPolicy::AbortRun,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 绑定查询参数（?1, ?2, ...）
    pub fn with_params(mut self, params: Vec<FieldValue>) -> Self {
        self.params = params;
        self
    }

    pub fn with_mode(mut self, mode: ImportMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_decode_error_policy(mut self, policy: DecodeErrorPolicy) -> Self {
        self.decode_error_policy = policy;
        self
    }

    // 连接锁只在查询期间持有，结果整体取出
    fn fetch_rows(&self) -> ImportResult<Vec<RawRow>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ImportError::InternalError(format!("锁获取失败: {}", e)))?;

        let mut stmt = conn.prepare(&self.sql)?;
        let column_count = stmt.column_count();

        let rows = stmt.query_map(params_from_iter(self.params.iter()), |row| {
            (0..column_count)
                .map(|i| row.get_ref(i).map(|v| FieldValue::from_sql_ref(v, None)))
                .collect::<rusqlite::Result<RawRow>>()
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

impl ImportSource for SqliteQuerySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_names(&self) -> ImportResult<Vec<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ImportError::InternalError(format!("锁获取失败: {}", e)))?;
        let stmt = conn.prepare(&self.sql).map_err(|e| ImportError::SourceError {
            source_name: self.name.clone(),
            message: e.to_string(),
        })?;
        Ok(stmt.column_names().into_iter().map(String::from).collect())
    }

    fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    fn open(&self) -> ImportResult<RowIter<'_>> {
        let rows = self.fetch_rows().map_err(|e| ImportError::SourceError {
            source_name: self.name.clone(),
            message: e.to_string(),
        })?;
        debug!(source = %self.name, rows = rows.len(), "查询数据源已载入");
        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    fn mode(&self) -> ImportMode {
        self.mode
    }

    fn decode_error_policy(&self) -> DecodeErrorPolicy {
        self.decode_error_policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_conn() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE staging (code TEXT, qty INTEGER, price REAL);
            INSERT INTO staging VALUES ('A1', 3, 1.5);
            INSERT INTO staging VALUES ('B2', NULL, 2.0);
            "#,
        )
        .unwrap();
        Arc::new(Mutex::new(conn))
    }

    #[test]
    fn test_query_source_typed_cells() {
        let mapping = Mapping::builder()
            .auto("code")
            .auto("qty")
            .auto("price")
            .key("code")
            .no_header()
            .build()
            .unwrap();
        let source = SqliteQuerySource::new(
            shared_conn(),
            "SELECT code, qty, price FROM staging WHERE price >= ?1 ORDER BY code",
            mapping,
        )
        .with_params(vec![FieldValue::Float(1.0)])
        .with_name("staging");

        let rows: Vec<RawRow> = source.open().unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            vec![FieldValue::text("A1"), FieldValue::Int(3), FieldValue::Float(1.5)]
        );
        assert_eq!(rows[1][1], FieldValue::Null);
    }

    #[test]
    fn test_query_column_names() {
        let mapping = Mapping::builder().named("code").key("code").no_header().build().unwrap();
        let source = SqliteQuerySource::new(
            shared_conn(),
            "SELECT price, code AS code FROM staging",
            mapping,
        );
        assert_eq!(
            source.column_names().unwrap(),
            vec!["price".to_string(), "code".to_string()]
        );
    }

    #[test]
    fn test_query_error_names_source() {
        let mapping = Mapping::builder().auto("id").build().unwrap();
        let source = SqliteQuerySource::new(shared_conn(), "SELECT * FROM missing", mapping)
            .with_name("broken");

        match source.open() {
            Err(ImportError::SourceError { source_name, .. }) => assert_eq!(source_name, "broken"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("query on missing table should fail"),
        };
    }
}
