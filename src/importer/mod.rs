// ==========================================
// 行数据同步导入 - 导入层
// ==========================================
// 职责: 数据源读取 → 行解码 → 类型转换
// 数据源: CSV / Excel / SQL 查询 / 内存
// ==========================================

pub mod coercion;
pub mod error;
pub mod file_parser;
pub mod import_source;
pub mod parsers;
pub mod query_source;
pub mod row_decoder;

pub use coercion::{parse_date, parse_datetime, str_to_bool, Coercer, CoercionRegistry};
pub use error::{ImportError, ImportResult, RowDecodingError};
pub use file_parser::{CsvSource, ExcelSource};
pub use import_source::{
    DecodeErrorPolicy, FieldUpdate, FieldUpdates, ImportSource, MemorySource, RowIter,
};
pub use parsers::{amount_parser, normalize_amount, parse_amount, parse_list, AmountFormat};
pub use query_source::SqliteQuerySource;
pub use row_decoder::{DecodedRow, DecodedRows, RawRow, RowDecoder};
