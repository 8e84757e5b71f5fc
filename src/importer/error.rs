// ==========================================
// 行数据同步导入 - 导入模块错误类型
// ==========================================
// 分类:
// - 配置错误: 映射构建失败（导入开始前）
// - 行解码错误: 行长度不足 / 类型转换失败（默认中止整次导入）
// - 数据源错误: 文件 / 查询读取失败
// - 持久化错误: 提交失败（整次回滚）
// 工具: thiserror 派生宏
// ==========================================

use crate::mapping::MappingError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

// ==========================================
// RowDecodingError - 单行解码错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowDecodingError {
    #[error("行长度不足 (行 {row}): 需要 {expected} 列，实际 {actual} 列")]
    RowTooShort {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("类型转换失败 (行 {row}, 字段 {field}, 值 {value:?}): {message}")]
    Coercion {
        row: usize,
        field: String,
        value: String,
        message: String,
    },
}

impl RowDecodingError {
    /// 出错的行号（0 起，含表头）
    pub fn row(&self) -> usize {
        match self {
            RowDecodingError::RowTooShort { row, .. } | RowDecodingError::Coercion { row, .. } => {
                *row
            }
        }
    }
}

// ==========================================
// ImportError - 导入运行错误
// ==========================================
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 配置错误 =====
    #[error("映射配置错误: {0}")]
    Configuration(#[from] MappingError),

    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    ConfigValueError {
        key: String,
        value: String,
        message: String,
    },

    // ===== 数据源错误 =====
    #[error("数据源 {source_name} 解码失败: {error}")]
    RowDecoding {
        source_name: String,
        #[source]
        error: RowDecodingError,
    },

    #[error("数据源错误 ({source_name}): {message}")]
    SourceError {
        source_name: String,
        message: String,
    },

    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    // ===== 持久化错误 =====
    #[error("持久化失败: {0}")]
    Persistence(#[from] RepositoryError),

    // ===== 运行控制 =====
    #[error("钩子 {hook} 执行失败: {message}")]
    HookError { hook: String, message: String },

    #[error("导入已取消 (数据源 {source_name})")]
    Cancelled { source_name: String },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 包装行解码错误（附带数据源名）
    pub fn decoding(source_name: &str, error: RowDecodingError) -> Self {
        ImportError::RowDecoding {
            source_name: source_name.to_string(),
            error,
        }
    }

    /// 钩子错误（保留完整错误链）
    pub fn hook(hook: &str, error: anyhow::Error) -> Self {
        ImportError::HookError {
            hook: hook.to_string(),
            message: format!("{:#}", error),
        }
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::DatabaseQueryError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::XlsxError>
impl From<calamine::XlsxError> for ImportError {
    fn from(err: calamine::XlsxError) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
