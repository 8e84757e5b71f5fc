// ==========================================
// 行数据同步导入 - 文件数据源
// ==========================================
// 支持: CSV (.csv) / Excel (.xlsx)
// 约定: 不解释表头，表头行由 Mapping::header_line_number 决定是否跳过
// ==========================================

use crate::domain::types::ImportMode;
use crate::domain::value::FieldValue;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_source::{DecodeErrorPolicy, ImportSource, RowIter};
use crate::importer::row_decoder::RawRow;
use crate::mapping::Mapping;
use calamine::{open_workbook, Data, DataType, Reader, Xlsx};
use csv::ReaderBuilder;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

fn source_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn ensure_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

// ==========================================
// CsvSource
// ==========================================
pub struct CsvSource {
    name: String,
    path: PathBuf,
    mapping: Mapping,
    delimiter: u8,
    quote: u8,
    mode: ImportMode,
    decode_error_policy: DecodeErrorPolicy,
}

impl CsvSource {
    /// 创建 CSV 数据源（逗号分隔，双引号包裹）
    ///
    /// # 参数
    /// - path: 文件路径
    /// - mapping: 列映射
    pub fn new(path: impl AsRef<Path>, mapping: Mapping) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: source_name_of(&path),
            path,
            mapping,
            delimiter: b',',
            quote: b'"',
            mode: ImportMode::CreateAndUpdate,
            decode_error_policy: DecodeErrorPolicy::AbortRun,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_quote(mut self, quote: u8) -> Self {
        self.quote = quote;
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
}

impl ImportSource for CsvSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    fn open(&self) -> ImportResult<RowIter<'_>> {
        ensure_exists(&self.path)?;

        let file = File::open(&self.path)?;
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致，长度由解码器校验
            .delimiter(self.delimiter)
            .quote(self.quote)
            .from_reader(file);

        debug!(path = %self.path.display(), "打开 CSV 数据源");

        // 文件句柄随迭代器一起释放
        let rows = reader.into_records().map(|result| {
            result
                .map(|record| record.iter().map(|cell| FieldValue::text(cell)).collect::<RawRow>())
                .map_err(ImportError::from)
        });
        Ok(Box::new(rows))
    }

    fn mode(&self) -> ImportMode {
        self.mode
    }

    fn decode_error_policy(&self) -> DecodeErrorPolicy {
        self.decode_error_policy
    }
}

// ==========================================
// ExcelSource
// ==========================================
pub struct ExcelSource {
    name: String,
    path: PathBuf,
    sheet: Option<String>,
    mapping: Mapping,
    mode: ImportMode,
    decode_error_policy: DecodeErrorPolicy,
}

impl ExcelSource {
    /// 创建 Excel 数据源（默认读取第一个工作表）
    pub fn new(path: impl AsRef<Path>, mapping: Mapping) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: source_name_of(&path),
            path,
            sheet: None,
            mapping,
            mode: ImportMode::CreateAndUpdate,
            decode_error_policy: DecodeErrorPolicy::AbortRun,
        }
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
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
}

// 保留 Excel 单元格的原生类型，其余按显示文本
// 日期单元格转为 DateTime，时长与无法识别的日期按文本
fn excel_cell(cell: &Data) -> FieldValue {
    match cell {
        Data::Empty => FieldValue::text(""),
        Data::String(s) => FieldValue::text(s.as_str()),
        Data::Int(i) => FieldValue::Int(*i),
        Data::Float(f) => FieldValue::Float(*f),
        Data::Bool(b) => FieldValue::Bool(*b),
        Data::DateTime(dt) if dt.is_datetime() => cell
            .as_datetime()
            .map(FieldValue::DateTime)
            .unwrap_or_else(|| FieldValue::text(cell.to_string())),
        Data::DateTimeIso(_) => cell
            .as_datetime()
            .map(FieldValue::DateTime)
            .or_else(|| cell.as_date().map(FieldValue::Date))
            .unwrap_or_else(|| FieldValue::text(cell.to_string())),
        other => FieldValue::text(other.to_string()),
    }
}

impl ImportSource for ExcelSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    fn open(&self) -> ImportResult<RowIter<'_>> {
        ensure_exists(&self.path)?;

        let mut workbook: Xlsx<_> = open_workbook(&self.path)?;

        let sheet_name = match &self.sheet {
            Some(name) => name.clone(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?,
        };

        let range = workbook.worksheet_range(&sheet_name)?;
        debug!(path = %self.path.display(), sheet = %sheet_name, rows = range.height(), "打开 Excel 数据源");

        // 工作表整体载入后工作簿即可关闭
        let rows: Vec<RawRow> = range
            .rows()
            .map(|row| row.iter().map(excel_cell).collect())
            .collect();
        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    fn mode(&self) -> ImportMode {
        self.mode
    }

    fn decode_error_policy(&self) -> DecodeErrorPolicy {
        self.decode_error_policy
    }
}
