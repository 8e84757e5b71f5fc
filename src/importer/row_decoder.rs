// ==========================================
// 行数据同步导入 - 行解码器
// ==========================================
// 职责: 原始行（单元格序列）+ Mapping → DecodedRow
// 流程: 行长度检查 → 按绑定顺序取值 → 自定义解析器 / schema 类型转换
// 红线: 解码失败不做部分导入，错误携带行号交由数据源策略处理
// ==========================================

use crate::domain::entity::EntitySchema;
use crate::domain::value::FieldValue;
use crate::importer::coercion::CoercionRegistry;
use crate::importer::error::{ImportError, ImportResult, RowDecodingError};
use crate::importer::import_source::{DecodeErrorPolicy, RowIter};
use crate::mapping::{BindingSource, FieldBinding, Mapping};
use serde::Serialize;
use std::collections::HashMap;
use std::iter::Enumerate;
use tracing::warn;

/// 原始行: 文本源为 Text 单元格，结构化源可为任意类型
pub type RawRow = Vec<FieldValue>;

// ==========================================
// DecodedRow - 解码后的行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedRow {
    row_index: usize,
    raw: RawRow,
    fields: Vec<(String, FieldValue)>,
}

impl DecodedRow {
    /// 行号（0 起，含表头行）
    pub fn row_index(&self) -> usize {
        self.row_index
    }

    /// 原始单元格
    pub fn raw(&self) -> &[FieldValue] {
        &self.raw
    }

    /// 原始单元格（按列号）
    pub fn cell(&self, column: usize) -> Option<&FieldValue> {
        self.raw.get(column)
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// 按绑定顺序的字段值（类型转换失败且被跳过的字段不在其中）
    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ==========================================
// RowDecoder - 行解码器
// ==========================================
pub struct RowDecoder<'a> {
    mapping: &'a Mapping,
    schema: &'a EntitySchema,
    coercions: &'a CoercionRegistry,
    required_len: usize,
    /// 结果列名 → 列号（按名绑定用）
    named_columns: HashMap<String, usize>,
}

impl<'a> RowDecoder<'a> {
    pub fn new(
        mapping: &'a Mapping,
        schema: &'a EntitySchema,
        coercions: &'a CoercionRegistry,
    ) -> Self {
        Self {
            mapping,
            schema,
            coercions,
            required_len: mapping.required_row_len(),
            named_columns: HashMap::new(),
        }
    }

    /// 登记数据源的结果列名，按名绑定的字段据此定位列号
    ///
    /// # 返回
    /// - Err: 某个按名绑定的列不在结果列中
    pub fn with_column_names(mut self, names: &[String]) -> Result<Self, String> {
        self.named_columns = names
            .iter()
            .enumerate()
            .map(|(index, name)| (name.clone(), index))
            .collect();

        let missing: Vec<&str> = self
            .mapping
            .bindings()
            .iter()
            .filter_map(|b| match b.source() {
                BindingSource::Named(column) if !self.named_columns.contains_key(column) => {
                    Some(column.as_str())
                }
                _ => None,
            })
            .collect();
        if !missing.is_empty() {
            return Err(format!("数据源缺少列: {}", missing.join(", ")));
        }
        Ok(self)
    }

    /// 解码一行
    ///
    /// # 参数
    /// - row_index: 行号（0 起）
    /// - raw: 原始单元格
    ///
    /// # 返回
    /// - Err(RowTooShort): 行长度小于 required_row_len()
    /// - Err(Coercion): 字段转换失败且该绑定未设置 skip_invalid
    pub fn decode(&self, row_index: usize, raw: &[FieldValue]) -> Result<DecodedRow, RowDecodingError> {
        if raw.len() < self.required_len {
            return Err(RowDecodingError::RowTooShort {
                row: row_index,
                expected: self.required_len,
                actual: raw.len(),
            });
        }

        let mut fields = Vec::with_capacity(self.mapping.bindings().len());
        for binding in self.mapping.bindings() {
            match self.decode_field(binding, raw) {
                Ok(value) => {
                    if binding.warn_if_empty() && value.is_empty() {
                        warn!(row = row_index, field = binding.name(), "字段值为空");
                    }
                    fields.push((binding.name().to_string(), value));
                }
                Err((value, message)) if binding.skip_invalid() => {
                    if binding.warn_on_error() {
                        warn!(
                            row = row_index,
                            field = binding.name(),
                            value = %value,
                            error = %message,
                            "字段值无效，已跳过"
                        );
                    }
                }
                Err((value, message)) => {
                    return Err(RowDecodingError::Coercion {
                        row: row_index,
                        field: binding.name().to_string(),
                        value,
                        message,
                    });
                }
            }
        }

        Ok(DecodedRow {
            row_index,
            raw: raw.to_vec(),
            fields,
        })
    }

    // 失败时返回 (原始值文本, 错误描述)
    fn decode_field(
        &self,
        binding: &FieldBinding,
        raw: &[FieldValue],
    ) -> Result<FieldValue, (String, String)> {
        let value = match binding.source() {
            BindingSource::Column(column) => cell_or_empty(raw, *column),
            BindingSource::Named(column) => match self.named_columns.get(column) {
                Some(index) => cell_or_empty(raw, *index),
                None => return Err((String::new(), format!("数据源缺少列: {}", column))),
            },
            BindingSource::Computed { columns, computer } => {
                let cells: Vec<FieldValue> = columns.iter().map(|c| cell_or_empty(raw, *c)).collect();
                return computer(&cells).map_err(|message| (join_cells(&cells), message));
            }
            BindingSource::Constant(value) => return Ok(value.clone()),
        };

        match binding.parser() {
            Some(parser) => {
                let text = value.to_string();
                parser(&text).map_err(|message| (text, message))
            }
            None => self
                .coercions
                .coerce(&value, self.schema.field_type(binding.name()))
                .map_err(|message| (value.to_string(), message)),
        }
    }
}

// ==========================================
// DecodedRows - 惰性解码序列
// ==========================================
/// 原始行序列 → 解码后的数据行
///
/// 跳过表头行；解码失败按数据源策略中止（错误带数据源名）或跳过并计数。
/// 返回错误后序列结束。
pub struct DecodedRows<'a> {
    rows: Enumerate<RowIter<'a>>,
    decoder: RowDecoder<'a>,
    source_name: &'a str,
    policy: DecodeErrorPolicy,
    header_rows: usize,
    decode_errors: usize,
    failed: bool,
}

impl<'a> DecodedRows<'a> {
    pub fn new(
        rows: RowIter<'a>,
        decoder: RowDecoder<'a>,
        source_name: &'a str,
        policy: DecodeErrorPolicy,
    ) -> Self {
        Self {
            rows: rows.enumerate(),
            decoder,
            source_name,
            policy,
            header_rows: 0,
            decode_errors: 0,
            failed: false,
        }
    }

    /// 已跳过的表头行数
    pub fn header_rows(&self) -> usize {
        self.header_rows
    }

    /// SkipRow 策略下跳过的行数
    pub fn decode_errors(&self) -> usize {
        self.decode_errors
    }
}

impl Iterator for DecodedRows<'_> {
    type Item = ImportResult<DecodedRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let (row_index, raw) = self.rows.next()?;
            let raw = match raw {
                Ok(raw) => raw,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };

            if self.decoder.mapping.is_header_row(row_index) {
                self.header_rows += 1;
                continue;
            }

            match self.decoder.decode(row_index, &raw) {
                Ok(row) => return Some(Ok(row)),
                Err(error) => match self.policy {
                    DecodeErrorPolicy::AbortRun => {
                        self.failed = true;
                        return Some(Err(ImportError::decoding(self.source_name, error)));
                    }
                    DecodeErrorPolicy::SkipRow => {
                        warn!(
                            source = self.source_name,
                            row = row_index,
                            error = %error,
                            "行解码失败,已跳过"
                        );
                        self.decode_errors += 1;
                    }
                },
            }
        }
    }
}

// allow_missing 的绑定可能越界，按空串读取
fn cell_or_empty(raw: &[FieldValue], column: usize) -> FieldValue {
    raw.get(column)
        .cloned()
        .unwrap_or_else(|| FieldValue::text(""))
}

fn join_cells(cells: &[FieldValue]) -> String {
    cells
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
