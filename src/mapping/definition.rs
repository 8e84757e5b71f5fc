// ==========================================
// 行数据同步导入 - 映射定义
// ==========================================
// 职责: 有序字段绑定 + 主键字段 + 表头行配置
// 构建: MappingBuilder 逐个登记字段，build() 时一次性校验
// 红线: 构建完成后不可变；配置错误在导入开始前暴露
// ==========================================

use crate::domain::value::FieldValue;
use crate::mapping::binding::{BindingSource, FieldBinding, FieldOptions};
use crate::mapping::columns::column_index;
use crate::mapping::error::MappingError;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// 默认主键字段名
pub const DEFAULT_KEY_FIELD: &str = "id";

/// 默认表头行号（第 0 行为表头）
pub const DEFAULT_HEADER_LINE: i64 = 0;

/// 无表头
pub const NO_HEADER: i64 = -1;

/// 主键归一化: 字段值 → 可哈希的主键（None 表示无主键）
pub type KeyNormalizer = Arc<dyn Fn(&FieldValue) -> Option<String> + Send + Sync>;

// ==========================================
// Mapping - 映射定义（不可变）
// ==========================================
#[derive(Clone)]
pub struct Mapping {
    bindings: Vec<FieldBinding>,
    key_field: String,
    header_line_number: i64,
    key_normalizer: Option<KeyNormalizer>,
}

impl Mapping {
    pub fn builder() -> MappingBuilder {
        MappingBuilder::new()
    }

    /// 按声明顺序（即列号顺序）的字段绑定
    pub fn bindings(&self) -> &[FieldBinding] {
        &self.bindings
    }

    pub fn binding(&self, name: &str) -> Option<&FieldBinding> {
        self.bindings.iter().find(|b| b.name() == name)
    }

    /// 用于匹配已有实体的主键字段名
    pub fn key_column_name(&self) -> &str {
        &self.key_field
    }

    /// 表头行号（0 起；-1 表示无表头）
    pub fn header_line_number(&self) -> i64 {
        self.header_line_number
    }

    /// 该行是否属于表头（应跳过）
    pub fn is_header_row(&self, row_index: usize) -> bool {
        self.header_line_number >= 0 && (row_index as i64) <= self.header_line_number
    }

    /// 主键归一化（存储值与输入值使用同一规则）
    pub fn normalize_key(&self, value: &FieldValue) -> Option<String> {
        match &self.key_normalizer {
            Some(normalizer) => normalizer(value),
            None => value.key_string(),
        }
    }

    /// 解码所需的最小行长度
    ///
    /// 仅统计 fail_on_out_of_range 的绑定
    pub fn required_row_len(&self) -> usize {
        self.bindings
            .iter()
            .filter(|b| b.fail_on_out_of_range())
            .flat_map(|b| b.source().columns())
            .map(|c| c + 1)
            .max()
            .unwrap_or(0)
    }

}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("bindings", &self.bindings)
            .field("key_field", &self.key_field)
            .field("header_line_number", &self.header_line_number)
            .field("custom_key_normalizer", &self.key_normalizer.is_some())
            .finish()
    }
}

// ==========================================
// MappingBuilder - 映射构建器
// ==========================================
/// 映射构建器
///
/// # 示例
/// ```
/// use rowsync::mapping::{FieldOptions, Mapping};
///
/// let mapping = Mapping::builder()
///     .auto("serialnumber")
///     .auto_with("status", FieldOptions::tracked())
///     .col("location", 4)
///     .key("serialnumber")
///     .build()
///     .unwrap();
///
/// assert_eq!(mapping.key_column_name(), "serialnumber");
/// assert_eq!(mapping.binding("location").unwrap().column(), Some(4));
/// ```
pub struct MappingBuilder {
    bindings: Vec<FieldBinding>,
    auto_counter: usize,
    key_field: Option<String>,
    header_line_number: i64,
    key_normalizer: Option<KeyNormalizer>,
    error: Option<MappingError>,
}

impl Default for MappingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MappingBuilder {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
            auto_counter: 0,
            key_field: None,
            header_line_number: DEFAULT_HEADER_LINE,
            key_normalizer: None,
            error: None,
        }
    }

    /// 登记字段到下一个可用列
    pub fn auto(self, name: impl Into<String>) -> Self {
        self.auto_with(name, FieldOptions::default())
    }

    pub fn auto_with(mut self, name: impl Into<String>, options: FieldOptions) -> Self {
        let column = self.auto_counter;
        self.auto_counter += 1;
        self.push(name.into(), BindingSource::Column(column), options)
    }

    /// 登记字段到指定列（0 起），后续 auto() 从 column + 1 继续
    pub fn col(self, name: impl Into<String>, column: usize) -> Self {
        self.col_with(name, column, FieldOptions::default())
    }

    pub fn col_with(mut self, name: impl Into<String>, column: usize, options: FieldOptions) -> Self {
        self.auto_counter = column + 1;
        self.push(name.into(), BindingSource::Column(column), options)
    }

    /// 按 A1 记法列名登记（如 "A"、"AF"）
    pub fn col_letter(self, name: impl Into<String>, column: &str) -> Self {
        self.col_letter_with(name, column, FieldOptions::default())
    }

    pub fn col_letter_with(
        mut self,
        name: impl Into<String>,
        column: &str,
        options: FieldOptions,
    ) -> Self {
        let name = name.into();
        match column_index(column) {
            Some(index) => self.col_with(name, index, options),
            None => {
                self.record_error(MappingError::InvalidColumnRef {
                    field: name,
                    column: column.to_string(),
                });
                self
            }
        }
    }

    /// 按结果列名绑定（列名与字段名相同，不占用自动列号）
    pub fn named(self, name: impl Into<String>) -> Self {
        let name = name.into();
        let column = name.clone();
        self.named_with(name, column, FieldOptions::default())
    }

    /// 按结果列名绑定到指定字段
    pub fn named_with(
        self,
        name: impl Into<String>,
        column: impl Into<String>,
        options: FieldOptions,
    ) -> Self {
        self.push(name.into(), BindingSource::Named(column.into()), options)
    }

    /// 由多列计算的字段（不占用自动列号）
    pub fn computed<F>(
        self,
        name: impl Into<String>,
        columns: &[usize],
        computer: F,
        options: FieldOptions,
    ) -> Self
    where
        F: Fn(&[FieldValue]) -> Result<FieldValue, String> + Send + Sync + 'static,
    {
        let source = BindingSource::Computed {
            columns: columns.to_vec(),
            computer: Arc::new(computer),
        };
        self.push(name.into(), source, options)
    }

    /// 常量字段
    pub fn constant(
        self,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
        options: FieldOptions,
    ) -> Self {
        self.push(name.into(), BindingSource::Constant(value.into()), options)
    }

    /// 指定主键字段名（默认 "id"）
    pub fn key(mut self, name: impl Into<String>) -> Self {
        self.key_field = Some(name.into());
        self
    }

    pub fn key_normalizer<F>(mut self, normalizer: F) -> Self
    where
        F: Fn(&FieldValue) -> Option<String> + Send + Sync + 'static,
    {
        self.key_normalizer = Some(Arc::new(normalizer));
        self
    }

    /// 表头行号（0 起；-1 表示无表头）
    pub fn header_line(mut self, line: i64) -> Self {
        self.header_line_number = line;
        self
    }

    pub fn no_header(self) -> Self {
        self.header_line(NO_HEADER)
    }

    fn push(mut self, name: String, source: BindingSource, options: FieldOptions) -> Self {
        self.bindings.push(FieldBinding::new(name, source, options));
        self
    }

    // 仅保留第一个错误
    fn record_error(&mut self, error: MappingError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// 校验并生成不可变 Mapping
    pub fn build(self) -> Result<Mapping, MappingError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        if self.header_line_number < NO_HEADER {
            return Err(MappingError::InvalidHeaderLine(self.header_line_number));
        }

        let mut names: HashSet<&str> = HashSet::new();
        let mut used_columns: HashMap<usize, &str> = HashMap::new();
        let mut previous_column: Option<usize> = None;

        for binding in &self.bindings {
            let name = binding.name();
            if name.trim().is_empty() {
                return Err(MappingError::EmptyFieldName);
            }
            if !names.insert(name) {
                return Err(MappingError::DuplicateField(name.to_string()));
            }

            match binding.source() {
                BindingSource::Column(column) => {
                    if let Some(existing) = used_columns.get(column) {
                        return Err(MappingError::DuplicateColumn {
                            field: name.to_string(),
                            column: *column,
                            existing: existing.to_string(),
                        });
                    }
                    if let Some(previous) = previous_column {
                        if *column < previous {
                            return Err(MappingError::ColumnOutOfOrder {
                                field: name.to_string(),
                                column: *column,
                                previous,
                            });
                        }
                    }
                    used_columns.insert(*column, name);
                    previous_column = Some(*column);
                }
                BindingSource::Computed { columns, .. } if columns.is_empty() => {
                    return Err(MappingError::EmptyComputedColumns(name.to_string()));
                }
                BindingSource::Named(column) if column.trim().is_empty() => {
                    return Err(MappingError::EmptyColumnName(name.to_string()));
                }
                _ => {}
            }
        }

        let key_field = resolve_key_field(&self.bindings, self.key_field)?;

        Ok(Mapping {
            bindings: self.bindings,
            key_field,
            header_line_number: self.header_line_number,
            key_normalizer: self.key_normalizer,
        })
    }
}

// 主键解析: is_key 标记优先；显式指定的名字必须与之一致；否则默认 "id"
fn resolve_key_field(
    bindings: &[FieldBinding],
    declared: Option<String>,
) -> Result<String, MappingError> {
    let mut flagged: Option<&str> = None;
    for binding in bindings.iter().filter(|b| b.is_key()) {
        if let Some(first) = flagged {
            return Err(MappingError::MultipleKeyFields {
                first: first.to_string(),
                second: binding.name().to_string(),
            });
        }
        flagged = Some(binding.name());
    }

    match (declared, flagged) {
        (Some(declared), Some(flagged)) if declared != flagged => Err(MappingError::KeyConflict {
            declared,
            flagged: flagged.to_string(),
        }),
        (_, Some(flagged)) => Ok(flagged.to_string()),
        (declared, None) => {
            let key = declared.unwrap_or_else(|| DEFAULT_KEY_FIELD.to_string());
            if bindings.iter().any(|b| b.name() == key) {
                Ok(key)
            } else {
                Err(MappingError::KeyFieldNotFound(key))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_columns_increment() {
        let mapping = Mapping::builder()
            .auto("id")
            .auto("col1")
            .auto("col2")
            .build()
            .unwrap();

        let columns: Vec<_> = mapping.bindings().iter().map(|b| b.column()).collect();
        assert_eq!(columns, vec![Some(0), Some(1), Some(2)]);
        assert_eq!(mapping.key_column_name(), "id");
        assert_eq!(mapping.header_line_number(), 0);
        assert_eq!(mapping.required_row_len(), 3);
    }

    #[test]
    fn test_col_resets_auto_counter() {
        let mapping = Mapping::builder()
            .col_letter("id", "A")
            .auto("col1")
            .col("col5", 5)
            .auto("col6")
            .build()
            .unwrap();

        assert_eq!(mapping.binding("id").unwrap().column(), Some(0));
        assert_eq!(mapping.binding("col1").unwrap().column(), Some(1));
        assert_eq!(mapping.binding("col5").unwrap().column(), Some(5));
        assert_eq!(mapping.binding("col6").unwrap().column(), Some(6));
        assert_eq!(mapping.required_row_len(), 7);
    }

    #[test]
    fn test_duplicate_column_is_configuration_error() {
        let result = Mapping::builder()
            .auto("id")
            .auto("col1")
            .col("col2", 1)
            .build();

        assert_eq!(
            result.unwrap_err(),
            MappingError::DuplicateColumn {
                field: "col2".to_string(),
                column: 1,
                existing: "col1".to_string(),
            }
        );
    }

    #[test]
    fn test_column_out_of_order_rejected() {
        let result = Mapping::builder().col("id", 3).col("col1", 1).build();
        assert!(matches!(
            result,
            Err(MappingError::ColumnOutOfOrder { column: 1, previous: 3, .. })
        ));
    }

    #[test]
    fn test_key_field_must_resolve() {
        let result = Mapping::builder().auto("serialnumber").build();
        assert_eq!(
            result.unwrap_err(),
            MappingError::KeyFieldNotFound("id".to_string())
        );

        let mapping = Mapping::builder()
            .auto("serialnumber")
            .key("serialnumber")
            .build()
            .unwrap();
        assert_eq!(mapping.key_column_name(), "serialnumber");
    }

    #[test]
    fn test_key_flag_selects_key_field() {
        let mapping = Mapping::builder()
            .auto_with("code", FieldOptions::new().key())
            .auto("label")
            .build()
            .unwrap();
        assert_eq!(mapping.key_column_name(), "code");

        let conflict = Mapping::builder()
            .auto_with("code", FieldOptions::new().key())
            .auto("label")
            .key("label")
            .build();
        assert!(matches!(conflict, Err(MappingError::KeyConflict { .. })));

        let multiple = Mapping::builder()
            .auto_with("code", FieldOptions::new().key())
            .auto_with("label", FieldOptions::new().key())
            .build();
        assert!(matches!(multiple, Err(MappingError::MultipleKeyFields { .. })));
    }

    #[test]
    fn test_invalid_letter_and_duplicate_name() {
        let invalid = Mapping::builder().col_letter("id", "1A").build();
        assert!(matches!(invalid, Err(MappingError::InvalidColumnRef { .. })));

        let duplicate = Mapping::builder().auto("id").auto("id").build();
        assert_eq!(
            duplicate.unwrap_err(),
            MappingError::DuplicateField("id".to_string())
        );
    }

    #[test]
    fn test_header_line_configuration() {
        let mapping = Mapping::builder().auto("id").no_header().build().unwrap();
        assert!(!mapping.is_header_row(0));

        let mapping = Mapping::builder().auto("id").header_line(1).build().unwrap();
        assert!(mapping.is_header_row(0));
        assert!(mapping.is_header_row(1));
        assert!(!mapping.is_header_row(2));

        let invalid = Mapping::builder().auto("id").header_line(-2).build();
        assert_eq!(invalid.unwrap_err(), MappingError::InvalidHeaderLine(-2));
    }

    #[test]
    fn test_computed_and_constant_do_not_consume_columns() {
        let mapping = Mapping::builder()
            .auto("id")
            .computed(
                "total",
                &[1, 2],
                |cells| Ok(FieldValue::text(format!("{}{}", cells[0], cells[1]))),
                FieldOptions::new(),
            )
            .constant("origin", "csv", FieldOptions::new())
            .auto("name")
            .build()
            .unwrap();

        assert_eq!(mapping.binding("name").unwrap().column(), Some(1));
        assert_eq!(mapping.required_row_len(), 3);

        let empty = Mapping::builder()
            .auto("id")
            .computed("total", &[], |_| Ok(FieldValue::Null), FieldOptions::new())
            .build();
        assert!(matches!(empty, Err(MappingError::EmptyComputedColumns(_))));
    }

    #[test]
    fn test_named_bindings() {
        let mapping = Mapping::builder()
            .named("code")
            .auto("qty")
            .named_with("label", "description", FieldOptions::new())
            .key("code")
            .build()
            .unwrap();

        assert_eq!(mapping.binding("code").unwrap().column(), None);
        // 按名绑定不影响自动列号
        assert_eq!(mapping.binding("qty").unwrap().column(), Some(0));
        assert_eq!(mapping.required_row_len(), 1);

        let empty = Mapping::builder()
            .auto("id")
            .named_with("label", " ", FieldOptions::new())
            .build();
        assert_eq!(
            empty.unwrap_err(),
            MappingError::EmptyColumnName("label".to_string())
        );
    }

    #[test]
    fn test_custom_key_normalizer() {
        let mapping = Mapping::builder()
            .auto("code")
            .key("code")
            .key_normalizer(|v| v.key_string().map(|s| s.to_uppercase()))
            .build()
            .unwrap();

        assert_eq!(
            mapping.normalize_key(&FieldValue::text(" ab1 ")),
            Some("AB1".to_string())
        );
        assert_eq!(mapping.normalize_key(&FieldValue::Null), None);
    }
}
