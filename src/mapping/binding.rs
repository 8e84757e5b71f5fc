// ==========================================
// 行数据同步导入 - 字段绑定
// ==========================================
// 职责: 输入列 → 实体字段的单条绑定及其导入选项
// 生命周期: Mapping 构建时创建，之后不可变
// ==========================================

use crate::domain::value::FieldValue;
use std::fmt;
use std::sync::Arc;

/// 自定义解析器: 原始文本 → 字段值
pub type Parser = Arc<dyn Fn(&str) -> Result<FieldValue, String> + Send + Sync>;

/// 自定义比较器: (新值, 当前值) → 是否视为相等
pub type Comparator = Arc<dyn Fn(&FieldValue, &FieldValue) -> bool + Send + Sync>;

/// 计算字段: 多个输入单元格 → 字段值
pub type Computer = Arc<dyn Fn(&[FieldValue]) -> Result<FieldValue, String> + Send + Sync>;

// ==========================================
// BindingSource - 字段取值来源
// ==========================================
#[derive(Clone)]
pub enum BindingSource {
    /// 单列（0 起列号）
    Column(usize),
    /// 按结果列名取值（结构化数据源，如 SQL 查询）
    Named(String),
    /// 由多列计算
    Computed {
        columns: Vec<usize>,
        computer: Computer,
    },
    /// 常量
    Constant(FieldValue),
}

impl BindingSource {
    /// 读取的所有列号（按名绑定不占列号）
    pub fn columns(&self) -> Vec<usize> {
        match self {
            BindingSource::Column(c) => vec![*c],
            BindingSource::Computed { columns, .. } => columns.clone(),
            BindingSource::Named(_) | BindingSource::Constant(_) => Vec::new(),
        }
    }
}

impl fmt::Debug for BindingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingSource::Column(c) => f.debug_tuple("Column").field(c).finish(),
            BindingSource::Named(n) => f.debug_tuple("Named").field(n).finish(),
            BindingSource::Computed { columns, .. } => f
                .debug_struct("Computed")
                .field("columns", columns)
                .finish_non_exhaustive(),
            BindingSource::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
        }
    }
}

// ==========================================
// FieldOptions - 字段导入选项
// ==========================================
/// 字段导入选项（链式构造）
///
/// # 默认值
/// - keep_history: false
/// - should_update: true（false = 仅新建时写入）
/// - update_only_if_null: false
/// - warn_on_error: true
/// - warn_if_empty: false
/// - fail_on_out_of_range: true（false = 缺失单元格按空串处理）
/// - skip_invalid: false（true = 类型转换失败时丢弃该字段而不是整行失败）
#[derive(Clone)]
pub struct FieldOptions {
    pub(crate) keep_history: bool,
    pub(crate) is_key: bool,
    pub(crate) should_update: bool,
    pub(crate) update_only_if_null: bool,
    pub(crate) warn_on_error: bool,
    pub(crate) warn_if_empty: bool,
    pub(crate) fail_on_out_of_range: bool,
    pub(crate) skip_invalid: bool,
    pub(crate) parser: Option<Parser>,
    pub(crate) comparator: Option<Comparator>,
    pub(crate) header: Option<String>,
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self {
            keep_history: false,
            is_key: false,
            should_update: true,
            update_only_if_null: false,
            warn_on_error: true,
            warn_if_empty: false,
            fail_on_out_of_range: true,
            skip_invalid: false,
            parser: None,
            comparator: None,
            header: None,
        }
    }
}

impl FieldOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 被跟踪字段（变更时写历史）
    pub fn tracked() -> Self {
        Self::default().keep_history()
    }

    pub fn keep_history(mut self) -> Self {
        self.keep_history = true;
        self
    }

    /// 标记为主键字段
    pub fn key(mut self) -> Self {
        self.is_key = true;
        self
    }

    /// 仅在新建实体时写入
    pub fn no_update(mut self) -> Self {
        self.should_update = false;
        self
    }

    /// 仅当已存值为 NULL 时更新
    pub fn update_only_if_null(mut self) -> Self {
        self.update_only_if_null = true;
        self
    }

    pub fn warn_if_empty(mut self) -> Self {
        self.warn_if_empty = true;
        self
    }

    /// 类型转换失败时不输出告警
    pub fn quiet(mut self) -> Self {
        self.warn_on_error = false;
        self
    }

    pub fn skip_invalid(mut self) -> Self {
        self.skip_invalid = true;
        self
    }

    /// 行长度不足时按空串读取
    pub fn allow_missing(mut self) -> Self {
        self.fail_on_out_of_range = false;
        self
    }

    pub fn parser<F>(mut self, parser: F) -> Self
    where
        F: Fn(&str) -> Result<FieldValue, String> + Send + Sync + 'static,
    {
        self.parser = Some(Arc::new(parser));
        self
    }

    pub fn comparator<F>(mut self, comparator: F) -> Self
    where
        F: Fn(&FieldValue, &FieldValue) -> bool + Send + Sync + 'static,
    {
        self.comparator = Some(Arc::new(comparator));
        self
    }

    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }
}

// ==========================================
// FieldBinding - 字段绑定
// ==========================================
#[derive(Clone)]
pub struct FieldBinding {
    name: String,
    source: BindingSource,
    options: FieldOptions,
}

impl FieldBinding {
    pub(crate) fn new(name: String, source: BindingSource, options: FieldOptions) -> Self {
        Self {
            name,
            source,
            options,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &BindingSource {
        &self.source
    }

    /// 单列绑定的列号
    pub fn column(&self) -> Option<usize> {
        match self.source {
            BindingSource::Column(c) => Some(c),
            _ => None,
        }
    }

    pub fn keep_history(&self) -> bool {
        self.options.keep_history
    }

    pub fn is_key(&self) -> bool {
        self.options.is_key
    }

    pub fn should_update(&self) -> bool {
        self.options.should_update
    }

    pub fn update_only_if_null(&self) -> bool {
        self.options.update_only_if_null
    }

    pub fn warn_on_error(&self) -> bool {
        self.options.warn_on_error
    }

    pub fn warn_if_empty(&self) -> bool {
        self.options.warn_if_empty
    }

    pub fn fail_on_out_of_range(&self) -> bool {
        self.options.fail_on_out_of_range
    }

    pub fn skip_invalid(&self) -> bool {
        self.options.skip_invalid
    }

    pub fn parser(&self) -> Option<&Parser> {
        self.options.parser.as_ref()
    }

    /// 展示用列标题（未设置时为字段名）
    pub fn header(&self) -> &str {
        self.options.header.as_deref().unwrap_or(&self.name)
    }

    /// 比较新值与当前值（默认相等比较）
    pub fn values_equal(&self, new: &FieldValue, current: &FieldValue) -> bool {
        match &self.options.comparator {
            Some(cmp) => cmp(new, current),
            None => new == current,
        }
    }
}

impl fmt::Debug for FieldBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("keep_history", &self.options.keep_history)
            .field("is_key", &self.options.is_key)
            .field("should_update", &self.options.should_update)
            .field("update_only_if_null", &self.options.update_only_if_null)
            .field("skip_invalid", &self.options.skip_invalid)
            .finish_non_exhaustive()
    }
}
