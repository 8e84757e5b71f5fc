// ==========================================
// 行数据同步导入 - 数据源接口
// ==========================================
// 职责: 数据源 = 行生成器 + Mapping + 源级策略（模式 / 过滤 / 校验）
// 资源: open() 返回的迭代器持有底层资源（文件句柄 / 查询结果），
//       Drop 时释放，提前结束或出错同样释放
// ==========================================

use crate::domain::entity::Entity;
use crate::domain::types::ImportMode;
use crate::domain::value::FieldValue;
use crate::importer::error::ImportResult;
use crate::importer::row_decoder::{DecodedRow, RawRow};
use crate::mapping::Mapping;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 单遍、惰性的原始行序列
pub type RowIter<'a> = Box<dyn Iterator<Item = ImportResult<RawRow>> + 'a>;

// ==========================================
// 解码失败策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecodeErrorPolicy {
    /// 中止整次导入（不做部分导入）
    #[default]
    AbortRun,
    /// 跳过该行并计数
    SkipRow,
}

// ==========================================
// 待写入字段
// ==========================================
/// 单个字段的待写入值
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldUpdate {
    pub value: FieldValue,
    /// 是否需要写历史
    pub tracked: bool,
}

/// 实体的待写入字段集合（字段名有序）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldUpdates {
    updates: BTreeMap<String, FieldUpdate>,
}

impl FieldUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    /// 暂存字段值；tracked 标记只增不减
    pub fn stage(&mut self, field: &str, value: FieldValue, tracked: bool) {
        match self.updates.get_mut(field) {
            Some(existing) => {
                existing.value = value;
                existing.tracked |= tracked;
            }
            None => {
                self.updates
                    .insert(field.to_string(), FieldUpdate { value, tracked });
            }
        }
    }

    /// 撤销某字段的暂存值
    pub fn cancel(&mut self, field: &str) -> Option<FieldUpdate> {
        self.updates.remove(field)
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.updates.get(field).map(|u| &u.value)
    }

    pub fn is_tracked(&self, field: &str) -> bool {
        self.updates.get(field).map(|u| u.tracked).unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldUpdate)> {
        self.updates.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn clear(&mut self) {
        self.updates.clear();
    }

    /// 取出全部暂存值
    pub fn drain(&mut self) -> impl Iterator<Item = (String, FieldUpdate)> {
        std::mem::take(&mut self.updates).into_iter()
    }
}

// ==========================================
// ImportSource Trait
// ==========================================
// 实现者: CsvSource / ExcelSource / SqliteQuerySource / MemorySource，
//         或调用方自定义数据源
pub trait ImportSource {
    /// 数据源名称（日志与错误定位）
    fn name(&self) -> &str;

    fn mapping(&self) -> &Mapping;

    /// 打开行序列
    fn open(&self) -> ImportResult<RowIter<'_>>;

    /// 结果列名（按名绑定的字段据此定位；默认无列名）
    fn column_names(&self) -> ImportResult<Vec<String>> {
        Ok(Vec::new())
    }

    /// 新建 / 更新权限
    fn mode(&self) -> ImportMode {
        ImportMode::CreateAndUpdate
    }

    /// 行过滤（false = 忽略该行）
    fn should_import(&self, _row: &DecodedRow) -> bool {
        true
    }

    /// 源级校验: 返回 false 时丢弃该实体的全部待写入字段
    ///
    /// # 参数
    /// - entity: 实体（尚未应用待写入字段）
    /// - row: 当前行
    /// - updates: 该实体截至当前行的全部待写入字段
    /// - creating: 该行是否新建实体
    fn validate_updates(
        &self,
        _entity: &dyn Entity,
        _row: &DecodedRow,
        _updates: &FieldUpdates,
        _creating: bool,
    ) -> bool {
        true
    }

    /// 已有实体未出现在本数据源中
    ///
    /// # 参数
    /// - entity: 未出现的实体（尚未应用待写入字段）
    /// - updates: 该实体的待写入字段，可在此追加（如标记为停用）；
    ///   与存储值相同的字段会被丢弃
    fn on_data_not_found(&self, _entity: &dyn Entity, _updates: &mut FieldUpdates) {}

    fn decode_error_policy(&self) -> DecodeErrorPolicy {
        DecodeErrorPolicy::AbortRun
    }
}

// ==========================================
// MemorySource - 内存数据源
// ==========================================
/// 内存中的行集合（测试与程序化导入）
pub struct MemorySource {
    name: String,
    mapping: Mapping,
    column_names: Vec<String>,
    rows: Vec<RawRow>,
    mode: ImportMode,
    decode_error_policy: DecodeErrorPolicy,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, mapping: Mapping, rows: Vec<RawRow>) -> Self {
        Self {
            name: name.into(),
            mapping,
            column_names: Vec::new(),
            rows,
            mode: ImportMode::CreateAndUpdate,
            decode_error_policy: DecodeErrorPolicy::AbortRun,
        }
    }

    /// 由文本行构造
    pub fn from_text_rows<R, C>(name: impl Into<String>, mapping: Mapping, rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| FieldValue::text(cell.as_ref()))
                    .collect()
            })
            .collect();
        Self::new(name, mapping, rows)
    }

    pub fn with_mode(mut self, mode: ImportMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_decode_error_policy(mut self, policy: DecodeErrorPolicy) -> Self {
        self.decode_error_policy = policy;
        self
    }

    /// 列名（供按名绑定使用）
    pub fn with_column_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.column_names = names.into_iter().map(Into::into).collect();
        self
    }
}

impl ImportSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    fn open(&self) -> ImportResult<RowIter<'_>> {
        Ok(Box::new(self.rows.iter().cloned().map(Ok)))
    }

    fn column_names(&self) -> ImportResult<Vec<String>> {
        Ok(self.column_names.clone())
    }

    fn mode(&self) -> ImportMode {
        self.mode
    }

    fn decode_error_policy(&self) -> DecodeErrorPolicy {
        self.decode_error_policy
    }
}
