// ==========================================
// 行数据同步导入 - 运行策略配置
// ==========================================
// 来源: 代码默认值 → JSON / config_kv 覆写
// ==========================================

use crate::domain::types::DateOrder;
use crate::engine::reconciliation::FinishOptions;
use crate::importer::error::{ImportError, ImportResult};
use serde::{Deserialize, Serialize};

/// 默认进度日志间隔（行）
pub const DEFAULT_PROGRESS_EVERY: usize = 1000;

// ==========================================
// ImportConfig - 导入任务策略
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// 只计算不提交
    pub dry_run: bool,
    /// 被跟踪字段变化时写历史
    pub keep_history: bool,
    /// 删除未被任何数据源匹配的已有实体
    pub delete_unmatched: bool,
    /// 必填字段为空时拒绝写入
    pub reject_null_required: bool,
    pub progress_every: usize,
    /// 歧义日期（01/02/2024）的解析顺序
    pub date_order: DateOrder,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            keep_history: true,
            delete_unmatched: false,
            reject_null_required: true,
            progress_every: DEFAULT_PROGRESS_EVERY,
            date_order: DateOrder::DayFirst,
        }
    }
}

impl ImportConfig {
    /// 从 JSON 读取（缺省字段取默认值）
    ///
    /// # 示例
    /// ```
    /// use rowsync::config::ImportConfig;
    ///
    /// let config = ImportConfig::from_json(r#"{"dry_run": true}"#).unwrap();
    /// assert!(config.dry_run);
    /// assert!(config.keep_history);
    /// ```
    pub fn from_json(json: &str) -> ImportResult<Self> {
        serde_json::from_str(json).map_err(|e| ImportError::ConfigValueError {
            key: "import_config".to_string(),
            value: json.to_string(),
            message: e.to_string(),
        })
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn delete_unmatched(mut self, delete_unmatched: bool) -> Self {
        self.delete_unmatched = delete_unmatched;
        self
    }

    pub fn keep_history(mut self, keep_history: bool) -> Self {
        self.keep_history = keep_history;
        self
    }

    pub fn finish_options(&self) -> FinishOptions {
        FinishOptions {
            keep_history: self.keep_history,
            delete_unmatched: self.delete_unmatched,
            reject_null_required: self.reject_null_required,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ImportConfig::default();
        assert!(!config.dry_run);
        assert!(config.keep_history);
        assert!(!config.delete_unmatched);
        assert!(config.reject_null_required);
        assert_eq!(config.progress_every, 1000);
        assert_eq!(config.date_order, DateOrder::DayFirst);
    }

    #[test]
    fn test_from_json_partial() {
        let config =
            ImportConfig::from_json(r#"{"delete_unmatched": true, "date_order": "MONTH_FIRST"}"#)
                .unwrap();
        assert!(config.delete_unmatched);
        assert_eq!(config.date_order, DateOrder::MonthFirst);
        assert_eq!(config.progress_every, DEFAULT_PROGRESS_EVERY);
    }

    #[test]
    fn test_from_json_invalid() {
        let err = ImportConfig::from_json(r#"{"dry_run": "maybe"}"#).unwrap_err();
        assert!(matches!(err, ImportError::ConfigValueError { .. }));
    }
}
