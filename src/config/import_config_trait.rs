// ==========================================
// 行数据同步导入 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入任务所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::import_config::ImportConfig;
use crate::domain::types::DateOrder;
use crate::importer::error::ImportResult;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入任务所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait ImportConfigReader {
    /// 是否试运行
    ///
    /// # 默认值
    /// - false
    fn get_dry_run(&self) -> ImportResult<bool>;

    /// 被跟踪字段变化时是否写历史
    ///
    /// # 默认值
    /// - true
    fn get_keep_history(&self) -> ImportResult<bool>;

    /// 是否删除未匹配的已有实体
    ///
    /// # 默认值
    /// - false
    fn get_delete_unmatched(&self) -> ImportResult<bool>;

    /// 必填字段为空时是否拒绝写入
    ///
    /// # 默认值
    /// - true
    fn get_reject_null_required(&self) -> ImportResult<bool>;

    /// 进度日志间隔（行）
    ///
    /// # 默认值
    /// - 1000
    fn get_progress_every(&self) -> ImportResult<usize>;

    /// 歧义日期的解析顺序
    ///
    /// # 默认值
    /// - DAY_FIRST
    fn get_date_order(&self) -> ImportResult<DateOrder>;

    /// 汇总为 ImportConfig
    fn load_import_config(&self) -> ImportResult<ImportConfig> {
        Ok(ImportConfig {
            dry_run: self.get_dry_run()?,
            keep_history: self.get_keep_history()?,
            delete_unmatched: self.get_delete_unmatched()?,
            reject_null_required: self.get_reject_null_required()?,
            progress_every: self.get_progress_every()?,
            date_order: self.get_date_order()?,
        })
    }
}
