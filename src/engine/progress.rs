// ==========================================
// 行数据同步导入 - 进度通知
// ==========================================
// 用途: 外部进度展示（进度条 / 日志）
// ==========================================

use crate::engine::report::SourceReport;
use tracing::info;

pub trait ProgressSink {
    fn source_started(&mut self, _source: &str) {}

    /// 已处理行数（含表头，从 1 计）
    fn row_processed(&mut self, _source: &str, _rows: usize) {}

    fn source_finished(&mut self, _report: &SourceReport) {}

    /// 写入阶段进度
    fn applying(&mut self, _done: usize, _total: usize) {}
}

/// 不输出任何进度
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// 每 every 行输出一次 info 日志
#[derive(Debug, Clone, Copy)]
pub struct TracingProgress {
    every: usize,
}

impl TracingProgress {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl Default for TracingProgress {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl ProgressSink for TracingProgress {
    fn source_started(&mut self, source: &str) {
        info!(source, "读取数据源");
    }

    fn row_processed(&mut self, source: &str, rows: usize) {
        if rows % self.every == 0 {
            info!(source, rows, "读取进度");
        }
    }

    fn source_finished(&mut self, report: &SourceReport) {
        info!(
            source = %report.name,
            read = report.read,
            skipped = report.skipped(),
            not_found = report.not_found,
            "数据源读取完成"
        );
    }

    fn applying(&mut self, done: usize, total: usize) {
        if done == total || done % self.every == 0 {
            info!(done, total, "写入进度");
        }
    }
}
