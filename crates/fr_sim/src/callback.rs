// crates/fr_sim/src/callback.rs
//! 运行回调。
//!
//! 编排主循环通过回调向外报告三类事情：状态行、数值指标与
//! 产物文件。回调方法不返回错误，个别监听方写不出去只记警告，
//! 不拖垮演进；产物文件在分发前统一做存在性检查。

use crate::error::{SimError, SimResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 进度状态行以百分号收尾，安静的监听方可以跳过。
fn is_progress_status(status: &str) -> bool {
    status.trim_end().ends_with('%')
}

// ============================================================
// 回调接口
// ============================================================

/// 运行事件的监听方。
///
/// 三个方法都有空默认实现，按需覆盖。实现必须自己处理失败，
/// 编排方不会因为某个监听方出错而中断运行。
pub trait RunCallback: Send + Sync {
    /// 监听方名字。
    fn name(&self) -> &str {
        "anonymous"
    }

    /// 状态行，如 `EVOLVE 42%`。
    fn on_status(&self, status: &str) {
        let _ = status;
    }

    /// 数值指标。
    fn on_metric(&self, name: &str, value: f64) {
        let _ = (name, value);
    }

    /// 产物文件就绪。路径已由分发方确认存在。
    fn on_file(&self, label: &str, path: &Path) {
        let _ = (label, path);
    }
}

/// 丢弃一切的监听方。
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCallback;

impl RunCallback for NullCallback {
    fn name(&self) -> &str {
        "null"
    }
}

// ============================================================
// 日志监听方
// ============================================================

/// 把事件写进 tracing 日志。
///
/// 默认跳过进度状态行，免得刷屏；`verbose` 时全记。
#[derive(Debug, Clone, Copy)]
pub struct LoggingCallback {
    verbose: bool,
}

impl LoggingCallback {
    /// 安静模式，进度行不记。
    #[must_use]
    pub fn new() -> Self {
        Self { verbose: false }
    }

    /// 全量模式。
    #[must_use]
    pub fn verbose() -> Self {
        Self { verbose: true }
    }
}

impl Default for LoggingCallback {
    fn default() -> Self {
        Self::new()
    }
}

impl RunCallback for LoggingCallback {
    fn name(&self) -> &str {
        "logging"
    }

    fn on_status(&self, status: &str) {
        if !self.verbose && is_progress_status(status) {
            return;
        }
        tracing::info!("status: {}", status);
    }

    fn on_metric(&self, name: &str, value: f64) {
        if self.verbose {
            tracing::info!("metric: {} = {}", name, value);
        }
    }

    fn on_file(&self, label: &str, path: &Path) {
        tracing::info!("file: {} -> {}", label, path.display());
    }
}

// ============================================================
// 收集监听方
// ============================================================

/// 把事件收进内存，测试与程序化调用用。
#[derive(Debug, Default)]
pub struct CollectingCallback {
    statuses: Mutex<Vec<String>>,
    metrics: Mutex<Vec<(String, f64)>>,
    files: Mutex<Vec<(String, PathBuf)>>,
}

impl CollectingCallback {
    /// 空收集器。
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 收到的状态行。
    #[must_use]
    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().clone()
    }

    /// 收到的指标。
    #[must_use]
    pub fn metrics(&self) -> Vec<(String, f64)> {
        self.metrics.lock().clone()
    }

    /// 收到的产物。
    #[must_use]
    pub fn files(&self) -> Vec<(String, PathBuf)> {
        self.files.lock().clone()
    }

    /// 最近一个指标值。
    #[must_use]
    pub fn last_metric(&self, name: &str) -> Option<f64> {
        self.metrics
            .lock()
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }
}

impl RunCallback for CollectingCallback {
    fn name(&self) -> &str {
        "collecting"
    }

    fn on_status(&self, status: &str) {
        self.statuses.lock().push(status.to_string());
    }

    fn on_metric(&self, name: &str, value: f64) {
        self.metrics.lock().push((name.to_string(), value));
    }

    fn on_file(&self, label: &str, path: &Path) {
        self.files.lock().push((label.to_string(), path.to_path_buf()));
    }
}

// ============================================================
// 流水账监听方
// ============================================================

/// 把事件逐行追加进运行流水账文件。
///
/// 每行带本地时间戳，写一行刷一行，半途崩掉也留得下现场。
pub struct JournalCallback {
    path: PathBuf,
    sink: Mutex<File>,
}

impl JournalCallback {
    /// 打开或续写流水账。
    pub fn create(path: impl Into<PathBuf>) -> SimResult<Self> {
        let path = path.into();
        let sink = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|source| SimError::Diagnostics {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            sink: Mutex::new(sink),
        })
    }

    /// 流水账路径。
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, line: &str) {
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut sink = self.sink.lock();
        if let Err(e) = writeln!(sink, "[{stamp}] {line}").and_then(|()| sink.flush()) {
            tracing::warn!("journal {} write failed: {}", self.path.display(), e);
        }
    }
}

impl RunCallback for JournalCallback {
    fn name(&self) -> &str {
        "journal"
    }

    fn on_status(&self, status: &str) {
        self.write_line(&format!("status: {status}"));
    }

    fn on_metric(&self, name: &str, value: f64) {
        self.write_line(&format!("metric: {name} = {value}"));
    }

    fn on_file(&self, label: &str, path: &Path) {
        self.write_line(&format!("file: {} -> {}", label, path.display()));
    }
}

// ============================================================
// 分发
// ============================================================

/// 监听方集合，事件按注册顺序分发给每一个。
#[derive(Default, Clone)]
pub struct CallbackSet {
    listeners: Vec<Arc<dyn RunCallback>>,
}

impl CallbackSet {
    /// 空集合。
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 带一个监听方的集合。
    #[must_use]
    pub fn with(listener: Arc<dyn RunCallback>) -> Self {
        let mut set = Self::new();
        set.push(listener);
        set
    }

    /// 追加监听方。
    pub fn push(&mut self, listener: Arc<dyn RunCallback>) {
        tracing::debug!("callback registered: {}", listener.name());
        self.listeners.push(listener);
    }

    /// 监听方个数。
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// 是否为空。
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// 分发状态行。
    pub fn status(&self, status: &str) {
        for listener in &self.listeners {
            listener.on_status(status);
        }
    }

    /// 分发指标。
    pub fn metric(&self, name: &str, value: f64) {
        for listener in &self.listeners {
            listener.on_metric(name, value);
        }
    }

    /// 确认产物存在后分发。文件缺失时一个监听方也不会收到。
    pub fn announce_file(&self, label: &str, path: &Path) -> SimResult<()> {
        if !path.exists() {
            return Err(SimError::MissingProduct {
                label: label.to_string(),
                path: path.to_path_buf(),
            });
        }
        for listener in &self.listeners {
            listener.on_file(label, path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_progress_status_detection() {
        assert!(is_progress_status("EVOLVE 42%"));
        assert!(is_progress_status("EVOLVE 100% "));
        assert!(!is_progress_status("INIT"));
        assert!(!is_progress_status("MEMORY WARNING 87% used now"));
    }

    #[test]
    fn test_fanout_reaches_every_listener() {
        let a = Arc::new(CollectingCallback::new());
        let b = Arc::new(CollectingCallback::new());
        let mut set = CallbackSet::new();
        set.push(a.clone());
        set.push(b.clone());

        set.status("INIT");
        set.metric("volume_m3", 12.5);
        assert_eq!(a.statuses(), vec!["INIT".to_string()]);
        assert_eq!(b.last_metric("volume_m3"), Some(12.5));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_announce_file_requires_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.tif");
        let collector = Arc::new(CollectingCallback::new());
        let set = CallbackSet::with(collector.clone());

        let err = set.announce_file("raster", &missing).unwrap_err();
        assert!(matches!(err, SimError::MissingProduct { .. }));
        assert!(collector.files().is_empty());

        let present = dir.path().join("present.tif");
        fs::write(&present, b"t").unwrap();
        set.announce_file("raster", &present).unwrap();
        assert_eq!(collector.files().len(), 1);
        assert_eq!(collector.files()[0].0, "raster");
    }

    #[test]
    fn test_journal_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_2.log");
        let journal = JournalCallback::create(&path).unwrap();
        journal.on_status("EVOLVE 10%");
        journal.on_metric("max_depth_m", 0.75);
        journal.on_file("summary", Path::new("run_summary_2.json"));

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("status: EVOLVE 10%"));
        assert!(lines[1].contains("metric: max_depth_m = 0.75"));
        assert!(lines[2].contains("file: summary -> run_summary_2.json"));

        // 再开一次是续写而不是清空
        let again = JournalCallback::create(&path).unwrap();
        again.on_status("RESTART");
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_collector_last_metric() {
        let c = CollectingCallback::new();
        c.on_metric("sim_time_s", 60.0);
        c.on_metric("sim_time_s", 120.0);
        assert_eq!(c.last_metric("sim_time_s"), Some(120.0));
        assert_eq!(c.last_metric("absent"), None);
    }
}
