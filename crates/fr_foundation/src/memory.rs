// crates/fr_foundation/src/memory.rs

//! 内存压力采样
//!
//! 长时间演进中按步采样系统内存占用，超过阈值时由上层
//! 发出告警。采样是建议性的，不会中断运行。

use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::defaults::{MEMORY_CRITICAL_FRACTION, MEMORY_WARNING_FRACTION};

/// 内存压力等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryPressure {
    /// 占用低于告警阈值
    Normal,
    /// 占用达到告警阈值
    Warning,
    /// 占用达到临界阈值
    Critical,
}

impl MemoryPressure {
    /// 根据占用比例和阈值划分等级
    pub fn classify(fraction: f64, warning: f64, critical: f64) -> Self {
        if fraction >= critical {
            Self::Critical
        } else if fraction >= warning {
            Self::Warning
        } else {
            Self::Normal
        }
    }

    /// 是否需要上层发出告警
    pub fn is_elevated(&self) -> bool {
        !matches!(self, Self::Normal)
    }
}

impl std::fmt::Display for MemoryPressure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "NORMAL"),
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// 单次内存采样结果
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MemorySample {
    /// 已用内存（字节）
    pub used_bytes: u64,
    /// 总内存（字节）
    pub total_bytes: u64,
    /// 占用比例 [0, 1]
    pub fraction: f64,
    /// 压力等级
    pub pressure: MemoryPressure,
}

/// 系统内存监控器
///
/// 持有 sysinfo 句柄，按需刷新并给出压力等级。
pub struct MemoryMonitor {
    system: System,
    warning_fraction: f64,
    critical_fraction: f64,
}

impl MemoryMonitor {
    /// 使用默认阈值创建监控器
    pub fn new() -> Self {
        Self::with_thresholds(MEMORY_WARNING_FRACTION, MEMORY_CRITICAL_FRACTION)
    }

    /// 使用自定义阈值创建监控器
    pub fn with_thresholds(warning_fraction: f64, critical_fraction: f64) -> Self {
        Self {
            system: System::new(),
            warning_fraction,
            critical_fraction,
        }
    }

    /// 刷新并采样当前内存占用
    pub fn sample(&mut self) -> MemorySample {
        self.system.refresh_memory();
        let used = self.system.used_memory();
        let total = self.system.total_memory();
        let fraction = if total == 0 {
            0.0
        } else {
            used as f64 / total as f64
        };
        let pressure =
            MemoryPressure::classify(fraction, self.warning_fraction, self.critical_fraction);
        if pressure.is_elevated() {
            tracing::warn!(
                "Memory pressure {}: {:.1}% of {} MiB in use",
                pressure,
                fraction * 100.0,
                total / (1024 * 1024)
            );
        }
        MemorySample {
            used_bytes: used,
            total_bytes: total,
            fraction,
            pressure,
        }
    }
}

impl Default for MemoryMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_respects_thresholds() {
        assert_eq!(
            MemoryPressure::classify(0.50, 0.85, 0.92),
            MemoryPressure::Normal
        );
        assert_eq!(
            MemoryPressure::classify(0.85, 0.85, 0.92),
            MemoryPressure::Warning
        );
        assert_eq!(
            MemoryPressure::classify(0.91, 0.85, 0.92),
            MemoryPressure::Warning
        );
        assert_eq!(
            MemoryPressure::classify(0.92, 0.85, 0.92),
            MemoryPressure::Critical
        );
        assert_eq!(
            MemoryPressure::classify(0.99, 0.85, 0.92),
            MemoryPressure::Critical
        );
    }

    #[test]
    fn sample_reports_plausible_fraction() {
        let mut monitor = MemoryMonitor::new();
        let sample = monitor.sample();
        assert!(sample.total_bytes > 0);
        assert!(sample.fraction >= 0.0 && sample.fraction <= 1.0);
    }

    #[test]
    fn elevated_levels() {
        assert!(!MemoryPressure::Normal.is_elevated());
        assert!(MemoryPressure::Warning.is_elevated());
        assert!(MemoryPressure::Critical.is_elevated());
    }
}
