// crates/fr_foundation/src/lib.rs

//! Freshet 基础层
//!
//! 为洪水情景模拟工具链提供与领域无关的底座：
//!
//! - [`defaults`]: 全局命名常量（演进步长、干湿阈值、糙率等）
//! - [`memory`]: 基于 sysinfo 的进程内存压力采样
//! - [`validation`]: 数值字段校验工具
//!
//! 本层不感知情景、网格或求解器，仅被上层各 crate 复用。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod defaults;
pub mod memory;
pub mod validation;

// 重导出常用类型
pub use memory::{MemoryMonitor, MemoryPressure, MemorySample};
pub use validation::ValidationReport;
