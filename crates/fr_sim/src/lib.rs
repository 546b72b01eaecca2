// crates/fr_sim/src/lib.rs
//! Freshet 编排层。
//!
//! 把情景包跑成产物的那只手：
//! - [`builder`]: 情景要素到求解域描述的装配
//! - [`ranks`]: 分片线程池，同步门处收发统计、切片与检查点
//! - [`orchestrator`]: 阶段机主循环，失稳与下车处置
//! - [`callback`]: 状态、指标与产物文件的回调分发
//! - [`diagnostics`]: 逐门 CSV 与运行归纳 JSON
//! - [`context`]: 跨线程共享的运行状态
//!
//! 库本身不装信号钩子也不打印，进度经回调外送，日志走
//! tracing，谁消费由外层决定。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod callback;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod orchestrator;
pub mod phase;
pub mod ranks;

pub use callback::{
    CallbackSet, CollectingCallback, JournalCallback, LoggingCallback, NullCallback, RunCallback,
};
pub use context::RunContext;
pub use diagnostics::{
    diagnostics_file_name, journal_file_name, summary_file_name, DiagnosticsWriter, RunSummary,
};
pub use error::{SimError, SimResult};
pub use orchestrator::{default_ranks, run_scenario, RunOptions, RunReport, BAIL_SENTINEL};
pub use phase::{compute_yieldstep, RunOutcome, RunPhase};
pub use ranks::{Gate, RankPool};
