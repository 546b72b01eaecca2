// crates/fr_post/src/lib.rs

//! Freshet 后处理层
//!
//! 把一次运行的流场时序（`.fts`）栅格化成交付产品：每个量值
//! 一组逐步栅格加一张最大包络。时序逐帧流过，从不整段载入。
//!
//! 量值见 [`Quantity`]，入口见 [`post_process`]。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod pipeline;
pub mod quantity;

pub use error::{PostError, PostResult};
pub use pipeline::{post_process, post_process_series, PostSummary, RASTER_EXT};
pub use quantity::Quantity;
