// crates/fr_engine/src/lib.rs
//! Freshet 引擎层。
//!
//! 在情景描述之上提供可分片演进的浅水求解能力：
//! - [`domain`]: 引擎无关的域描述 [`DomainSpec`]
//! - [`engine`]: 演进接口、步进统计与量值帧
//! - [`grid`]: 规则网格上的显式扩散波求解器
//!
//! 求解器把计算域按行带切分给各分片，分片在同步门之间独立
//! 演进，门处交换带缘水深。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod engine;
pub mod error;
pub mod grid;

pub use domain::{DomainSpec, FieldFn, PiecewiseRate, SourceTerm};
pub use engine::{
    Frame, FrameGeometry, FrameSlice, HaloData, MeshSummary, RankEngine, StepStats,
};
pub use error::{EngineError, EngineResult};
pub use grid::UniformGridEngine;
