// crates/fr_scenario/src/lib.rs
//! Freshet 情景层。
//!
//! 一个情景包是一个目录：`scenario.json` 配置加 `inputs/` 下的
//! GeoJSON 与栅格输入。本层负责：
//! - [`config`]: 配置解析与多违规校验
//! - [`geojson`]: 宽松的 GeoJSON 读取
//! - [`features`]: 把原始要素转成带类型的领域记录
//! - [`assemble`]: 边界环、糙率表、内部孔洞与加密区的装配
//! - [`package`]: 一次性加载并校验整个情景包
//!
//! 校验失败时一次性报告所有问题，而不是在第一个错误处停下。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assemble;
pub mod config;
pub mod error;
pub mod features;
pub mod geojson;
pub mod package;

pub use config::ScenarioConfig;
pub use error::{ConfigError, ScenarioError, ScenarioResult};
pub use features::{
    BoundaryLine, FrictionPatch, InflowGeometry, InflowKind, InflowPatch, MeshRegion, RateSeries,
    StructureMethod, StructureShape,
};
pub use package::ScenarioPackage;
