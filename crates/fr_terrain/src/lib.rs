// crates/fr_terrain/src/lib.rs

//! Freshet 地形层
//!
//! 管理高程与量值栅格：
//!
//! - [`raster`]: 带地理参考的规则栅格与格式分发
//! - [`ascii`]: ESRI ASCII Grid 读写（始终可用）
//! - [`geotiff`]: GeoTIFF 读写（`gdal` 特性后可用）
//! - [`idw`]: R-tree 近邻查询与反距离加权插值
//! - [`provider`]: 高程模型，按坐标双线性采样
//! - [`burn`]: 把建筑底面加高烧入高程栅格

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ascii;
pub mod burn;
pub mod error;
pub mod geotiff;
pub mod idw;
pub mod provider;
pub mod raster;

pub use burn::burn_structures;
pub use error::{RasterError, RasterResult};
pub use idw::{idw_over, VertexIndex};
pub use provider::ElevationModel;
pub use raster::{read_raster, write_raster, RasterFormat, RasterGrid};
