// crates/fr_geo/src/lib.rs
//! Freshet 几何层。
//!
//! 提供洪水情景建模所需的平面几何能力：
//! - [`geometry`]: 二维点、包围盒与极坐标象限修正
//! - [`polygon`]: 多边形面积、方向、含点判定与内部代表点
//! - [`ring`]: 把零散边界线段装配为闭合的带标签边界环
//!
//! 所有坐标均为投影平面坐标（米），不处理经纬度。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod geometry;
pub mod polygon;
pub mod ring;

pub use error::{GeoResult, GeometryError};
pub use geometry::{correction_for_polar_quadrants, Bounds, Point2D};
pub use polygon::{CoordinateList, Polygon};
pub use ring::{BoundaryKind, BoundaryRing, BoundarySegment, RingAssembler, SegmentLocation};
