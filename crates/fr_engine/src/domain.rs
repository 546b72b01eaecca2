// crates/fr_engine/src/domain.rs
//! 引擎无关的域描述。
//!
//! [`DomainSpec`] 把情景装配结果翻译成求解器关心的最小集合：
//! 外边界环、孔洞、分辨率、逐点糙率与地形采样、以及 SI 单位
//! 的源项。糙率与地形以采样闭包注入，求解器在建网时逐单元
//! 调用一次，之后不再依赖上游数据结构。

use fr_geo::{BoundaryRing, Point2D, Polygon};
use std::sync::Arc;

/// 逐点标量场采样闭包。
pub type FieldFn = Arc<dyn Fn(&Point2D) -> f64 + Send + Sync>;

/// 分段线性速率曲线，单位由使用方约定。
#[derive(Debug, Clone, PartialEq)]
pub enum PiecewiseRate {
    /// 全程常数
    Constant(f64),
    /// `(时间秒, 速率)` 折线，按时间升序
    Points(Vec<(f64, f64)>),
}

impl PiecewiseRate {
    /// 常数速率。
    #[must_use]
    pub const fn constant(rate: f64) -> Self {
        PiecewiseRate::Constant(rate)
    }

    /// 折线速率，自动按时间排序。空集退化为常数 0。
    #[must_use]
    pub fn from_points(mut points: Vec<(f64, f64)>) -> Self {
        if points.is_empty() {
            return PiecewiseRate::Constant(0.0);
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        PiecewiseRate::Points(points)
    }

    /// 时刻 `t` 的速率，折线两端取端点值。
    #[must_use]
    pub fn rate_at(&self, t: f64) -> f64 {
        match self {
            PiecewiseRate::Constant(v) => *v,
            PiecewiseRate::Points(points) => {
                let first = points[0];
                let last = points[points.len() - 1];
                if t <= first.0 {
                    return first.1;
                }
                if t >= last.0 {
                    return last.1;
                }
                for window in points.windows(2) {
                    let (t0, v0) = window[0];
                    let (t1, v1) = window[1];
                    if t >= t0 && t <= t1 {
                        if t1 == t0 {
                            return v1;
                        }
                        return v0 + (v1 - v0) * (t - t0) / (t1 - t0);
                    }
                }
                last.1
            }
        }
    }
}

/// 一处源项：作用范围加水深增速（m/s）。
#[derive(Debug, Clone)]
pub struct SourceTerm {
    /// 作用多边形
    pub footprint: Polygon,
    /// 水深增速曲线（m/s）
    pub rate: PiecewiseRate,
}

/// 求解器的域描述。
#[derive(Clone)]
pub struct DomainSpec {
    /// 外边界环
    pub boundary: BoundaryRing,
    /// 网格孔洞占地
    pub holes: Vec<Polygon>,
    /// 网格单元尺寸（米）
    pub resolution: f64,
    /// 加密区 `(多边形, 分辨率)`，规则网格求解器只计入摘要
    pub interior_regions: Vec<(Polygon, f64)>,
    /// 逐点曼宁糙率
    pub friction: FieldFn,
    /// 逐点地形高程（米）
    pub elevation: FieldFn,
    /// 源项集合
    pub sources: Vec<SourceTerm>,
    /// 给定水位边界的水位值（米）
    pub dirichlet_stage: f64,
    /// CFL 数
    pub cfl: f64,
}

impl DomainSpec {
    /// 平地、默认糙率的最小域描述。
    #[must_use]
    pub fn new(boundary: BoundaryRing, resolution: f64) -> Self {
        Self {
            boundary,
            holes: Vec::new(),
            resolution,
            interior_regions: Vec::new(),
            friction: Arc::new(|_| fr_foundation::defaults::DEFAULT_MANNINGS_N),
            elevation: Arc::new(|_| 0.0),
            sources: Vec::new(),
            dirichlet_stage: 0.0,
            cfl: 0.9,
        }
    }

    /// 设置孔洞。
    #[must_use]
    pub fn with_holes(mut self, holes: Vec<Polygon>) -> Self {
        self.holes = holes;
        self
    }

    /// 设置加密区。
    #[must_use]
    pub fn with_interior_regions(mut self, regions: Vec<(Polygon, f64)>) -> Self {
        self.interior_regions = regions;
        self
    }

    /// 设置糙率采样。
    #[must_use]
    pub fn with_friction(mut self, friction: FieldFn) -> Self {
        self.friction = friction;
        self
    }

    /// 设置地形采样。
    #[must_use]
    pub fn with_elevation(mut self, elevation: FieldFn) -> Self {
        self.elevation = elevation;
        self
    }

    /// 设置源项。
    #[must_use]
    pub fn with_sources(mut self, sources: Vec<SourceTerm>) -> Self {
        self.sources = sources;
        self
    }

    /// 设置给定水位。
    #[must_use]
    pub fn with_dirichlet_stage(mut self, stage: f64) -> Self {
        self.dirichlet_stage = stage;
        self
    }
}

impl std::fmt::Debug for DomainSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainSpec")
            .field("resolution", &self.resolution)
            .field("n_holes", &self.holes.len())
            .field("n_regions", &self.interior_regions.len())
            .field("n_sources", &self.sources.len())
            .field("dirichlet_stage", &self.dirichlet_stage)
            .field("cfl", &self.cfl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_piecewise_rate_constant() {
        let rate = PiecewiseRate::constant(2.5e-6);
        assert_eq!(rate.rate_at(0.0), 2.5e-6);
        assert_eq!(rate.rate_at(1.0e9), 2.5e-6);
    }

    #[test]
    fn test_piecewise_rate_interpolates_and_clamps() {
        let rate = PiecewiseRate::from_points(vec![(600.0, 1.0), (0.0, 0.0)]);
        assert_eq!(rate.rate_at(-5.0), 0.0);
        assert!((rate.rate_at(300.0) - 0.5).abs() < 1.0e-12);
        assert_eq!(rate.rate_at(600.0), 1.0);
        assert_eq!(rate.rate_at(900.0), 1.0);
    }

    #[test]
    fn test_piecewise_rate_empty_points() {
        let rate = PiecewiseRate::from_points(Vec::new());
        assert_eq!(rate.rate_at(100.0), 0.0);
    }
}
