// crates/fr_terrain/src/provider.rs

//! 高程模型。
//!
//! 包一层栅格 DEM，按任意平面坐标给出高程。求解网格的单元中心
//! 一般不与 DEM 像元对齐，这里做双线性插值，无数据像元按可用
//! 角点重新归一，四角全缺时退回固定值。

use std::path::Path;

use fr_geo::Point2D;

use crate::error::RasterResult;
use crate::raster::{read_raster, RasterGrid};

/// 基于栅格 DEM 的高程模型。
pub struct ElevationModel {
    grid: RasterGrid,
    fallback: f64,
}

impl ElevationModel {
    /// 包装一个已读入的栅格。
    #[must_use]
    pub fn new(grid: RasterGrid) -> Self {
        Self {
            grid,
            fallback: 0.0,
        }
    }

    /// 按扩展名读入 DEM 文件。
    pub fn from_path(path: &Path) -> RasterResult<Self> {
        let grid = read_raster(path)?;
        tracing::info!(
            path = %path.display(),
            nx = grid.nx,
            ny = grid.ny,
            cell = grid.cell,
            "elevation model loaded"
        );
        Ok(Self::new(grid))
    }

    /// 设置无数据时的退回高程。
    #[must_use]
    pub fn with_fallback(mut self, fallback: f64) -> Self {
        self.fallback = fallback;
        self
    }

    /// 底层栅格。
    #[must_use]
    pub fn grid(&self) -> &RasterGrid {
        &self.grid
    }

    /// 在 `point` 处采样高程。
    ///
    /// 范围外的坐标夹到最近的像元中心，DEM 必须覆盖整个算域，
    /// 边缘夹取只是挡住浮点越界。
    #[must_use]
    pub fn sample(&self, point: &Point2D) -> f64 {
        let g = &self.grid;
        if g.nx == 0 || g.ny == 0 {
            return self.fallback;
        }

        // 像元中心坐标系下的连续行列号，行自南向北
        let gx = ((point.x - g.xll) / g.cell - 0.5).clamp(0.0, (g.nx - 1) as f64);
        let gy = ((point.y - g.yll) / g.cell - 0.5).clamp(0.0, (g.ny - 1) as f64);

        let c0 = gx.floor() as usize;
        let s0 = gy.floor() as usize;
        let c1 = (c0 + 1).min(g.nx - 1);
        let s1 = (s0 + 1).min(g.ny - 1);
        let fx = gx - c0 as f64;
        let fy = gy - s0 as f64;

        let mut weight_sum = 0.0;
        let mut value_sum = 0.0;
        for (col, south, w) in [
            (c0, s0, (1.0 - fx) * (1.0 - fy)),
            (c1, s0, fx * (1.0 - fy)),
            (c0, s1, (1.0 - fx) * fy),
            (c1, s1, fx * fy),
        ] {
            let row = g.ny - 1 - south;
            let v = g.data[row * g.nx + col];
            if w > 0.0 && !g.is_nodata(v) {
                weight_sum += w;
                value_sum += w * v;
            }
        }

        if weight_sum > 0.0 {
            value_sum / weight_sum
        } else {
            self.fallback
        }
    }
}

// ============================================================
// 测试
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// 2×2 栅格，像元 10 m，原点 (0,0)。
    /// 南行：左 1.0 右 2.0；北行：左 3.0 右 4.0。
    fn two_by_two() -> RasterGrid {
        let mut grid = RasterGrid::new(2, 2, 0.0, 0.0, 10.0, -9999.0);
        grid.set(0, 1, 1.0);
        grid.set(1, 1, 2.0);
        grid.set(0, 0, 3.0);
        grid.set(1, 0, 4.0);
        grid
    }

    #[test]
    fn test_sample_at_cell_centers() {
        let model = ElevationModel::new(two_by_two());
        assert!((model.sample(&Point2D::new(5.0, 5.0)) - 1.0).abs() < 1e-12);
        assert!((model.sample(&Point2D::new(15.0, 15.0)) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_sample_midpoint_blends() {
        let model = ElevationModel::new(two_by_two());
        // 四个中心的正中
        let z = model.sample(&Point2D::new(10.0, 10.0));
        assert!((z - 2.5).abs() < 1e-12);
        // 南边中点只混合南行两个像元
        let z = model.sample(&Point2D::new(10.0, 5.0));
        assert!((z - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_outside_clamps_to_edge() {
        let model = ElevationModel::new(two_by_two());
        assert!((model.sample(&Point2D::new(-50.0, -50.0)) - 1.0).abs() < 1e-12);
        assert!((model.sample(&Point2D::new(500.0, 500.0)) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_nodata_corner_renormalized() {
        let mut grid = two_by_two();
        grid.set(0, 1, -9999.0);
        let model = ElevationModel::new(grid).with_fallback(-1.0);

        // 正中采样：三个有效角点等权
        let z = model.sample(&Point2D::new(10.0, 10.0));
        assert!((z - 3.0).abs() < 1e-12);

        // 无数据像元中心本身退不到别的角点时用退回值
        let mut all_bad = RasterGrid::new(1, 1, 0.0, 0.0, 10.0, -9999.0);
        all_bad.set(0, 0, -9999.0);
        let model = ElevationModel::new(all_bad).with_fallback(-1.0);
        assert!((model.sample(&Point2D::new(5.0, 5.0)) - (-1.0)).abs() < 1e-12);
    }
}
