// crates/fr_terrain/src/raster.rs

//! 带地理参考的规则栅格。
//!
//! 正方形单元，行优先存储，第 0 行是最北一行，与 ESRI ASCII
//! Grid 的文件顺序一致。坐标系由上层掌握，本层只带平面坐标。

use std::path::Path;

use fr_geo::{Bounds, Point2D};

use crate::error::{RasterError, RasterResult};

/// 规则栅格。
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGrid {
    /// 列数
    pub nx: usize,
    /// 行数
    pub ny: usize,
    /// 左下角 x 坐标
    pub xll: f64,
    /// 左下角 y 坐标
    pub yll: f64,
    /// 单元边长 [m]
    pub cell: f64,
    /// 无数据值
    pub nodata: f64,
    /// 数据，行优先，第 0 行最北
    pub data: Vec<f64>,
}

impl RasterGrid {
    /// 以无数据值铺满的新栅格。
    pub fn new(nx: usize, ny: usize, xll: f64, yll: f64, cell: f64, nodata: f64) -> Self {
        Self {
            nx,
            ny,
            xll,
            yll,
            cell,
            nodata,
            data: vec![nodata; nx * ny],
        }
    }

    /// 覆盖给定范围的栅格，行列数向上取整，至少 1×1。
    pub fn from_bounds(bounds: &Bounds, cell: f64, nodata: f64) -> Self {
        let nx = ((bounds.width() / cell).ceil() as usize).max(1);
        let ny = ((bounds.height() / cell).ceil() as usize).max(1);
        Self::new(nx, ny, bounds.min.x, bounds.min.y, cell, nodata)
    }

    /// 从已有数据构造，长度与行列数不符时报错。
    pub fn from_data(
        nx: usize,
        ny: usize,
        xll: f64,
        yll: f64,
        cell: f64,
        nodata: f64,
        data: Vec<f64>,
    ) -> RasterResult<Self> {
        if data.len() != nx * ny {
            return Err(RasterError::SizeMismatch {
                expected: nx * ny,
                found: data.len(),
            });
        }
        Ok(Self {
            nx,
            ny,
            xll,
            yll,
            cell,
            nodata,
            data,
        })
    }

    /// 取单元值。越界返回 `None`，无数据值照常返回。
    #[inline]
    #[must_use]
    pub fn get(&self, col: usize, row: usize) -> Option<f64> {
        if col < self.nx && row < self.ny {
            Some(self.data[row * self.nx + col])
        } else {
            None
        }
    }

    /// 写单元值。越界忽略。
    #[inline]
    pub fn set(&mut self, col: usize, row: usize, value: f64) {
        if col < self.nx && row < self.ny {
            self.data[row * self.nx + col] = value;
        }
    }

    /// 判断一个值是否算无数据。
    #[inline]
    #[must_use]
    pub fn is_nodata(&self, value: f64) -> bool {
        value.is_nan() || (self.nodata.is_finite() && (value - self.nodata).abs() < 1e-10)
    }

    /// 单元中心坐标。
    #[inline]
    #[must_use]
    pub fn cell_center(&self, col: usize, row: usize) -> Point2D {
        Point2D::new(
            self.xll + (col as f64 + 0.5) * self.cell,
            self.yll + (self.ny as f64 - row as f64 - 0.5) * self.cell,
        )
    }

    /// 坐标落在哪个单元。范围外返回 `None`。
    #[must_use]
    pub fn locate(&self, point: &Point2D) -> Option<(usize, usize)> {
        let fx = (point.x - self.xll) / self.cell;
        let fy = (point.y - self.yll) / self.cell;
        if fx < 0.0 || fy < 0.0 {
            return None;
        }
        let col = fx as usize;
        let from_south = fy as usize;
        if col >= self.nx || from_south >= self.ny {
            return None;
        }
        Some((col, self.ny - 1 - from_south))
    }

    /// 坐标处的单元值。范围外或无数据返回 `None`。
    #[must_use]
    pub fn value_at(&self, point: &Point2D) -> Option<f64> {
        let (col, row) = self.locate(point)?;
        let v = self.data[row * self.nx + col];
        if self.is_nodata(v) {
            None
        } else {
            Some(v)
        }
    }

    /// 栅格覆盖的地理范围。
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        Bounds::new(
            Point2D::new(self.xll, self.yll),
            Point2D::new(
                self.xll + self.nx as f64 * self.cell,
                self.yll + self.ny as f64 * self.cell,
            ),
        )
    }
}

// ============================================================
// 格式分发
// ============================================================

/// 按扩展名识别的栅格格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    /// ESRI ASCII Grid（`.asc` / `.txt`）
    AsciiGrid,
    /// GeoTIFF（`.tif` / `.tiff`），需要 gdal 特性
    GeoTiff,
}

impl RasterFormat {
    /// 从路径扩展名识别格式。
    pub fn from_path(path: &Path) -> RasterResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("asc") | Some("txt") => Ok(Self::AsciiGrid),
            Some("tif") | Some("tiff") => Ok(Self::GeoTiff),
            _ => Err(RasterError::Unsupported {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// 按扩展名读入栅格。
pub fn read_raster(path: &Path) -> RasterResult<RasterGrid> {
    match RasterFormat::from_path(path)? {
        RasterFormat::AsciiGrid => crate::ascii::read_ascii_grid(path),
        RasterFormat::GeoTiff => crate::geotiff::read_geotiff(path),
    }
}

/// 按扩展名写出栅格。`epsg` 只有 GeoTIFF 会写入。
pub fn write_raster(grid: &RasterGrid, path: &Path, epsg: Option<u32>) -> RasterResult<()> {
    match RasterFormat::from_path(path)? {
        RasterFormat::AsciiGrid => crate::ascii::write_ascii_grid(grid, path),
        RasterFormat::GeoTiff => crate::geotiff::write_geotiff(grid, path, epsg),
    }
}

// ============================================================
// 测试
// ============================================================
