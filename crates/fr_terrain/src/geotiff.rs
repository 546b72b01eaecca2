// crates/fr_terrain/src/geotiff.rs

//! GeoTIFF 读写。
//!
//! 经由 GDAL，整个模块藏在 `gdal` 特性后面。未启用时两个入口
//! 都报 [`RasterError::GdalUnavailable`]，ASCII 路径不受影响。

use std::path::Path;

use crate::error::RasterResult;
use crate::raster::RasterGrid;

#[cfg(feature = "gdal")]
mod imp {
    use std::path::Path;

    use gdal::raster::Buffer;
    use gdal::spatial_ref::SpatialRef;
    use gdal::{Dataset, DriverManager};

    use crate::error::{RasterError, RasterResult};
    use crate::raster::RasterGrid;

    fn gdal_err(path: &Path, e: impl std::fmt::Display) -> RasterError {
        RasterError::Gdal {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    }

    pub fn read_geotiff(path: &Path) -> RasterResult<RasterGrid> {
        let dataset = Dataset::open(path).map_err(|e| gdal_err(path, e))?;
        let (nx, ny) = dataset.raster_size();
        let gt = dataset.geo_transform().map_err(|e| gdal_err(path, e))?;
        if gt[2] != 0.0 || gt[4] != 0.0 || (gt[1] + gt[5]).abs() > 1e-9 * gt[1].abs() {
            return Err(RasterError::parse(path, "仅支持无旋转的正方形像元"));
        }

        let band = dataset.rasterband(1).map_err(|e| gdal_err(path, e))?;
        let nodata = band.no_data_value().unwrap_or(-9999.0);
        let buffer = band
            .read_as::<f64>((0, 0), (nx, ny), (nx, ny), None)
            .map_err(|e| gdal_err(path, e))?;

        let cell = gt[1];
        // gt[3] 是左上角 y，gt[5] 为负
        let yll = gt[3] + ny as f64 * gt[5];
        RasterGrid::from_data(nx, ny, gt[0], yll, cell, nodata, buffer.data().to_vec())
    }

    pub fn write_geotiff(grid: &RasterGrid, path: &Path, epsg: Option<u32>) -> RasterResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RasterError::io(parent, e))?;
        }
        let driver = DriverManager::get_driver_by_name("GTiff").map_err(|e| gdal_err(path, e))?;
        let mut dataset = driver
            .create_with_band_type::<f64, _>(path, grid.nx, grid.ny, 1)
            .map_err(|e| gdal_err(path, e))?;

        let y_top = grid.yll + grid.ny as f64 * grid.cell;
        dataset
            .set_geo_transform(&[grid.xll, grid.cell, 0.0, y_top, 0.0, -grid.cell])
            .map_err(|e| gdal_err(path, e))?;
        if let Some(code) = epsg {
            let srs = SpatialRef::from_epsg(code).map_err(|e| gdal_err(path, e))?;
            dataset
                .set_spatial_ref(&srs)
                .map_err(|e| gdal_err(path, e))?;
        }

        let mut band = dataset.rasterband(1).map_err(|e| gdal_err(path, e))?;
        band.set_no_data_value(Some(grid.nodata))
            .map_err(|e| gdal_err(path, e))?;
        let mut buffer = Buffer::new((grid.nx, grid.ny), grid.data.clone());
        band.write((0, 0), (grid.nx, grid.ny), &mut buffer)
            .map_err(|e| gdal_err(path, e))?;
        Ok(())
    }
}

#[cfg(not(feature = "gdal"))]
mod imp {
    use std::path::Path;

    use crate::error::{RasterError, RasterResult};
    use crate::raster::RasterGrid;

    pub fn read_geotiff(path: &Path) -> RasterResult<RasterGrid> {
        Err(RasterError::GdalUnavailable {
            path: path.to_path_buf(),
        })
    }

    pub fn write_geotiff(_grid: &RasterGrid, path: &Path, _epsg: Option<u32>) -> RasterResult<()> {
        Err(RasterError::GdalUnavailable {
            path: path.to_path_buf(),
        })
    }
}

/// 读入 GeoTIFF 第一波段。
pub fn read_geotiff(path: &Path) -> RasterResult<RasterGrid> {
    imp::read_geotiff(path)
}

/// 写出单波段 GeoTIFF。`epsg` 给定时写入空间参考。
pub fn write_geotiff(grid: &RasterGrid, path: &Path, epsg: Option<u32>) -> RasterResult<()> {
    imp::write_geotiff(grid, path, epsg)
}
