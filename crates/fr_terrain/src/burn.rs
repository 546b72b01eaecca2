// crates/fr_terrain/src/burn.rs

//! 把建筑底面烧入高程栅格。
//!
//! 高程法结构物不在网格上开洞，而是把底面覆盖的 DEM 像元整体
//! 抬高 [`BUILDING_BURN_HEIGHT_M`]。首次烧入前先把原始 DEM 备份成
//! `{名}_original.{扩展名}`，之后每次都从备份读原值再烧，重跑
//! 不会叠加抬高。

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use fr_foundation::defaults::BUILDING_BURN_HEIGHT_M;
use fr_geo::{Point2D, Polygon};

use crate::error::{RasterError, RasterResult};
use crate::raster::{read_raster, write_raster};

/// 原始 DEM 的备份路径，`dem.asc` 对应 `dem_original.asc`。
fn backup_path(raster_path: &Path) -> RasterResult<PathBuf> {
    let stem = raster_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| RasterError::Unsupported {
            path: raster_path.to_path_buf(),
        })?;
    let ext = raster_path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| RasterError::Unsupported {
            path: raster_path.to_path_buf(),
        })?;
    Ok(raster_path.with_file_name(format!("{stem}_original.{ext}")))
}

/// 把高程法结构物烧入 `raster_path` 指向的 DEM。
///
/// 没有结构物时不动文件，返回 `Ok(false)`。烧入发生时返回
/// `Ok(true)`，此后 `raster_path` 是烧入版，备份是原始版。
pub fn burn_structures(
    footprints: &[Polygon],
    raster_path: &Path,
    epsg: Option<u32>,
) -> RasterResult<bool> {
    if footprints.is_empty() {
        tracing::debug!("no elevation structures, terrain left untouched");
        return Ok(false);
    }

    let backup = backup_path(raster_path)?;
    if !backup.exists() {
        std::fs::copy(raster_path, &backup).map_err(|e| RasterError::io(&backup, e))?;
        tracing::info!(backup = %backup.display(), "pristine terrain backed up");
    }

    let mut grid = read_raster(&backup)?;
    let shapes: Vec<_> = footprints.iter().map(|p| (p, p.bounds())).collect();

    let (nx, ny) = (grid.nx, grid.ny);
    let (xll, yll, cell, nodata) = (grid.xll, grid.yll, grid.cell, grid.nodata);
    let is_nodata =
        |v: f64| v.is_nan() || (nodata.is_finite() && (v - nodata).abs() < 1e-10);

    let burned: usize = grid
        .data
        .par_chunks_mut(nx)
        .enumerate()
        .map(|(row, cells)| {
            let y = yll + (ny as f64 - row as f64 - 0.5) * cell;
            let mut hits = 0usize;
            for (col, value) in cells.iter_mut().enumerate() {
                if is_nodata(*value) {
                    continue;
                }
                let center = Point2D::new(xll + (col as f64 + 0.5) * cell, y);
                let covered = shapes
                    .iter()
                    .any(|(poly, bounds)| {
                        bounds.is_some_and(|b| b.contains(&center)) && poly.contains(&center)
                    });
                if covered {
                    *value += BUILDING_BURN_HEIGHT_M;
                    hits += 1;
                }
            }
            hits
        })
        .sum();

    write_raster(&grid, raster_path, epsg)?;
    tracing::info!(
        n_structures = footprints.len(),
        cells = burned,
        height = BUILDING_BURN_HEIGHT_M,
        "structures burned into terrain"
    );
    Ok(true)
}

// ============================================================
// 测试
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::RasterGrid;
    use tempfile::tempdir;

    fn flat_dem(dir: &Path) -> PathBuf {
        let path = dir.join("dem.asc");
        let grid = RasterGrid::from_data(
            20,
            20,
            0.0,
            0.0,
            5.0,
            -9999.0,
            vec![10.0; 400],
        )
        .unwrap();
        write_raster(&grid, &path, None).unwrap();
        path
    }

    fn square(min: f64, max: f64) -> Polygon {
        Polygon::new(vec![
            Point2D::new(min, min),
            Point2D::new(max, min),
            Point2D::new(max, max),
            Point2D::new(min, max),
        ])
    }

    #[test]
    fn test_no_structures_is_noop() {
        let dir = tempdir().unwrap();
        let path = flat_dem(dir.path());

        assert!(!burn_structures(&[], &path, None).unwrap());
        assert!(!dir.path().join("dem_original.asc").exists());
    }

    #[test]
    fn test_burn_raises_covered_cells() {
        let dir = tempdir().unwrap();
        let path = flat_dem(dir.path());

        let burned = burn_structures(&[square(25.0, 50.0)], &path, None).unwrap();
        assert!(burned);

        let grid = read_raster(&path).unwrap();
        let raised = grid.data.iter().filter(|v| (**v - 15.0).abs() < 1e-9).count();
        let flat = grid.data.iter().filter(|v| (**v - 10.0).abs() < 1e-9).count();
        assert_eq!(raised, 25);
        assert_eq!(raised + flat, 400);

        // 备份保留原始值
        let backup = read_raster(&dir.path().join("dem_original.asc")).unwrap();
        assert!(backup.data.iter().all(|v| (*v - 10.0).abs() < 1e-9));
    }

    #[test]
    fn test_rerun_does_not_stack() {
        let dir = tempdir().unwrap();
        let path = flat_dem(dir.path());
        let shapes = [square(25.0, 50.0)];

        burn_structures(&shapes, &path, None).unwrap();
        burn_structures(&shapes, &path, None).unwrap();
        burn_structures(&shapes, &path, None).unwrap();

        let grid = read_raster(&path).unwrap();
        let max = grid.data.iter().cloned().fold(f64::MIN, f64::max);
        assert!((max - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_nodata_cells_left_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dem.asc");
        let mut grid =
            RasterGrid::from_data(20, 20, 0.0, 0.0, 5.0, -9999.0, vec![10.0; 400]).unwrap();
        // (32.5, 32.5) 的像元置为无数据，在足迹内
        let (col, row) = grid.locate(&Point2D::new(32.5, 32.5)).unwrap();
        grid.set(col, row, -9999.0);
        write_raster(&grid, &path, None).unwrap();

        burn_structures(&[square(25.0, 50.0)], &path, None).unwrap();

        let after = read_raster(&path).unwrap();
        assert!(after.is_nodata(after.get(col, row).unwrap()));
        let raised = after.data.iter().filter(|v| (**v - 15.0).abs() < 1e-9).count();
        assert_eq!(raised, 24);
    }

    #[test]
    fn test_two_footprints_burn_once_each() {
        let dir = tempdir().unwrap();
        let path = flat_dem(dir.path());

        // 两个足迹有重叠，重叠区也只抬一次
        let shapes = [square(25.0, 50.0), square(40.0, 65.0)];
        burn_structures(&shapes, &path, None).unwrap();

        let grid = read_raster(&path).unwrap();
        let max = grid.data.iter().cloned().fold(f64::MIN, f64::max);
        assert!((max - 15.0).abs() < 1e-9);
    }
}
