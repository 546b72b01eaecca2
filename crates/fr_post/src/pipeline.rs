// crates/fr_post/src/pipeline.rs

//! 时序到栅格产品的流水线。
//!
//! 网格取顶点包络框按出图分辨率划成正方形单元。每个单元预先
//! 查好最近的几个顶点，之后每帧每个量值只做加权求和。帧顺着
//! 时序流过，逐步栅格当场写出，最大包络边流边累计。
//!
//! 遍历顺序固定，重跑同一输入得到逐字节相同的产物。

use std::path::Path;

use rayon::prelude::*;
use serde::Serialize;

use fr_foundation::defaults::{K_NEAREST_NEIGHBOURS, RASTER_NODATA, WET_DEPTH_THRESHOLD_M};
use fr_geo::Bounds;
use fr_io::{series_path, SeriesReader};
use fr_scenario::ScenarioPackage;
use fr_terrain::{idw_over, write_raster, RasterGrid, VertexIndex};

use crate::error::{PostError, PostResult};
use crate::quantity::Quantity;

/// 产物扩展名。gdal 特性启用时写 GeoTIFF，否则 ESRI ASCII。
pub const RASTER_EXT: &str = if cfg!(feature = "gdal") { "tif" } else { "asc" };

/// 一次后处理的归纳。
#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    /// 运行标识
    pub run_label: String,
    /// 栅格化的帧数
    pub frames: usize,
    /// 写出的栅格文件数
    pub rasters_written: usize,
    /// 栅格列数
    pub nx: usize,
    /// 栅格行数
    pub ny: usize,
    /// 出图分辨率 [m]
    pub resolution: f64,
}

// ============================================================
// 近邻表
// ============================================================

/// 每个栅格单元到网格顶点的近邻预查表。
struct NeighborTable {
    /// 单元 × K 个顶点号，`u32::MAX` 表示无
    indices: Vec<u32>,
    /// 与 `indices` 对齐的距离平方
    dist2: Vec<f64>,
}

impl NeighborTable {
    fn build(template: &RasterGrid, index: &VertexIndex) -> Self {
        let k = K_NEAREST_NEIGHBOURS;
        let nx = template.nx;
        let n_cells = template.data.len();
        let mut indices = vec![u32::MAX; n_cells * k];
        let mut dist2 = vec![0.0f64; n_cells * k];

        indices
            .par_chunks_mut(nx * k)
            .zip(dist2.par_chunks_mut(nx * k))
            .enumerate()
            .for_each(|(row, (irow, drow))| {
                for col in 0..nx {
                    let center = template.cell_center(col, row);
                    for (j, (idx, d2)) in index.nearest(&center, k).into_iter().enumerate() {
                        irow[col * k + j] = idx as u32;
                        drow[col * k + j] = d2;
                    }
                }
            });

        Self { indices, dist2 }
    }

    /// 单元的近邻，(顶点号, 距离平方)，近的在前。
    #[inline]
    fn neighbors(&self, cell: usize) -> ([(usize, f64); K_NEAREST_NEIGHBOURS], usize) {
        let k = K_NEAREST_NEIGHBOURS;
        let mut out = [(0usize, 0.0f64); K_NEAREST_NEIGHBOURS];
        let mut m = 0;
        for j in 0..k {
            let idx = self.indices[cell * k + j];
            if idx == u32::MAX {
                break;
            }
            out[m] = (idx as usize, self.dist2[cell * k + j]);
            m += 1;
        }
        (out, m)
    }
}

// ============================================================
// 栅格化
// ============================================================

/// 把一帧的一个量值栅格化。
///
/// 单元的近邻里没有一个顶点湿于 [`WET_DEPTH_THRESHOLD_M`] 时记
/// 无数据，干区不外推。
fn rasterize(
    template: &RasterGrid,
    table: &NeighborTable,
    quantity: Quantity,
    vertex_values: &[f64],
    vertex_depth: &[f64],
) -> RasterGrid {
    let mut grid = template.clone();
    let nx = grid.nx;
    grid.data
        .par_chunks_mut(nx)
        .enumerate()
        .for_each(|(row, cells)| {
            for (col, out) in cells.iter_mut().enumerate() {
                let (buf, m) = table.neighbors(row * nx + col);
                let neigh = &buf[..m];
                let wet = neigh
                    .iter()
                    .any(|&(i, _)| vertex_depth[i] > WET_DEPTH_THRESHOLD_M);
                if !wet {
                    continue;
                }
                if let Some(v) = idw_over(neigh, vertex_values) {
                    *out = quantity.finalize_cell(v);
                }
            }
        });
    grid
}

/// 把一帧的栅格并进最大包络。
fn fold_envelope(envelope: &mut [f64], step: &[f64], nodata: f64) {
    for (e, &v) in envelope.iter_mut().zip(step) {
        if v.is_nan() || (v - nodata).abs() < 1e-10 {
            continue;
        }
        if (*e - nodata).abs() < 1e-10 || v > *e {
            *e = v;
        }
    }
}

// ============================================================
// 入口
// ============================================================

/// 栅格化一个情景包的流场时序。
///
/// 出图分辨率按显式参数、最细加密区、配置分辨率的次序取。
pub fn post_process(
    package: &ScenarioPackage,
    resolution: Option<f64>,
) -> PostResult<PostSummary> {
    let run_label = package.run_label();
    let out_dir = package.output_dir();
    let series = series_path(&out_dir, &run_label);
    let cell = package.finest_resolution(resolution);
    post_process_series(
        &series,
        &out_dir,
        &run_label,
        cell,
        Some(package.config().epsg),
    )
}

/// 栅格化指定的时序文件。
///
/// 每帧每个量值写 `{run_label}_{量值}_{秒:06}`，流完后每个量值
/// 补一张 `{run_label}_{量值}_max`。
pub fn post_process_series(
    series_file: &Path,
    out_dir: &Path,
    run_label: &str,
    cell: f64,
    epsg: Option<u32>,
) -> PostResult<PostSummary> {
    if !series_file.exists() {
        return Err(PostError::MissingSeries {
            path: series_file.to_path_buf(),
        });
    }
    let mut reader = SeriesReader::open(series_file)?;
    let points = reader.points().to_vec();
    let elevation = reader.elevation().to_vec();
    let Some(bounds) = Bounds::from_points(&points) else {
        return Err(PostError::EmptyMesh {
            path: series_file.to_path_buf(),
        });
    };

    let template = RasterGrid::from_bounds(&bounds, cell, RASTER_NODATA);
    let index = VertexIndex::build(&points);
    let table = NeighborTable::build(&template, &index);
    tracing::info!(
        run_label,
        nx = template.nx,
        ny = template.ny,
        cell,
        n_points = points.len(),
        "post-processing grid ready"
    );

    let n_cells = template.data.len();
    let mut envelopes: Vec<Vec<f64>> = Quantity::ALL
        .iter()
        .map(|_| vec![RASTER_NODATA; n_cells])
        .collect();
    let mut frames = 0usize;
    let mut rasters_written = 0usize;

    while let Some(frame) = reader.next_frame()? {
        let seconds = frame.time_s.round() as i64;
        let depth: Vec<f64> = frame
            .stage
            .iter()
            .zip(&elevation)
            .map(|(&s, &z)| (s - z).max(0.0))
            .collect();
        let mag: Vec<f64> = frame
            .xmom
            .iter()
            .zip(&frame.ymom)
            .map(|(&u, &v)| u.hypot(v))
            .collect();

        for (qi, q) in Quantity::ALL.iter().enumerate() {
            let values = q.vertex_values(&depth, &mag, &frame.stage);
            let grid = rasterize(&template, &table, *q, &values, &depth);
            let name = format!("{run_label}_{q}_{seconds:06}.{RASTER_EXT}");
            write_raster(&grid, &out_dir.join(name), epsg)?;
            rasters_written += 1;
            fold_envelope(&mut envelopes[qi], &grid.data, RASTER_NODATA);
        }
        frames += 1;
    }

    for (qi, q) in Quantity::ALL.iter().enumerate() {
        let mut grid = template.clone();
        grid.data.copy_from_slice(&envelopes[qi]);
        let name = format!("{run_label}_{q}_max.{RASTER_EXT}");
        write_raster(&grid, &out_dir.join(name), epsg)?;
        rasters_written += 1;
    }

    tracing::info!(run_label, frames, rasters_written, "post-processing finished");
    Ok(PostSummary {
        run_label: run_label.to_string(),
        frames,
        rasters_written,
        nx: template.nx,
        ny: template.ny,
        resolution: cell,
    })
}

// ============================================================
// 测试
// ============================================================
