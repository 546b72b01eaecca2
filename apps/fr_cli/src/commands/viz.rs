// apps/fr_cli/src/commands/viz.rs

//! 栅格预览命令
//!
//! 把一张量值栅格压成字符画打在终端里，配上数值统计。画图
//! 后端不在工具链范围内，这个命令用来在出图后快速瞄一眼结果
//! 对不对劲，或对照两次运行的同名产物。

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use fr_post::{Quantity, RASTER_EXT};
use fr_terrain::{read_raster, RasterGrid};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// 预览宽度上限（字符）。
const MAX_COLS: usize = 64;

/// 从浅到深的灰度字符。
const RAMP: &[u8] = b" .:-=+*#%@";

/// 预览参数
#[derive(Args)]
pub struct VizArgs {
    /// 产物目录
    pub outputs: PathBuf,

    /// 量值 (depth, velocity, depthIntegratedVelocity, stage)
    pub quantity: String,

    /// 时刻 [秒]，缺省预览最大包络
    #[arg(short, long)]
    pub time: Option<f64>,

    /// 对照的另一个产物目录
    #[arg(long)]
    pub compare: Option<PathBuf>,
}

/// 执行预览命令
pub fn execute(args: VizArgs) -> Result<()> {
    let quantity: Quantity = args.quantity.parse().map_err(|e: String| anyhow!(e))?;
    let path = find_raster(&args.outputs, quantity, args.time)?;
    let grid = read_raster(&path).with_context(|| format!("读取栅格 {} 失败", path.display()))?;
    let stats = RasterStats::of(&grid);

    println!("文件: {}", path.display());
    println!(
        "栅格: {}x{} @ {} m, 有效单元 {}/{}",
        grid.nx,
        grid.ny,
        grid.cell,
        stats.valid,
        grid.nx * grid.ny
    );
    println!(
        "数值: 最小 {:.3}, 平均 {:.3}, 最大 {:.3}",
        stats.min, stats.mean, stats.max
    );

    println!();
    render_preview(&grid, &stats);

    if let Some(other_dir) = &args.compare {
        let other_path = find_raster(other_dir, quantity, args.time)?;
        let other = read_raster(&other_path)
            .with_context(|| format!("读取栅格 {} 失败", other_path.display()))?;
        if other.nx != grid.nx || other.ny != grid.ny {
            bail!(
                "对照栅格尺寸不一致: {}x{} vs {}x{}",
                grid.nx,
                grid.ny,
                other.nx,
                other.ny
            );
        }
        let other_stats = RasterStats::of(&other);
        let diff = DiffStats::of(&grid, &other);

        println!("\n=== 对照 ===");
        println!("文件: {}", other_path.display());
        println!(
            "数值: 最小 {:.3}, 平均 {:.3}, 最大 {:.3}",
            other_stats.min, other_stats.mean, other_stats.max
        );
        println!(
            "差异: {} 个单元不同, 最大偏差 {:.4}, 平均偏差 {:.4}",
            diff.differing, diff.max_abs, diff.mean_abs
        );
    }

    Ok(())
}

/// 在产物目录里按后缀找栅格，不要求知道运行标识。
fn find_raster(dir: &Path, quantity: Quantity, time: Option<f64>) -> Result<PathBuf> {
    let suffix = match time {
        None => format!("_{quantity}_max.{RASTER_EXT}"),
        Some(t) => format!("_{quantity}_{:06}.{RASTER_EXT}", t.round() as i64),
    };
    let entries = fs::read_dir(dir).with_context(|| format!("读取目录 {} 失败", dir.display()))?;
    let mut matches: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.ends_with(&suffix))
        })
        .collect();
    matches.sort();
    match matches.len() {
        0 => bail!("在 {} 下找不到 *{suffix}", dir.display()),
        1 => Ok(matches.remove(0)),
        n => {
            warn!("{} 个栅格匹配 *{}，取字典序第一个", n, suffix);
            Ok(matches.remove(0))
        }
    }
}

/// 有效单元的数值统计。
struct RasterStats {
    valid: usize,
    min: f64,
    max: f64,
    mean: f64,
}

impl RasterStats {
    fn of(grid: &RasterGrid) -> Self {
        let mut valid = 0usize;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &v in &grid.data {
            if grid.is_nodata(v) {
                continue;
            }
            valid += 1;
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        if valid == 0 {
            return Self {
                valid,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
            };
        }
        Self {
            valid,
            min,
            max,
            mean: sum / valid as f64,
        }
    }
}

/// 有效单元上的逐格差异。
struct DiffStats {
    differing: usize,
    max_abs: f64,
    mean_abs: f64,
}

impl DiffStats {
    fn of(a: &RasterGrid, b: &RasterGrid) -> Self {
        let mut differing = 0usize;
        let mut max_abs = 0.0_f64;
        let mut sum_abs = 0.0;
        let mut compared = 0usize;
        for (&va, &vb) in a.data.iter().zip(&b.data) {
            if a.is_nodata(va) || b.is_nodata(vb) {
                continue;
            }
            compared += 1;
            let d = (va - vb).abs();
            if d > 1e-6 {
                differing += 1;
            }
            max_abs = max_abs.max(d);
            sum_abs += d;
        }
        Self {
            differing,
            max_abs,
            mean_abs: if compared > 0 {
                sum_abs / compared as f64
            } else {
                0.0
            },
        }
    }
}

/// 把栅格压到终端宽度，块内取最大值后映射到灰度字符。
///
/// 字符格子约一比二的宽高比，行方向取两倍步长补偿。
fn render_preview(grid: &RasterGrid, stats: &RasterStats) {
    if stats.valid == 0 {
        println!("(全域无数据)");
        return;
    }
    let span = stats.max - stats.min;
    let col_step = grid.nx.div_ceil(MAX_COLS).max(1);
    let row_step = (col_step * 2).max(1);

    let mut row = 0;
    while row < grid.ny {
        let mut line = String::with_capacity(MAX_COLS);
        let mut col = 0;
        while col < grid.nx {
            line.push(block_char(grid, col, row, col_step, row_step, stats.min, span));
            col += col_step;
        }
        println!("{line}");
        row += row_step;
    }
    println!(
        "刻度: '{}' = {:.3}  ..  '{}' = {:.3}  (' ' 无数据)",
        RAMP[1] as char, stats.min, RAMP[RAMP.len() - 1] as char, stats.max
    );
}

/// 一个预览块的字符：块内有效单元的最大值决定深浅。
fn block_char(
    grid: &RasterGrid,
    col0: usize,
    row0: usize,
    col_step: usize,
    row_step: usize,
    min: f64,
    span: f64,
) -> char {
    let mut best: Option<f64> = None;
    for row in row0..(row0 + row_step).min(grid.ny) {
        for col in col0..(col0 + col_step).min(grid.nx) {
            let v = grid.data[row * grid.nx + col];
            if grid.is_nodata(v) {
                continue;
            }
            best = Some(best.map_or(v, |b: f64| b.max(v)));
        }
    }
    let Some(v) = best else {
        return ' ';
    };
    let frac = if span > 0.0 { (v - min) / span } else { 0.0 };
    let idx = 1 + (frac.clamp(0.0, 1.0) * (RAMP.len() - 2) as f64).round() as usize;
    RAMP[idx.min(RAMP.len() - 1)] as char
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_grid() -> RasterGrid {
        let mut grid = RasterGrid::new(4, 2, 0.0, 0.0, 10.0, -9999.0);
        for col in 0..4 {
            grid.set(col, 0, col as f64);
            grid.set(col, 1, col as f64);
        }
        grid
    }

    #[test]
    fn test_stats_skip_nodata() {
        let mut grid = ramp_grid();
        grid.set(0, 0, -9999.0);
        let stats = RasterStats::of(&grid);
        assert_eq!(stats.valid, 7);
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 3.0);
    }

    #[test]
    fn test_block_char_spans_ramp() {
        let grid = ramp_grid();
        let stats = RasterStats::of(&grid);
        let span = stats.max - stats.min;
        let low = block_char(&grid, 0, 0, 1, 2, stats.min, span);
        let high = block_char(&grid, 3, 0, 1, 2, stats.min, span);
        assert_eq!(low, RAMP[1] as char);
        assert_eq!(high, RAMP[RAMP.len() - 1] as char);
    }

    #[test]
    fn test_nodata_block_is_blank() {
        let grid = RasterGrid::new(2, 2, 0.0, 0.0, 1.0, -9999.0);
        assert_eq!(block_char(&grid, 0, 0, 2, 2, 0.0, 1.0), ' ');
    }

    #[test]
    fn test_diff_stats() {
        let a = ramp_grid();
        let mut b = ramp_grid();
        b.set(2, 1, 2.5);
        let diff = DiffStats::of(&a, &b);
        assert_eq!(diff.differing, 1);
        assert!((diff.max_abs - 0.5).abs() < 1e-12);
    }
}
