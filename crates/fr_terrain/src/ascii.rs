// crates/fr_terrain/src/ascii.rs

//! ESRI ASCII Grid 读写。
//!
//! 六行头部加行优先数据，自北向南。写出格式固定，同样的栅格
//! 重写得到逐字节相同的文件。

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{RasterError, RasterResult};
use crate::raster::RasterGrid;

/// 读入 ESRI ASCII Grid。
///
/// 头部键不分大小写，接受 `xllcorner`/`yllcorner` 或
/// `xllcenter`/`yllcenter`（换算成角点）。缺 `NODATA_value`
/// 时按 −9999 处理。
pub fn read_ascii_grid(path: &Path) -> RasterResult<RasterGrid> {
    let text = std::fs::read_to_string(path).map_err(|e| RasterError::io(path, e))?;
    let mut tokens = text.split_whitespace();

    let mut nx = None;
    let mut ny = None;
    let mut xll = None;
    let mut yll = None;
    let mut x_is_center = false;
    let mut y_is_center = false;
    let mut cell = None;
    let mut nodata = -9999.0;

    // 头部是 键 值 对，读到第一个非键词为止
    let first_value = loop {
        let Some(key) = tokens.next() else {
            return Err(RasterError::parse(path, "文件为空"));
        };
        let lower = key.to_ascii_lowercase();
        let known = matches!(
            lower.as_str(),
            "ncols"
                | "nrows"
                | "xllcorner"
                | "xllcenter"
                | "yllcorner"
                | "yllcenter"
                | "cellsize"
                | "nodata_value"
        );
        if !known {
            break key;
        }
        let Some(raw) = tokens.next() else {
            return Err(RasterError::parse(path, format!("头部 {lower} 缺少值")));
        };
        let value: f64 = raw
            .parse()
            .map_err(|_| RasterError::parse(path, format!("头部 {lower} 的值不是数: {raw}")))?;
        match lower.as_str() {
            "ncols" => nx = Some(value as usize),
            "nrows" => ny = Some(value as usize),
            "xllcorner" => xll = Some(value),
            "xllcenter" => {
                xll = Some(value);
                x_is_center = true;
            }
            "yllcorner" => yll = Some(value),
            "yllcenter" => {
                yll = Some(value);
                y_is_center = true;
            }
            "cellsize" => cell = Some(value),
            _ => nodata = value,
        }
    };

    let (Some(nx), Some(ny), Some(mut xll), Some(mut yll), Some(cell)) =
        (nx, ny, xll, yll, cell)
    else {
        return Err(RasterError::parse(
            path,
            "头部不完整，需要 ncols/nrows/xllcorner/yllcorner/cellsize",
        ));
    };
    if x_is_center {
        xll -= cell / 2.0;
    }
    if y_is_center {
        yll -= cell / 2.0;
    }

    let mut data = Vec::with_capacity(nx * ny);
    for raw in std::iter::once(first_value).chain(tokens) {
        let value: f64 = raw
            .parse()
            .map_err(|_| RasterError::parse(path, format!("数据值不是数: {raw}")))?;
        data.push(value);
    }
    if data.len() != nx * ny {
        return Err(RasterError::SizeMismatch {
            expected: nx * ny,
            found: data.len(),
        });
    }

    RasterGrid::from_data(nx, ny, xll, yll, cell, nodata, data)
}

/// 写出 ESRI ASCII Grid。
///
/// 数据值保留三位小数，无数据值按头部原样写出。
pub fn write_ascii_grid(grid: &RasterGrid, path: &Path) -> RasterResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| RasterError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| RasterError::io(path, e))?;
    let mut w = BufWriter::new(file);

    write_grid_to(grid, &mut w).map_err(|e| RasterError::io(path, e))?;
    w.flush().map_err(|e| RasterError::io(path, e))
}

fn write_grid_to(grid: &RasterGrid, w: &mut impl Write) -> std::io::Result<()> {
    writeln!(w, "ncols {}", grid.nx)?;
    writeln!(w, "nrows {}", grid.ny)?;
    writeln!(w, "xllcorner {}", grid.xll)?;
    writeln!(w, "yllcorner {}", grid.yll)?;
    writeln!(w, "cellsize {}", grid.cell)?;
    writeln!(w, "NODATA_value {}", grid.nodata)?;
    for row in grid.data.chunks(grid.nx) {
        let mut first = true;
        for &v in row {
            if !first {
                write!(w, " ")?;
            }
            first = false;
            if grid.is_nodata(v) {
                write!(w, "{}", grid.nodata)?;
            } else {
                write!(w, "{v:.3}")?;
            }
        }
        writeln!(w)?;
    }
    Ok(())
}

// ============================================================
// 测试
// ============================================================
