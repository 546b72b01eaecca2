// crates/fr_engine/src/engine.rs
//! 演进接口与量值帧。
//!
//! 求解器被切成若干分片（rank），每个分片拥有一段连续的网格
//! 行带。协调方在同步门之间驱动分片：演进到目标时刻、交换
//! 带缘水深、合并统计与量值切片。

use crate::error::EngineResult;
use fr_foundation::defaults::WET_DEPTH_THRESHOLD_M;
use fr_geo::Point2D;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================
// 步进统计
// ============================================================

/// 一次演进（到同步门）的统计。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepStats {
    /// 演进到的时刻（秒）
    pub time_s: f64,
    /// 内部时间步数
    pub n_internal_steps: u64,
    /// 最后一个内部时间步长（秒）
    pub last_dt_s: f64,
    /// 统计范围内的活动单元数
    pub active_cells: usize,
    /// 湿单元数（水深超过湿判阈值）
    pub wet_cells: usize,
    /// 湿单元占比
    pub wet_fraction: f64,
    /// 存水体积（m³）
    pub volume_m3: f64,
    /// 最大水深（米）
    pub max_depth_m: f64,
    /// 最大流速（m/s）
    pub max_speed_ms: f64,
    /// 最大流速处的 x 分速
    pub peak_speed_x: f64,
    /// 最大流速处的 y 分速
    pub peak_speed_y: f64,
    /// 湿单元最小内切圆半径（米），无湿单元时为 0
    pub min_wet_inradius_m: f64,
}

impl StepStats {
    /// 零值统计。
    #[must_use]
    pub fn empty(time_s: f64) -> Self {
        Self {
            time_s,
            n_internal_steps: 0,
            last_dt_s: 0.0,
            active_cells: 0,
            wet_cells: 0,
            wet_fraction: 0.0,
            volume_m3: 0.0,
            max_depth_m: 0.0,
            max_speed_ms: 0.0,
            peak_speed_x: 0.0,
            peak_speed_y: 0.0,
            min_wet_inradius_m: 0.0,
        }
    }

    /// 合并各分片同一同步门的统计。
    ///
    /// 计数求和、极值取最大、步长取最小；峰值分速取最大流速
    /// 所在分片的记录。
    #[must_use]
    pub fn merge(parts: &[StepStats]) -> Self {
        let Some(first) = parts.first() else {
            return Self::empty(0.0);
        };
        let mut merged = Self::empty(first.time_s);
        for p in parts {
            merged.n_internal_steps = merged.n_internal_steps.max(p.n_internal_steps);
            if p.last_dt_s > 0.0 {
                merged.last_dt_s = if merged.last_dt_s > 0.0 {
                    merged.last_dt_s.min(p.last_dt_s)
                } else {
                    p.last_dt_s
                };
            }
            merged.active_cells += p.active_cells;
            merged.wet_cells += p.wet_cells;
            merged.volume_m3 += p.volume_m3;
            merged.max_depth_m = merged.max_depth_m.max(p.max_depth_m);
            if p.max_speed_ms > merged.max_speed_ms {
                merged.max_speed_ms = p.max_speed_ms;
                merged.peak_speed_x = p.peak_speed_x;
                merged.peak_speed_y = p.peak_speed_y;
            }
            if p.min_wet_inradius_m > 0.0 {
                merged.min_wet_inradius_m = if merged.min_wet_inradius_m > 0.0 {
                    merged.min_wet_inradius_m.min(p.min_wet_inradius_m)
                } else {
                    p.min_wet_inradius_m
                };
            }
        }
        merged.wet_fraction = if merged.active_cells > 0 {
            merged.wet_cells as f64 / merged.active_cells as f64
        } else {
            0.0
        };
        merged
    }
}

// ============================================================
// 网格摘要
// ============================================================

/// 建网结果摘要，进入诊断产物。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshSummary {
    /// 网格列数
    pub nx: usize,
    /// 网格行数
    pub ny: usize,
    /// 单元尺寸（米）
    pub cell_size_m: f64,
    /// 活动单元数
    pub active_cells: usize,
    /// 被孔洞挖掉的单元数
    pub hole_cells: usize,
    /// 加密区个数
    pub region_count: usize,
}

impl fmt::Display for MeshSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "uniform grid {}x{} @ {} m, {} active cells, {} hole cells, {} regions",
            self.nx, self.ny, self.cell_size_m, self.active_cells, self.hole_cells,
            self.region_count
        )
    }
}

// ============================================================
// 量值帧
// ============================================================

/// 活动单元的静态几何：中心点与高程，整个运行期不变。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameGeometry {
    /// 活动单元中心，行优先顺序
    pub points: Vec<Point2D>,
    /// 对应高程（米）
    pub elevation: Vec<f64>,
}

/// 某一分片在某一时刻的量值切片。
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSlice {
    /// 分片号
    pub rank: usize,
    /// 时刻（秒）
    pub time_s: f64,
    /// 水位（米）
    pub stage: Vec<f64>,
    /// x 向单宽动量（m²/s）
    pub xmom: Vec<f64>,
    /// y 向单宽动量（m²/s）
    pub ymom: Vec<f64>,
}

/// 全域量值帧。
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// 时刻（秒）
    pub time_s: f64,
    /// 水位（米）
    pub stage: Vec<f64>,
    /// x 向单宽动量（m²/s）
    pub xmom: Vec<f64>,
    /// y 向单宽动量（m²/s）
    pub ymom: Vec<f64>,
}

impl Frame {
    /// 按分片号顺序拼接切片。
    #[must_use]
    pub fn assemble(mut slices: Vec<FrameSlice>) -> Self {
        slices.sort_by_key(|s| s.rank);
        let time_s = slices.first().map_or(0.0, |s| s.time_s);
        let total: usize = slices.iter().map(|s| s.stage.len()).sum();
        let mut frame = Frame {
            time_s,
            stage: Vec::with_capacity(total),
            xmom: Vec::with_capacity(total),
            ymom: Vec::with_capacity(total),
        };
        for mut s in slices {
            frame.stage.append(&mut s.stage);
            frame.xmom.append(&mut s.xmom);
            frame.ymom.append(&mut s.ymom);
        }
        frame
    }

    /// 点数。
    #[must_use]
    pub fn len(&self) -> usize {
        self.stage.len()
    }

    /// 是否没有点。
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stage.is_empty()
    }
}

/// 分片带缘水深，同步门处交换。
#[derive(Debug, Clone, PartialEq)]
pub struct HaloData {
    /// 分片号
    pub rank: usize,
    /// 本带最下一行（全局行号小端）的水深
    pub first_row_depth: Vec<f64>,
    /// 本带最上一行的水深
    pub last_row_depth: Vec<f64>,
}

// ============================================================
// 分片接口
// ============================================================

/// 一个可独立演进的网格分片。
pub trait RankEngine: Send {
    /// 分片号，从 0 起。
    fn rank(&self) -> usize;

    /// 当前时刻（秒）。
    fn time(&self) -> f64;

    /// 演进到目标时刻，返回本分片统计。
    fn evolve_to(&mut self, target_s: f64) -> EngineResult<StepStats>;

    /// 导出带缘水深。
    fn halo_out(&self) -> HaloData;

    /// 注入邻带带缘水深。`below` 来自行号更小的邻带，`above`
    /// 来自行号更大的邻带。
    fn halo_in(&mut self, below: Option<&HaloData>, above: Option<&HaloData>);

    /// 当前量值切片。
    fn frame_slice(&self) -> FrameSlice;

    /// 序列化分片状态。
    fn state_bytes(&self) -> Vec<u8>;

    /// 从字节流恢复分片状态。
    fn restore_state(&mut self, bytes: &[u8]) -> EngineResult<()>;
}

/// 水深是否算湿。
#[inline]
#[must_use]
pub fn is_wet(depth: f64) -> bool {
    depth > WET_DEPTH_THRESHOLD_M
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_stats() {
        let mut a = StepStats::empty(60.0);
        a.n_internal_steps = 10;
        a.last_dt_s = 0.5;
        a.active_cells = 100;
        a.wet_cells = 20;
        a.volume_m3 = 5.0;
        a.max_depth_m = 0.3;
        a.max_speed_ms = 1.2;
        a.peak_speed_x = 1.0;
        a.peak_speed_y = 0.66;
        a.min_wet_inradius_m = 2.5;

        let mut b = StepStats::empty(60.0);
        b.n_internal_steps = 12;
        b.last_dt_s = 0.4;
        b.active_cells = 80;
        b.wet_cells = 4;
        b.volume_m3 = 1.0;
        b.max_depth_m = 0.1;
        b.max_speed_ms = 0.2;
        b.min_wet_inradius_m = 2.5;

        let merged = StepStats::merge(&[a, b]);
        assert_eq!(merged.time_s, 60.0);
        assert_eq!(merged.n_internal_steps, 12);
        assert_eq!(merged.last_dt_s, 0.4);
        assert_eq!(merged.active_cells, 180);
        assert_eq!(merged.wet_cells, 24);
        assert!((merged.wet_fraction - 24.0 / 180.0).abs() < 1.0e-12);
        assert!((merged.volume_m3 - 6.0).abs() < 1.0e-12);
        assert_eq!(merged.max_depth_m, 0.3);
        assert_eq!(merged.max_speed_ms, 1.2);
        assert_eq!(merged.peak_speed_x, 1.0);
        assert_eq!(merged.peak_speed_y, 0.66);
        assert_eq!(merged.min_wet_inradius_m, 2.5);
    }

    #[test]
    fn test_merge_empty() {
        let merged = StepStats::merge(&[]);
        assert_eq!(merged.wet_cells, 0);
        assert_eq!(merged.wet_fraction, 0.0);
    }

    #[test]
    fn test_frame_assembly_orders_by_rank() {
        let s1 = FrameSlice {
            rank: 1,
            time_s: 10.0,
            stage: vec![3.0, 4.0],
            xmom: vec![0.3, 0.4],
            ymom: vec![-0.3, -0.4],
        };
        let s0 = FrameSlice {
            rank: 0,
            time_s: 10.0,
            stage: vec![1.0, 2.0],
            xmom: vec![0.1, 0.2],
            ymom: vec![-0.1, -0.2],
        };
        let frame = Frame::assemble(vec![s1, s0]);
        assert_eq!(frame.time_s, 10.0);
        assert_eq!(frame.stage, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(frame.xmom, vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(frame.len(), 4);
    }

    #[test]
    fn test_wet_threshold() {
        assert!(!is_wet(0.0));
        assert!(!is_wet(1.0e-3));
        assert!(is_wet(2.0e-3));
    }
}
