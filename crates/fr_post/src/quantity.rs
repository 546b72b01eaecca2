// crates/fr_post/src/quantity.rs

//! 可栅格化的量值。
//!
//! 名字进入产物文件名，与下游制图工具的约定一致，
//! `depthIntegratedVelocity` 的驼峰拼法也因此保留。

use std::fmt;
use std::str::FromStr;

use fr_foundation::defaults::{MINIMUM_STORABLE_HEIGHT_M, MIN_ALLOWED_HEIGHT_M};

/// 栅格化的量值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    /// 水深 [m]
    Depth,
    /// 流速 [m/s]
    Velocity,
    /// 深度积分流速（单宽流量模）[m²/s]
    DepthIntegratedVelocity,
    /// 水位 [m]
    Stage,
}

impl Quantity {
    /// 全部量值，产物按此顺序写出。
    pub const ALL: [Quantity; 4] = [
        Quantity::Depth,
        Quantity::Velocity,
        Quantity::DepthIntegratedVelocity,
        Quantity::Stage,
    ];

    /// 产物文件名里的量值段。
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Quantity::Depth => "depth",
            Quantity::Velocity => "velocity",
            Quantity::DepthIntegratedVelocity => "depthIntegratedVelocity",
            Quantity::Stage => "stage",
        }
    }

    /// 从顶点状态取本量值的顶点值。
    ///
    /// `depth` 与 `momentum_mag` 由调用方按帧预先算好，四个量值
    /// 共用。水深薄于 [`MIN_ALLOWED_HEIGHT_M`] 时流速取 0 而不是
    /// 动量除以近零水深。
    #[must_use]
    pub fn vertex_values(
        &self,
        depth: &[f64],
        momentum_mag: &[f64],
        stage: &[f64],
    ) -> Vec<f64> {
        match self {
            Quantity::Depth => depth.to_vec(),
            Quantity::Stage => stage.to_vec(),
            Quantity::DepthIntegratedVelocity => momentum_mag.to_vec(),
            Quantity::Velocity => depth
                .iter()
                .zip(momentum_mag)
                .map(|(&h, &m)| if h > MIN_ALLOWED_HEIGHT_M { m / h } else { 0.0 })
                .collect(),
        }
    }

    /// 插值后的单元值收尾。
    ///
    /// 水深不取负，薄于 [`MINIMUM_STORABLE_HEIGHT_M`] 的记 0。
    #[inline]
    #[must_use]
    pub fn finalize_cell(&self, value: f64) -> f64 {
        match self {
            Quantity::Depth => {
                let clamped = value.max(0.0);
                if clamped < MINIMUM_STORABLE_HEIGHT_M {
                    0.0
                } else {
                    clamped
                }
            }
            _ => value,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quantity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "depth" => Ok(Quantity::Depth),
            "velocity" => Ok(Quantity::Velocity),
            "depthIntegratedVelocity" | "depth_integrated_velocity" => {
                Ok(Quantity::DepthIntegratedVelocity)
            }
            "stage" => Ok(Quantity::Stage),
            other => Err(format!(
                "未知量值 {other}，可选: depth, velocity, depthIntegratedVelocity, stage"
            )),
        }
    }
}

// ============================================================
// 测试
// ============================================================
