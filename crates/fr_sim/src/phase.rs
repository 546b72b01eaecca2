// crates/fr_sim/src/phase.rs
//! 运行阶段、结局判定与演进节拍。

use fr_foundation::defaults::{
    MAX_YIELDSTEPS, MAX_YIELDSTEP_S, MIN_YIELDSTEP_S,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 演进到这个比例即视为跑完。
pub const COMPLETION_FRACTION: f64 = 0.99;

// ============================================================
// 运行阶段
// ============================================================

/// 一次运行经过的阶段。
///
/// 正常路径 INIT → MESH_BUILD → DISTRIBUTE → EVOLVE → FINALIZE
/// → COMPLETE；续算在 DISTRIBUTE 之后插入 RESTART；任何阶段出错
/// 进入 FAILED。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    /// 读入情景、烧录地形
    Init,
    /// 建网
    MeshBuild,
    /// 切分片、起线程
    Distribute,
    /// 恢复检查点
    Restart,
    /// 演进主循环
    Evolve,
    /// 诊断归纳与出图
    Finalize,
    /// 正常结束
    Complete,
    /// 出错结束
    Failed,
}

impl RunPhase {
    /// 是否为终态。
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Complete | RunPhase::Failed)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RunPhase::Init => "INIT",
            RunPhase::MeshBuild => "MESH_BUILD",
            RunPhase::Distribute => "DISTRIBUTE",
            RunPhase::Restart => "RESTART",
            RunPhase::Evolve => "EVOLVE",
            RunPhase::Finalize => "FINALIZE",
            RunPhase::Complete => "COMPLETE",
            RunPhase::Failed => "FAILED",
        };
        write!(f, "{text}")
    }
}

// ============================================================
// 运行结局
// ============================================================

/// 演进循环退出时的结局。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// 演进到时长的 [`COMPLETION_FRACTION`] 以上
    Completed,
    /// 提前退出且未达到完成比例
    Incomplete,
    /// 推算流速触顶，数值失稳
    Unstable,
    /// 哨兵文件或信号请求下车
    Bailed,
}

impl RunOutcome {
    /// 根据循环退出时的状态判定结局。
    ///
    /// 失稳优先于下车：被下车的运行若同时触顶，记失稳更有
    /// 诊断价值。
    #[must_use]
    pub fn classify(sim_time_s: f64, duration_s: f64, unstable: bool, bailed: bool) -> Self {
        if unstable {
            RunOutcome::Unstable
        } else if bailed {
            RunOutcome::Bailed
        } else if sim_time_s >= COMPLETION_FRACTION * duration_s {
            RunOutcome::Completed
        } else {
            RunOutcome::Incomplete
        }
    }

    /// 结局名。
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "Completed",
            RunOutcome::Incomplete => "Incomplete",
            RunOutcome::Unstable => "Unstable",
            RunOutcome::Bailed => "Bailed",
        }
    }

    /// 是否产出可信的完整结果。
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================
// 演进节拍
// ============================================================

/// 同步门间隔（秒）。
///
/// 时长均分为至多 [`MAX_YIELDSTEPS`] 段，再按上下限裁剪：短运行
/// 不至于门开得太密，长运行不至于一门占住太久。
#[must_use]
pub fn compute_yieldstep(duration_s: f64) -> f64 {
    (duration_s / MAX_YIELDSTEPS).clamp(MIN_YIELDSTEP_S, MAX_YIELDSTEP_S)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yieldstep_bounds() {
        assert_eq!(compute_yieldstep(600.0), 60.0);
        assert_eq!(compute_yieldstep(6_100.0), 61.0);
        assert_eq!(compute_yieldstep(86_400.0), 864.0);
        assert_eq!(compute_yieldstep(180_000.0), 1_800.0);
    }

    #[test]
    fn test_outcome_classification() {
        assert_eq!(
            RunOutcome::classify(3_600.0, 3_600.0, false, false),
            RunOutcome::Completed
        );
        // 达到完成比例即算跑完
        assert_eq!(
            RunOutcome::classify(3_570.0, 3_600.0, false, false),
            RunOutcome::Completed
        );
        assert_eq!(
            RunOutcome::classify(1_800.0, 3_600.0, false, false),
            RunOutcome::Incomplete
        );
        assert_eq!(
            RunOutcome::classify(1_800.0, 3_600.0, true, false),
            RunOutcome::Unstable
        );
        assert_eq!(
            RunOutcome::classify(1_800.0, 3_600.0, false, true),
            RunOutcome::Bailed
        );
        // 失稳压过下车
        assert_eq!(
            RunOutcome::classify(1_800.0, 3_600.0, true, true),
            RunOutcome::Unstable
        );
    }

    #[test]
    fn test_phase_display_and_terminal() {
        assert_eq!(RunPhase::MeshBuild.to_string(), "MESH_BUILD");
        assert_eq!(RunPhase::Restart.to_string(), "RESTART");
        assert!(RunPhase::Complete.is_terminal());
        assert!(RunPhase::Failed.is_terminal());
        assert!(!RunPhase::Evolve.is_terminal());
    }
}
