// crates/fr_sim/src/context.rs
//! 运行上下文。
//!
//! 跨线程共享的运行状态：阶段、模拟时刻与下车标志。领队持有
//! 上下文推进状态，信号装置与观察方只读或置下车标志。

use crate::phase::RunPhase;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// 一次运行的共享状态。
pub struct RunContext {
    run_label: String,
    duration_s: f64,
    started: Instant,
    bail: Arc<AtomicBool>,
    phase: RwLock<RunPhase>,
    sim_time_s: RwLock<f64>,
}

impl RunContext {
    /// 创建上下文，阶段从 INIT 起。
    #[must_use]
    pub fn new(run_label: impl Into<String>, duration_s: f64) -> Self {
        Self::with_bail_flag(run_label, duration_s, Arc::new(AtomicBool::new(false)))
    }

    /// 用调用方提供的下车标志创建上下文，信号钩子可以先行持有
    /// 这个标志。
    #[must_use]
    pub fn with_bail_flag(
        run_label: impl Into<String>,
        duration_s: f64,
        bail: Arc<AtomicBool>,
    ) -> Self {
        Self {
            run_label: run_label.into(),
            duration_s,
            started: Instant::now(),
            bail,
            phase: RwLock::new(RunPhase::Init),
            sim_time_s: RwLock::new(0.0),
        }
    }

    /// 运行标识。
    #[must_use]
    pub fn run_label(&self) -> &str {
        &self.run_label
    }

    /// 计划时长（秒）。
    #[must_use]
    pub fn duration_s(&self) -> f64 {
        self.duration_s
    }

    /// 当前阶段。
    #[must_use]
    pub fn phase(&self) -> RunPhase {
        *self.phase.read()
    }

    /// 切换阶段并记录迁移。
    pub fn set_phase(&self, next: RunPhase) {
        let mut phase = self.phase.write();
        if *phase != next {
            tracing::info!("{}: phase {} -> {}", self.run_label, *phase, next);
            *phase = next;
        }
    }

    /// 当前模拟时刻（秒）。
    #[must_use]
    pub fn sim_time_s(&self) -> f64 {
        *self.sim_time_s.read()
    }

    /// 推进模拟时刻。
    pub fn set_sim_time(&self, time_s: f64) {
        *self.sim_time_s.write() = time_s;
    }

    /// 演进进度 [0, 1]。
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.duration_s <= 0.0 {
            return 1.0;
        }
        (self.sim_time_s() / self.duration_s).clamp(0.0, 1.0)
    }

    /// 起跑以来的墙钟秒数。
    #[must_use]
    pub fn elapsed_s(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// 请求在下一个同步门下车。
    pub fn request_bail(&self) {
        self.bail.store(true, Ordering::SeqCst);
    }

    /// 是否已请求下车。
    #[must_use]
    pub fn bail_requested(&self) -> bool {
        self.bail.load(Ordering::SeqCst)
    }

    /// 下车标志的句柄，交给信号装置。
    #[must_use]
    pub fn bail_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.bail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_clamps() {
        let ctx = RunContext::new("run_1_2_0", 3_600.0);
        assert_eq!(ctx.progress(), 0.0);
        ctx.set_sim_time(1_800.0);
        assert!((ctx.progress() - 0.5).abs() < 1.0e-12);
        ctx.set_sim_time(7_200.0);
        assert_eq!(ctx.progress(), 1.0);
    }

    #[test]
    fn test_bail_flag_is_shared() {
        let ctx = RunContext::new("run_1_2_0", 60.0);
        let flag = ctx.bail_flag();
        assert!(!ctx.bail_requested());
        flag.store(true, Ordering::SeqCst);
        assert!(ctx.bail_requested());
    }

    #[test]
    fn test_phase_transitions() {
        let ctx = RunContext::new("run_1_2_0", 60.0);
        assert_eq!(ctx.phase(), RunPhase::Init);
        ctx.set_phase(RunPhase::MeshBuild);
        ctx.set_phase(RunPhase::Evolve);
        assert_eq!(ctx.phase(), RunPhase::Evolve);
        assert!(!ctx.phase().is_terminal());
    }

    #[test]
    fn test_zero_duration_progress() {
        let ctx = RunContext::new("run_1_2_0", 0.0);
        assert_eq!(ctx.progress(), 1.0);
    }
}
