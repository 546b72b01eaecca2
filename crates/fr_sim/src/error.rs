// crates/fr_sim/src/error.rs
//! 编排层错误类型。

use crate::phase::RunPhase;
use std::path::PathBuf;
use thiserror::Error;

/// 一次运行中可能出现的错误。
#[derive(Debug, Error)]
pub enum SimError {
    /// 情景包加载或校验失败
    #[error(transparent)]
    Scenario(#[from] fr_scenario::ScenarioError),

    /// 求解器失败
    #[error(transparent)]
    Engine(#[from] fr_engine::EngineError),

    /// 时序或检查点读写失败
    #[error(transparent)]
    Storage(#[from] fr_io::IoError),

    /// 地形栅格读写失败
    #[error(transparent)]
    Terrain(#[from] fr_terrain::RasterError),

    /// 续算时找不到全分片共同的检查点时刻
    #[error("{run_label} 没有可用的共同检查点，无法续算")]
    NoCheckpoint {
        /// 运行标识
        run_label: String,
    },

    /// 某分片恢复检查点时重试耗尽
    #[error("分片 {rank} 恢复 t={time_s}s 检查点失败，已重试 {attempts} 次: {reason}")]
    Restore {
        /// 分片号
        rank: usize,
        /// 目标时刻（秒）
        time_s: f64,
        /// 已尝试次数
        attempts: usize,
        /// 最后一次失败原因
        reason: String,
    },

    /// 某分片演进失败
    #[error("分片 {rank} 演进失败: {reason}")]
    Rank {
        /// 分片号
        rank: usize,
        /// 失败原因
        reason: String,
    },

    /// 分片线程失联
    #[error("分片 {rank} 线程失联")]
    RankLost {
        /// 分片号
        rank: usize,
    },

    /// 分片报告通道关闭，没有分片存活
    #[error("分片报告通道已关闭")]
    PoolClosed,

    /// 分片线程启动失败
    #[error("分片 {rank} 线程启动失败")]
    Spawn {
        /// 分片号
        rank: usize,
        /// 底层错误
        #[source]
        source: std::io::Error,
    },

    /// 通告的产物文件不存在
    #[error("产物 {label} 不存在: {path}")]
    MissingProduct {
        /// 产物名
        label: String,
        /// 期望路径
        path: PathBuf,
    },

    /// 诊断产物写出失败
    #[error("诊断产物 {path} 写出失败")]
    Diagnostics {
        /// 目标路径
        path: PathBuf,
        /// 底层错误
        #[source]
        source: std::io::Error,
    },

    /// 带阶段上下文的错误
    #[error("阶段 {phase} 失败: {source}")]
    Phase {
        /// 失败时所处阶段
        phase: RunPhase,
        /// 底层错误
        #[source]
        source: Box<SimError>,
    },
}

impl SimError {
    /// 给错误补上阶段上下文。已带阶段的错误保持不变。
    #[must_use]
    pub fn in_phase(self, phase: RunPhase) -> Self {
        match self {
            SimError::Phase { .. } => self,
            other => SimError::Phase {
                phase,
                source: Box::new(other),
            },
        }
    }

    /// 错误发生时所处的阶段，未标注时为 `None`。
    #[must_use]
    pub fn phase(&self) -> Option<RunPhase> {
        match self {
            SimError::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

/// 编排层结果别名。
pub type SimResult<T> = Result<T, SimError>;
