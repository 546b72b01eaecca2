// crates/fr_engine/src/error.rs
//! 引擎层错误类型。

use thiserror::Error;

/// 求解器错误。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// 域描述不可用
    #[error("域描述不可用: {0}")]
    InvalidDomain(String),

    /// 分辨率太细，网格规模超限
    #[error("网格 {nx}×{ny} 超过上限 {limit} 个单元，请放粗分辨率")]
    TooManyCells {
        /// 列数
        nx: usize,
        /// 行数
        ny: usize,
        /// 单元数上限
        limit: usize,
    },

    /// 分片数不可用
    #[error("无法把 {rows} 行网格切成 {ranks} 个分片")]
    BadPartition {
        /// 网格行数
        rows: usize,
        /// 请求的分片数
        ranks: usize,
    },

    /// 恢复状态与当前网格不匹配
    #[error("状态恢复失败: {0}")]
    StateMismatch(String),

    /// 状态字节流损坏
    #[error("状态字节流损坏: {0}")]
    CorruptState(String),
}

impl EngineError {
    /// 构造域描述错误。
    #[inline]
    pub fn invalid_domain(msg: impl Into<String>) -> Self {
        Self::InvalidDomain(msg.into())
    }

    /// 构造状态不匹配错误。
    #[inline]
    pub fn state_mismatch(msg: impl Into<String>) -> Self {
        Self::StateMismatch(msg.into())
    }
}

/// 引擎层结果别名。
pub type EngineResult<T> = Result<T, EngineError>;
