// crates/fr_post/src/error.rs
//! 后处理错误类型。

use std::path::PathBuf;
use thiserror::Error;

/// 后处理错误。
#[derive(Debug, Error)]
pub enum PostError {
    /// 流场时序不存在，先跑模拟
    #[error("找不到流场时序 {path}，该运行可能尚未演进")]
    MissingSeries {
        /// 期望的时序文件路径
        path: PathBuf,
    },

    /// 时序里没有网格点
    #[error("流场时序 {path} 不含任何网格点")]
    EmptyMesh {
        /// 被读取的时序文件
        path: PathBuf,
    },

    /// 时序读取失败
    #[error(transparent)]
    Series(#[from] fr_io::IoError),

    /// 栅格写出失败
    #[error(transparent)]
    Raster(#[from] fr_terrain::RasterError),
}

/// 后处理结果别名。
pub type PostResult<T> = Result<T, PostError>;
