// crates/fr_io/src/error.rs
//! 存储层错误类型。

use std::path::PathBuf;
use thiserror::Error;

/// 存储层错误。
#[derive(Debug, Error)]
pub enum IoError {
    /// 底层文件操作失败
    #[error("文件操作失败 {path}: {source}")]
    File {
        /// 出错的文件路径
        path: PathBuf,
        /// 底层 IO 错误
        #[source]
        source: std::io::Error,
    },

    /// 文件头魔数不符
    #[error("{path} 不是 {expected} 文件")]
    BadMagic {
        /// 被检查的文件
        path: PathBuf,
        /// 期望的格式名
        expected: &'static str,
    },

    /// 格式版本不受支持
    #[error("{path} 格式版本 {found}，当前只支持 {supported}")]
    BadVersion {
        /// 被检查的文件
        path: PathBuf,
        /// 文件声明的版本
        found: u32,
        /// 支持的版本
        supported: u32,
    },

    /// 帧校验和不符
    #[error("{path} 第 {index} 帧校验失败")]
    CorruptFrame {
        /// 被检查的文件
        path: PathBuf,
        /// 帧序号（从 0 起）
        index: usize,
    },

    /// 检查点内容损坏
    #[error("检查点 {path} 损坏: {reason}")]
    CorruptCheckpoint {
        /// 被检查的文件
        path: PathBuf,
        /// 损坏原因
        reason: String,
    },

    /// 时序文件头损坏
    #[error("{path} 文件头损坏: {reason}")]
    CorruptHeader {
        /// 被检查的文件
        path: PathBuf,
        /// 损坏原因
        reason: String,
    },

    /// 时序文件几何与当前运行不一致
    #[error("{path} 几何不匹配: 文件 {found} 点，当前 {expected} 点")]
    GeometryMismatch {
        /// 被检查的文件
        path: PathBuf,
        /// 文件中的点数
        found: usize,
        /// 期望的点数
        expected: usize,
    },
}

impl IoError {
    /// 构造文件操作错误。
    #[inline]
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }
}

/// 存储层结果别名。
pub type IoResult<T> = Result<T, IoError>;
