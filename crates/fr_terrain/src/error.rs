// crates/fr_terrain/src/error.rs
//! 地形层错误类型。

use std::path::PathBuf;
use thiserror::Error;

/// 栅格读写与插值错误。
#[derive(Debug, Error)]
pub enum RasterError {
    /// 底层文件操作失败
    #[error("栅格文件操作失败 {path}: {source}")]
    Io {
        /// 出错的文件路径
        path: PathBuf,
        /// 底层 IO 错误
        #[source]
        source: std::io::Error,
    },

    /// 文本栅格解析失败
    #[error("解析 {path} 失败: {reason}")]
    Parse {
        /// 被解析的文件
        path: PathBuf,
        /// 失败原因
        reason: String,
    },

    /// 数据长度与行列数不符
    #[error("栅格数据长度不符: 期望 {expected} 个值，实际 {found} 个")]
    SizeMismatch {
        /// 期望的值个数
        expected: usize,
        /// 实际的值个数
        found: usize,
    },

    /// 按扩展名无法识别的格式
    #[error("无法识别的栅格格式: {path}")]
    Unsupported {
        /// 被检查的文件
        path: PathBuf,
    },

    /// GeoTIFF 请求但编译时未启用 gdal 特性
    #[error("读写 {path} 需要 gdal 特性，请以 --features gdal 重新编译")]
    GdalUnavailable {
        /// 被请求的文件
        path: PathBuf,
    },

    /// GDAL 调用失败
    #[cfg(feature = "gdal")]
    #[error("GDAL 操作失败 {path}: {message}")]
    Gdal {
        /// 出错的文件路径
        path: PathBuf,
        /// GDAL 报告的消息
        message: String,
    },
}

impl RasterError {
    /// 构造文件操作错误。
    #[inline]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// 构造解析错误。
    #[inline]
    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// 地形层结果别名。
pub type RasterResult<T> = Result<T, RasterError>;
