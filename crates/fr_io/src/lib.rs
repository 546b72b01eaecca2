// crates/fr_io/src/lib.rs
//! Freshet 存储层。
//!
//! 两种自描述二进制格式，数值一律小端：
//! - [`series`]: 量值时序文件（`.fts`），静态几何写一次，
//!   量值帧带校验和追加，支持流式读取与断点续写
//! - [`checkpoint`]: 分片检查点（`.fck`），原子落盘，按分片
//!   保留最近若干份
//!
//! 两种格式都用 CRC32 校验，损坏的帧或检查点在读取时被拒绝。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
pub mod crc;
pub mod error;
pub mod series;

pub use checkpoint::{CheckpointRecord, CheckpointStore};
pub use error::{IoError, IoResult};
pub use series::{series_path, SeriesReader, SeriesWriter};
