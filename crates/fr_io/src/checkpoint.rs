// crates/fr_io/src/checkpoint.rs

//! 分区检查点的保存与恢复。
//!
//! 每个算域分区独立写出自己的检查点文件，恢复时按分区号取回。
//! 文件先写入 `.tmp` 再原子改名，崩溃不会留下半个检查点。
//!
//! # 文件格式 (v1)
//!
//! ```text
//! [魔数: 4 bytes] "FRCK"
//! [版本: u32]
//! [分区号: u64]
//! [模拟时间: f64]
//! [创建时间戳: u64]
//! [负载长度: u64]
//! [负载: payload_len bytes]
//! [CRC32: u32]
//! ```
//!
//! 负载是引擎自述的分区状态字节串，本层不解释其内容。

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use fr_foundation::defaults::CHECKPOINT_KEEP;

use crate::crc::crc32;
use crate::error::{IoError, IoResult};

// ============================================================
// 常量
// ============================================================

/// 检查点魔数
const CHECKPOINT_MAGIC: &[u8; 4] = b"FRCK";

/// 检查点格式版本
const CHECKPOINT_VERSION: u32 = 1;

/// 定长头部字节数（魔数到负载长度）
const HEADER_LEN: usize = 4 + 4 + 8 + 8 + 8 + 8;

/// 检查点文件扩展名
const CHECKPOINT_EXT: &str = "fck";

// ============================================================
// 检查点记录
// ============================================================

/// 单个分区在某一时刻的检查点。
#[derive(Debug, Clone)]
pub struct CheckpointRecord {
    /// 分区号
    pub rank: u64,
    /// 模拟时间 [s]
    pub time_s: f64,
    /// 创建时间戳（Unix 秒）
    pub created_at: u64,
    /// 分区状态字节串
    pub payload: Vec<u8>,
}

impl CheckpointRecord {
    /// 以当前时刻为创建时间构造记录。
    pub fn new(rank: u64, time_s: f64, payload: Vec<u8>) -> Self {
        Self {
            rank,
            time_s,
            created_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            payload,
        }
    }

    /// 保存到文件。先写临时文件再改名。
    pub fn save(&self, path: &Path) -> IoResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IoError::file(parent, e))?;
        }

        let mut data = Vec::with_capacity(HEADER_LEN + self.payload.len());
        data.extend_from_slice(CHECKPOINT_MAGIC);
        data.extend_from_slice(&CHECKPOINT_VERSION.to_le_bytes());
        data.extend_from_slice(&self.rank.to_le_bytes());
        data.extend_from_slice(&self.time_s.to_le_bytes());
        data.extend_from_slice(&self.created_at.to_le_bytes());
        data.extend_from_slice(&(self.payload.len() as u64).to_le_bytes());
        data.extend_from_slice(&self.payload);
        let crc = crc32(&data);

        let temp_path = path.with_extension("fck.tmp");
        {
            let file = File::create(&temp_path).map_err(|e| IoError::file(&temp_path, e))?;
            let mut writer = BufWriter::new(file);
            writer
                .write_all(&data)
                .and_then(|_| writer.write_all(&crc.to_le_bytes()))
                .and_then(|_| writer.flush())
                .map_err(|e| IoError::file(&temp_path, e))?;
        }
        std::fs::rename(&temp_path, path).map_err(|e| IoError::file(path, e))?;

        tracing::debug!(
            path = %path.display(),
            rank = self.rank,
            time_s = self.time_s,
            bytes = self.payload.len(),
            "checkpoint written"
        );
        Ok(())
    }

    /// 从文件加载并校验。
    pub fn load(path: &Path) -> IoResult<Self> {
        let mut all = Vec::new();
        File::open(path)
            .and_then(|mut f| f.read_to_end(&mut all))
            .map_err(|e| IoError::file(path, e))?;

        if all.len() < HEADER_LEN + 4 {
            return Err(IoError::CorruptCheckpoint {
                path: path.to_path_buf(),
                reason: format!("文件只有 {} 字节，不足一个头部", all.len()),
            });
        }
        if &all[..4] != CHECKPOINT_MAGIC {
            return Err(IoError::BadMagic {
                path: path.to_path_buf(),
                expected: "FRCK",
            });
        }

        let version = read_u32(&all, 4);
        if version != CHECKPOINT_VERSION {
            return Err(IoError::BadVersion {
                path: path.to_path_buf(),
                found: version,
                supported: CHECKPOINT_VERSION,
            });
        }

        // CRC 覆盖除末尾 4 字节外的全部内容
        let crc_offset = all.len() - 4;
        let stored = read_u32(&all, crc_offset);
        let computed = crc32(&all[..crc_offset]);
        if stored != computed {
            return Err(IoError::CorruptCheckpoint {
                path: path.to_path_buf(),
                reason: format!("校验和不符: 期望 {:08x}, 实际 {:08x}", stored, computed),
            });
        }

        let rank = read_u64(&all, 8);
        let time_s = read_f64(&all, 16);
        let created_at = read_u64(&all, 24);
        let payload_len = read_u64(&all, 32) as usize;
        if HEADER_LEN + payload_len + 4 != all.len() {
            return Err(IoError::CorruptCheckpoint {
                path: path.to_path_buf(),
                reason: format!(
                    "负载长度 {} 与文件大小 {} 不一致",
                    payload_len,
                    all.len()
                ),
            });
        }
        let payload = all[HEADER_LEN..HEADER_LEN + payload_len].to_vec();

        Ok(Self {
            rank,
            time_s,
            created_at,
            payload,
        })
    }

    /// 仅读取头部的分区号与时间（不加载负载）。
    fn read_header(path: &Path) -> IoResult<(u64, f64)> {
        let mut buf = [0u8; HEADER_LEN];
        File::open(path)
            .and_then(|mut f| f.read_exact(&mut buf))
            .map_err(|e| IoError::file(path, e))?;
        if &buf[..4] != CHECKPOINT_MAGIC {
            return Err(IoError::BadMagic {
                path: path.to_path_buf(),
                expected: "FRCK",
            });
        }
        Ok((read_u64(&buf, 8), read_f64(&buf, 16)))
    }
}

#[inline]
fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(b)
}

#[inline]
fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(b)
}

#[inline]
fn read_f64(data: &[u8], offset: usize) -> f64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&data[offset..offset + 8]);
    f64::from_le_bytes(b)
}

/// 模拟时间转文件名用毫秒数。
#[inline]
fn to_millis(time_s: f64) -> u64 {
    (time_s * 1000.0).round() as u64
}

// ============================================================
// 检查点仓库
// ============================================================

/// 一次运行的检查点目录。
///
/// 文件名形如 `{run_label}_p{rank}_t{毫秒:012}.fck`，同一运行的
/// 所有分区共享一个目录。每个分区按时间保留最近 [`CHECKPOINT_KEEP`]
/// 份，旧的在写入新检查点后删除。
pub struct CheckpointStore {
    directory: PathBuf,
    run_label: String,
    keep: usize,
}

impl CheckpointStore {
    /// 创建仓库。目录此时可以不存在。
    pub fn new(directory: impl Into<PathBuf>, run_label: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            run_label: run_label.into(),
            keep: CHECKPOINT_KEEP,
        }
    }

    /// 覆盖每分区保留份数。
    #[must_use]
    pub fn with_keep(mut self, keep: usize) -> Self {
        self.keep = keep.max(1);
        self
    }

    /// 检查点目录。
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// 保存一个分区的检查点并清理该分区的旧文件。
    pub fn save(&self, rank: u64, time_s: f64, payload: &[u8]) -> IoResult<PathBuf> {
        let path = self.path_for(rank, time_s);
        CheckpointRecord::new(rank, time_s, payload.to_vec()).save(&path)?;
        self.cleanup(rank)?;
        Ok(path)
    }

    /// 加载某分区在给定时刻的检查点。
    pub fn load(&self, rank: u64, time_s: f64) -> IoResult<CheckpointRecord> {
        let path = self.path_for(rank, time_s);
        let record = CheckpointRecord::load(&path)?;
        if record.rank != rank {
            return Err(IoError::CorruptCheckpoint {
                path,
                reason: format!("文件记录分区 {}，按文件名期望 {}", record.rank, rank),
            });
        }
        Ok(record)
    }

    /// 某分区现有的检查点，按时间升序。
    pub fn list(&self, rank: u64) -> IoResult<Vec<(PathBuf, f64)>> {
        let mut entries: Vec<(PathBuf, f64)> = self
            .scan()?
            .into_iter()
            .filter(|(_, r, _)| *r == rank)
            .map(|(path, _, time_s)| (path, time_s))
            .collect();
        entries.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(entries)
    }

    /// 所有 `n_ranks` 个分区都有检查点的最晚时刻。
    ///
    /// 某分区一个文件都没有时返回 `None`，恢复只能从头开始。
    pub fn latest_common_time(&self, n_ranks: usize) -> IoResult<Option<f64>> {
        let mut per_rank: Vec<BTreeSet<u64>> = vec![BTreeSet::new(); n_ranks];
        for (_, rank, time_s) in self.scan()? {
            if (rank as usize) < n_ranks {
                per_rank[rank as usize].insert(to_millis(time_s));
            }
        }
        let Some(first) = per_rank.first() else {
            return Ok(None);
        };
        let common = per_rank[1..]
            .iter()
            .fold(first.clone(), |acc, set| &acc & set);
        Ok(common.last().map(|m| *m as f64 / 1000.0))
    }

    /// 删除某分区较旧的检查点，保留最近 `keep` 份。
    pub fn cleanup(&self, rank: u64) -> IoResult<()> {
        let entries = self.list(rank)?;
        if entries.len() <= self.keep {
            return Ok(());
        }
        let n_remove = entries.len() - self.keep;
        for (path, time_s) in entries.into_iter().take(n_remove) {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to remove stale checkpoint"
                );
            } else {
                tracing::debug!(rank, time_s, "stale checkpoint removed");
            }
        }
        Ok(())
    }

    fn path_for(&self, rank: u64, time_s: f64) -> PathBuf {
        self.directory.join(format!(
            "{}_p{}_t{:012}.{}",
            self.run_label,
            rank,
            to_millis(time_s),
            CHECKPOINT_EXT
        ))
    }

    /// 遍历目录，返回本运行的 (路径, 分区号, 时间)。
    ///
    /// 头部读不出来的文件跳过，交由加载时报错。
    fn scan(&self) -> IoResult<Vec<(PathBuf, u64, f64)>> {
        let mut results = Vec::new();
        if !self.directory.exists() {
            return Ok(results);
        }
        let dir = std::fs::read_dir(&self.directory)
            .map_err(|e| IoError::file(&self.directory, e))?;
        let prefix = format!("{}_p", self.run_label);
        for entry in dir {
            let entry = entry.map_err(|e| IoError::file(&self.directory, e))?;
            let path = entry.path();
            let named_ours = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with(&prefix));
            let has_ext = path.extension().map_or(false, |ext| ext == CHECKPOINT_EXT);
            if !named_ours || !has_ext {
                continue;
            }
            if let Ok((rank, time_s)) = CheckpointRecord::read_header(&path) {
                results.push((path, rank, time_s));
            }
        }
        Ok(results)
    }
}

// ============================================================
// 测试
// ============================================================
