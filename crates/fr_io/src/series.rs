// crates/fr_io/src/series.rs

//! 流场时序文件的写入与流式读取。
//!
//! 一次运行产出一个 `{run_label}.fts`，头部记录网格点位与高程，
//! 其后按时间顺序追加帧。帧逐个带 CRC，续算时可以截掉损坏的
//! 尾部以及目标时刻之后的帧，在同一个文件上继续追加。
//!
//! # 文件格式 (v1)
//!
//! ```text
//! 头部:
//!   [魔数: 4 bytes] "FTS1"
//!   [版本: u32]
//!   [标签长度: u64]
//!   [标签: UTF-8 bytes]
//!   [点数: u64]
//!   [坐标: n * (x f64, y f64)]
//!   [高程: n * f64]
//!   [头部 CRC32: u32]
//! 每帧:
//!   [时间: f64]
//!   [stage: n * f64]
//!   [x 动量: n * f64]
//!   [y 动量: n * f64]
//!   [帧 CRC32: u32]
//! ```

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fr_engine::{Frame, FrameGeometry};
use fr_geo::Point2D;

use crate::crc::crc32;
use crate::error::{IoError, IoResult};

// ============================================================
// 常量
// ============================================================

/// 时序文件魔数
const SERIES_MAGIC: &[u8; 4] = b"FTS1";

/// 时序文件格式版本
const SERIES_VERSION: u32 = 1;

/// 时序文件扩展名
const SERIES_EXT: &str = "fts";

/// 续算时间比较容差 [s]
const RESUME_TIME_EPS: f64 = 1e-6;

/// 某次运行的时序文件路径。
#[must_use]
pub fn series_path(directory: &Path, run_label: &str) -> PathBuf {
    directory.join(format!("{run_label}.{SERIES_EXT}"))
}

/// 每帧字节数（含 CRC）。
#[inline]
fn frame_size(n_points: usize) -> usize {
    8 + 3 * n_points * 8 + 4
}

// ============================================================
// 头部
// ============================================================

struct SeriesHeader {
    run_label: String,
    points: Vec<Point2D>,
    elevation: Vec<f64>,
    /// 头部总字节数，帧从这里开始
    byte_len: u64,
}

impl SeriesHeader {
    fn encode(run_label: &str, geometry: &FrameGeometry) -> Vec<u8> {
        let n = geometry.points.len();
        let label = run_label.as_bytes();
        let mut data = Vec::with_capacity(4 + 4 + 8 + label.len() + 8 + 24 * n + 4);
        data.extend_from_slice(SERIES_MAGIC);
        data.extend_from_slice(&SERIES_VERSION.to_le_bytes());
        data.extend_from_slice(&(label.len() as u64).to_le_bytes());
        data.extend_from_slice(label);
        data.extend_from_slice(&(n as u64).to_le_bytes());
        for p in &geometry.points {
            data.extend_from_slice(&p.x.to_le_bytes());
            data.extend_from_slice(&p.y.to_le_bytes());
        }
        for z in &geometry.elevation {
            data.extend_from_slice(&z.to_le_bytes());
        }
        let crc = crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        data
    }

    /// 从文件头读出并校验，读完后流停在第一帧起点。
    fn decode(path: &Path, reader: &mut impl Read) -> IoResult<Self> {
        let mut acc = Vec::new();

        let magic = take(path, reader, &mut acc, 4)?;
        if magic != SERIES_MAGIC {
            return Err(IoError::BadMagic {
                path: path.to_path_buf(),
                expected: "FTS1",
            });
        }
        let version = u32::from_le_bytes(take(path, reader, &mut acc, 4)?.try_into().unwrap());
        if version != SERIES_VERSION {
            return Err(IoError::BadVersion {
                path: path.to_path_buf(),
                found: version,
                supported: SERIES_VERSION,
            });
        }

        let label_len =
            u64::from_le_bytes(take(path, reader, &mut acc, 8)?.try_into().unwrap()) as usize;
        let run_label = String::from_utf8(take(path, reader, &mut acc, label_len)?)
            .map_err(|_| IoError::CorruptHeader {
                path: path.to_path_buf(),
                reason: "标签不是合法 UTF-8".into(),
            })?;

        let n = u64::from_le_bytes(take(path, reader, &mut acc, 8)?.try_into().unwrap()) as usize;
        let coord_bytes = take(path, reader, &mut acc, 16 * n)?;
        let mut points = Vec::with_capacity(n);
        for i in 0..n {
            let x = f64::from_le_bytes(coord_bytes[16 * i..16 * i + 8].try_into().unwrap());
            let y = f64::from_le_bytes(coord_bytes[16 * i + 8..16 * i + 16].try_into().unwrap());
            points.push(Point2D::new(x, y));
        }
        let elev_bytes = take(path, reader, &mut acc, 8 * n)?;
        let mut elevation = Vec::with_capacity(n);
        for i in 0..n {
            elevation.push(f64::from_le_bytes(
                elev_bytes[8 * i..8 * i + 8].try_into().unwrap(),
            ));
        }

        let computed = crc32(&acc);
        let mut crc_buf = [0u8; 4];
        reader
            .read_exact(&mut crc_buf)
            .map_err(|e| header_read_error(path, e))?;
        let stored = u32::from_le_bytes(crc_buf);
        if stored != computed {
            return Err(IoError::CorruptHeader {
                path: path.to_path_buf(),
                reason: format!("校验和不符: 期望 {:08x}, 实际 {:08x}", stored, computed),
            });
        }

        let byte_len = (acc.len() + 4) as u64;
        Ok(Self {
            run_label,
            points,
            elevation,
            byte_len,
        })
    }
}

/// 读 `n` 字节，同时累积进 CRC 缓冲。
fn take(path: &Path, reader: &mut impl Read, acc: &mut Vec<u8>, n: usize) -> IoResult<Vec<u8>> {
    let mut buf = vec![0u8; n];
    reader
        .read_exact(&mut buf)
        .map_err(|e| header_read_error(path, e))?;
    acc.extend_from_slice(&buf);
    Ok(buf)
}

fn header_read_error(path: &Path, e: std::io::Error) -> IoError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        IoError::CorruptHeader {
            path: path.to_path_buf(),
            reason: "文件头不完整".into(),
        }
    } else {
        IoError::file(path, e)
    }
}

// ============================================================
// 写入端
// ============================================================

/// 时序文件写入端。
///
/// [`SeriesWriter::create`] 新建文件，[`SeriesWriter::resume`] 在
/// 续算时打开既有文件、截断目标时刻之后的帧后继续追加。
pub struct SeriesWriter {
    path: PathBuf,
    file: BufWriter<File>,
    n_points: usize,
    frames_written: usize,
}

impl SeriesWriter {
    /// 新建时序文件并写入头部。已存在的同名文件被覆盖。
    pub fn create(path: &Path, run_label: &str, geometry: &FrameGeometry) -> IoResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IoError::file(parent, e))?;
        }
        let file = File::create(path).map_err(|e| IoError::file(path, e))?;
        let mut writer = BufWriter::new(file);
        let header = SeriesHeader::encode(run_label, geometry);
        writer
            .write_all(&header)
            .and_then(|_| writer.flush())
            .map_err(|e| IoError::file(path, e))?;

        tracing::info!(
            path = %path.display(),
            n_points = geometry.points.len(),
            "flow series created"
        );
        Ok(Self {
            path: path.to_path_buf(),
            file: writer,
            n_points: geometry.points.len(),
            frames_written: 0,
        })
    }

    /// 打开既有文件续写。
    ///
    /// 校验点数与当前网格一致后，从头逐帧检查：时间不超过
    /// `resume_time` 且校验和正确的帧保留，其余连同损坏的尾部
    /// 一起截掉，之后的追加从截断点开始。
    pub fn resume(path: &Path, geometry: &FrameGeometry, resume_time: f64) -> IoResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| IoError::file(path, e))?;

        let header = {
            let mut reader = BufReader::new(&mut file);
            SeriesHeader::decode(path, &mut reader)?
        };
        if header.points.len() != geometry.points.len() {
            return Err(IoError::GeometryMismatch {
                path: path.to_path_buf(),
                found: header.points.len(),
                expected: geometry.points.len(),
            });
        }

        let n = header.points.len();
        let fsize = frame_size(n);
        let mut offset = header.byte_len;
        let mut kept = 0usize;
        let mut buf = vec![0u8; fsize];

        file.seek(SeekFrom::Start(offset))
            .map_err(|e| IoError::file(path, e))?;
        loop {
            match file.read_exact(&mut buf) {
                Ok(()) => {}
                // 尾部不足一帧，从这里截断
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(IoError::file(path, e)),
            }
            let stored = u32::from_le_bytes(buf[fsize - 4..].try_into().unwrap());
            if stored != crc32(&buf[..fsize - 4]) {
                break;
            }
            let time = f64::from_le_bytes(buf[..8].try_into().unwrap());
            if time > resume_time + RESUME_TIME_EPS {
                break;
            }
            offset += fsize as u64;
            kept += 1;
        }

        file.set_len(offset).map_err(|e| IoError::file(path, e))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| IoError::file(path, e))?;

        tracing::info!(
            path = %path.display(),
            kept,
            resume_time,
            "flow series resumed"
        );
        Ok(Self {
            path: path.to_path_buf(),
            file: BufWriter::new(file),
            n_points: n,
            frames_written: kept,
        })
    }

    /// 追加一帧。
    pub fn append(&mut self, frame: &Frame) -> IoResult<()> {
        if frame.len() != self.n_points {
            return Err(IoError::GeometryMismatch {
                path: self.path.clone(),
                found: frame.len(),
                expected: self.n_points,
            });
        }

        let mut data = Vec::with_capacity(frame_size(self.n_points));
        data.extend_from_slice(&frame.time_s.to_le_bytes());
        for v in frame
            .stage
            .iter()
            .chain(frame.xmom.iter())
            .chain(frame.ymom.iter())
        {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let crc = crc32(&data);
        self.file
            .write_all(&data)
            .and_then(|_| self.file.write_all(&crc.to_le_bytes()))
            .map_err(|e| IoError::file(&self.path, e))?;
        self.frames_written += 1;
        Ok(())
    }

    /// 把缓冲落盘。
    pub fn flush(&mut self) -> IoResult<()> {
        self.file.flush().map_err(|e| IoError::file(&self.path, e))
    }

    /// 迄今写入（含续算保留）的帧数。
    #[must_use]
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// 文件路径。
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ============================================================
// 读取端
// ============================================================

/// 时序文件流式读取端。
///
/// 逐帧读取，不把整个时序载入内存。
pub struct SeriesReader {
    path: PathBuf,
    file: BufReader<File>,
    header: SeriesHeader,
    next_index: usize,
}

impl SeriesReader {
    /// 打开文件并校验头部。
    pub fn open(path: &Path) -> IoResult<Self> {
        let file = File::open(path).map_err(|e| IoError::file(path, e))?;
        let mut reader = BufReader::new(file);
        let header = SeriesHeader::decode(path, &mut reader)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: reader,
            header,
            next_index: 0,
        })
    }

    /// 运行标签。
    #[must_use]
    pub fn run_label(&self) -> &str {
        &self.header.run_label
    }

    /// 网格点数。
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.header.points.len()
    }

    /// 网格点位。
    #[must_use]
    pub fn points(&self) -> &[Point2D] {
        &self.header.points
    }

    /// 点位高程。
    #[must_use]
    pub fn elevation(&self) -> &[f64] {
        &self.header.elevation
    }

    /// 头部几何的独立副本。
    #[must_use]
    pub fn frame_geometry(&self) -> FrameGeometry {
        FrameGeometry {
            points: self.header.points.clone(),
            elevation: self.header.elevation.clone(),
        }
    }

    /// 读下一帧。文件读完返回 `Ok(None)`。
    ///
    /// 帧校验失败或长度不足报 [`IoError::CorruptFrame`]。
    pub fn next_frame(&mut self) -> IoResult<Option<Frame>> {
        let n = self.header.points.len();
        let fsize = frame_size(n);
        let mut buf = vec![0u8; fsize];

        let mut filled = 0usize;
        while filled < fsize {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(got) => filled += got,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(IoError::file(&self.path, e)),
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        if filled < fsize {
            return Err(IoError::CorruptFrame {
                path: self.path.clone(),
                index: self.next_index,
            });
        }

        let stored = u32::from_le_bytes(buf[fsize - 4..].try_into().unwrap());
        if stored != crc32(&buf[..fsize - 4]) {
            return Err(IoError::CorruptFrame {
                path: self.path.clone(),
                index: self.next_index,
            });
        }

        let time_s = f64::from_le_bytes(buf[..8].try_into().unwrap());
        let read_block = |start: usize| -> Vec<f64> {
            (0..n)
                .map(|i| {
                    f64::from_le_bytes(buf[start + 8 * i..start + 8 * i + 8].try_into().unwrap())
                })
                .collect()
        };
        let stage = read_block(8);
        let xmom = read_block(8 + 8 * n);
        let ymom = read_block(8 + 16 * n);

        self.next_index += 1;
        Ok(Some(Frame {
            time_s,
            stage,
            xmom,
            ymom,
        }))
    }
}

// ============================================================
// 测试
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_geometry() -> FrameGeometry {
        FrameGeometry {
            points: vec![
                Point2D::new(321_002.5, 5_812_002.5),
                Point2D::new(321_007.5, 5_812_002.5),
                Point2D::new(321_002.5, 5_812_007.5),
            ],
            elevation: vec![10.0, 10.5, 11.0],
        }
    }

    fn frame(time_s: f64, base: f64) -> Frame {
        Frame {
            time_s,
            stage: vec![base, base + 0.1, base + 0.2],
            xmom: vec![0.01, 0.02, 0.03],
            ymom: vec![-0.01, 0.0, 0.01],
        }
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = series_path(dir.path(), "run_1_1_1");

        let geom = test_geometry();
        let mut writer = SeriesWriter::create(&path, "run_1_1_1", &geom).unwrap();
        writer.append(&frame(60.0, 10.2)).unwrap();
        writer.append(&frame(120.0, 10.4)).unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.frames_written(), 2);

        let mut reader = SeriesReader::open(&path).unwrap();
        assert_eq!(reader.run_label(), "run_1_1_1");
        assert_eq!(reader.n_points(), 3);
        assert!((reader.points()[1].x - 321_007.5).abs() < 1e-9);
        assert!((reader.elevation()[2] - 11.0).abs() < 1e-12);

        let f1 = reader.next_frame().unwrap().unwrap();
        assert!((f1.time_s - 60.0).abs() < 1e-12);
        assert!((f1.stage[2] - 10.4).abs() < 1e-12);
        let f2 = reader.next_frame().unwrap().unwrap();
        assert!((f2.time_s - 120.0).abs() < 1e-12);
        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_append_rejects_wrong_point_count() {
        let dir = tempdir().unwrap();
        let path = series_path(dir.path(), "run_1_1_1");
        let mut writer = SeriesWriter::create(&path, "run_1_1_1", &test_geometry()).unwrap();

        let short = Frame {
            time_s: 60.0,
            stage: vec![10.0, 10.1],
            xmom: vec![0.0, 0.0],
            ymom: vec![0.0, 0.0],
        };
        assert!(matches!(
            writer.append(&short),
            Err(IoError::GeometryMismatch {
                found: 2,
                expected: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_corrupt_frame_detected() {
        let dir = tempdir().unwrap();
        let path = series_path(dir.path(), "run_1_1_1");
        let geom = test_geometry();
        let mut writer = SeriesWriter::create(&path, "run_1_1_1", &geom).unwrap();
        for t in [60.0, 120.0, 180.0] {
            writer.append(&frame(t, 10.0)).unwrap();
        }
        writer.flush().unwrap();

        let header_len = SeriesHeader::encode("run_1_1_1", &geom).len() as u64;
        let fsize = frame_size(3) as u64;

        // 破坏第二帧中部
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[(header_len + fsize + 20) as usize] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        let mut reader = SeriesReader::open(&path).unwrap();
        assert!(reader.next_frame().unwrap().is_some());
        assert!(matches!(
            reader.next_frame(),
            Err(IoError::CorruptFrame { index: 1, .. })
        ));
    }

    #[test]
    fn test_resume_truncates_later_frames() {
        let dir = tempdir().unwrap();
        let path = series_path(dir.path(), "run_1_1_1");
        let geom = test_geometry();

        let mut writer = SeriesWriter::create(&path, "run_1_1_1", &geom).unwrap();
        for t in [60.0, 120.0, 180.0, 240.0] {
            writer.append(&frame(t, 10.0)).unwrap();
        }
        writer.flush().unwrap();
        drop(writer);

        // 从 120 s 续算，写出不同的 180 s 帧
        let mut writer = SeriesWriter::resume(&path, &geom, 120.0).unwrap();
        assert_eq!(writer.frames_written(), 2);
        writer.append(&frame(180.0, 99.0)).unwrap();
        writer.flush().unwrap();
        drop(writer);

        let mut reader = SeriesReader::open(&path).unwrap();
        let mut times = Vec::new();
        let mut last_stage0 = 0.0;
        while let Some(f) = reader.next_frame().unwrap() {
            times.push(f.time_s);
            last_stage0 = f.stage[0];
        }
        assert_eq!(times, vec![60.0, 120.0, 180.0]);
        assert!((last_stage0 - 99.0).abs() < 1e-12);
    }

    #[test]
    fn test_resume_drops_corrupt_tail() {
        let dir = tempdir().unwrap();
        let path = series_path(dir.path(), "run_1_1_1");
        let geom = test_geometry();

        let mut writer = SeriesWriter::create(&path, "run_1_1_1", &geom).unwrap();
        for t in [60.0, 120.0, 180.0] {
            writer.append(&frame(t, 10.0)).unwrap();
        }
        writer.flush().unwrap();
        drop(writer);

        // 模拟崩溃：第三帧只写了一半
        let header_len = SeriesHeader::encode("run_1_1_1", &geom).len() as u64;
        let fsize = frame_size(3) as u64;
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(header_len + 2 * fsize + 7).unwrap();
        drop(file);

        let writer = SeriesWriter::resume(&path, &geom, 1e9).unwrap();
        assert_eq!(writer.frames_written(), 2);
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            header_len + 2 * fsize
        );
    }

    #[test]
    fn test_resume_rejects_other_geometry() {
        let dir = tempdir().unwrap();
        let path = series_path(dir.path(), "run_1_1_1");
        let mut writer = SeriesWriter::create(&path, "run_1_1_1", &test_geometry()).unwrap();
        writer.append(&frame(60.0, 10.0)).unwrap();
        writer.flush().unwrap();
        drop(writer);

        let bigger = FrameGeometry {
            points: vec![Point2D::ZERO; 4],
            elevation: vec![0.0; 4],
        };
        assert!(matches!(
            SeriesWriter::resume(&path, &bigger, 60.0),
            Err(IoError::GeometryMismatch {
                found: 3,
                expected: 4,
                ..
            })
        ));
    }

    #[test]
    fn test_open_rejects_foreign_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("noise.fts");
        std::fs::write(&path, b"definitely not a flow series").unwrap();

        assert!(matches!(
            SeriesReader::open(&path),
            Err(IoError::BadMagic {
                expected: "FTS1",
                ..
            })
        ));
    }

    #[test]
    fn test_header_corruption_detected() {
        let dir = tempdir().unwrap();
        let path = series_path(dir.path(), "run_1_1_1");
        let writer = SeriesWriter::create(&path, "run_1_1_1", &test_geometry()).unwrap();
        drop(writer);

        // 破坏高程区的一个字节
        let mut bytes = std::fs::read(&path).unwrap();
        let n = bytes.len();
        bytes[n - 10] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            SeriesReader::open(&path),
            Err(IoError::CorruptHeader { .. })
        ));
    }
}
