// crates/fr_sim/src/diagnostics.rs
//! 诊断产物。
//!
//! 每个同步门在 `run_diagnostics_{batch}.csv` 追加一行快照，
//! 收尾时把整次运行归纳成 `run_summary_{batch}.json`。CSV 首行
//! 是网格摘要注释，方便单看文件就知道跑的是什么网。

use crate::error::{SimError, SimResult};
use crate::phase::RunOutcome;
use fr_engine::{MeshSummary, StepStats};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use uuid::Uuid;

/// 逐门诊断的列名，写进 CSV 表头。
pub const DIAGNOSTIC_COLUMNS: [&str; 14] = [
    "sim_time_s",
    "wall_time_s",
    "n_steps",
    "mean_dt_ms",
    "last_dt_ms",
    "implied_max_speed_ms",
    "wet_cells",
    "wet_fraction",
    "volume_m3",
    "max_depth_m",
    "max_speed_ms",
    "peak_speed_x",
    "peak_speed_y",
    "mem_mb",
];

/// 逐门诊断文件名。
#[must_use]
pub fn diagnostics_file_name(batch_number: u32) -> String {
    format!("run_diagnostics_{batch_number}.csv")
}

/// 运行归纳文件名。
#[must_use]
pub fn summary_file_name(batch_number: u32) -> String {
    format!("run_summary_{batch_number}.json")
}

/// 运行流水账文件名。
#[must_use]
pub fn journal_file_name(batch_number: u32) -> String {
    format!("run_{batch_number}.log")
}

/// 由 CFL 条件反推的流速上界（m/s）。
///
/// 时间步长受 `dt = cfl * r / v` 约束，拿最小湿单元内切圆半径
/// 和最后一个步长反解 `v`。步长塌缩时这个值先于数值爆炸抬头，
/// 是失稳的前哨指标。没有湿单元或还没走步时为 0。
#[must_use]
pub fn implied_max_speed(cfl: f64, stats: &StepStats) -> f64 {
    if stats.wet_cells == 0 || stats.last_dt_s <= 0.0 {
        return 0.0;
    }
    cfl * stats.min_wet_inradius_m / stats.last_dt_s
}

// ============================================================
// 逐门 CSV
// ============================================================

/// 逐门诊断写手。
pub struct DiagnosticsWriter {
    path: PathBuf,
    sink: BufWriter<File>,
    cfl: f64,
    origin_time_s: f64,
    total_steps: u64,
    rows: usize,
    started: Instant,
}

impl DiagnosticsWriter {
    /// 新建诊断文件并写入网格摘要注释与表头。
    ///
    /// `origin_time_s` 是本批次的起算时刻，续算批次从检查点
    /// 时刻起算，平均步长才不会被早先批次摊稀。
    pub fn create(
        output_dir: &Path,
        batch_number: u32,
        mesh: &MeshSummary,
        cfl: f64,
        origin_time_s: f64,
    ) -> SimResult<Self> {
        let path = output_dir.join(diagnostics_file_name(batch_number));
        let file = File::create(&path).map_err(|source| SimError::Diagnostics {
            path: path.clone(),
            source,
        })?;
        let mut sink = BufWriter::new(file);
        writeln!(sink, "# {mesh}")
            .and_then(|()| writeln!(sink, "{}", DIAGNOSTIC_COLUMNS.join(",")))
            .map_err(|source| SimError::Diagnostics {
                path: path.clone(),
                source,
            })?;
        tracing::debug!("diagnostics csv created at {}", path.display());
        Ok(Self {
            path,
            sink,
            cfl,
            origin_time_s,
            total_steps: 0,
            rows: 0,
            started: Instant::now(),
        })
    }

    /// 追加一个同步门的快照，返回推算流速供失稳判定。
    pub fn record(&mut self, stats: &StepStats, mem_mb: f64) -> SimResult<f64> {
        self.total_steps += stats.n_internal_steps;
        let implied = implied_max_speed(self.cfl, stats);
        let wall_s = self.started.elapsed().as_secs_f64();
        let mean_dt_ms = if self.total_steps > 0 {
            (stats.time_s - self.origin_time_s) * 1000.0 / self.total_steps as f64
        } else {
            0.0
        };
        writeln!(
            self.sink,
            "{:.3},{:.3},{},{:.3},{:.3},{:.3},{},{:.4},{:.3},{:.3},{:.3},{:.3},{:.3},{:.1}",
            stats.time_s,
            wall_s,
            self.total_steps,
            mean_dt_ms,
            stats.last_dt_s * 1000.0,
            implied,
            stats.wet_cells,
            stats.wet_fraction,
            stats.volume_m3,
            stats.max_depth_m,
            stats.max_speed_ms,
            stats.peak_speed_x,
            stats.peak_speed_y,
            mem_mb,
        )
        .and_then(|()| self.sink.flush())
        .map_err(|source| SimError::Diagnostics {
            path: self.path.clone(),
            source,
        })?;
        self.rows += 1;
        Ok(implied)
    }

    /// 诊断文件路径。
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 已写行数。
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// 累计内部步数。
    #[must_use]
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }
}

// ============================================================
// 运行归纳
// ============================================================

/// 运行身份与起止。
#[derive(Debug, Clone, Serialize)]
pub struct RunSection {
    /// 运行标识
    pub label: String,
    /// 批次号
    pub batch: u32,
    /// 本批次的随机标识
    pub uuid: Uuid,
    /// 结局
    pub outcome: RunOutcome,
    /// 起跑时刻，本地时区
    pub started_at: String,
    /// 收尾时刻
    pub finished_at: String,
    /// 墙钟耗时（秒）
    pub wall_time_s: f64,
}

/// 模型参数。
#[derive(Debug, Clone, Serialize)]
pub struct ModelSection {
    /// 模型起算时刻，ISO-8601；情景未给时按纪元零点
    pub model_start: String,
    /// 计划时长（秒）
    pub duration_s: f64,
    /// 同步门间隔（秒）
    pub yieldstep_s: f64,
    /// 分片数
    pub n_ranks: usize,
    /// 检查点间隔（门数）
    pub checkpoint_every: usize,
    /// CFL 数
    pub cfl: f64,
}

/// 吞吐指标。
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSection {
    /// 内部步数
    pub total_steps: u64,
    /// 同步门数
    pub gates: usize,
    /// 平均步长（毫秒）
    pub mean_dt_ms: f64,
    /// 每墙钟秒走的内部步数
    pub steps_per_wall_second: f64,
}

/// 流场终态。
#[derive(Debug, Clone, Serialize)]
pub struct FlowSection {
    /// 末门存水体积（m³）
    pub final_volume_m3: f64,
    /// 末门最大水深（米）
    pub max_depth_m: f64,
    /// 末门最大流速（m/s）
    pub max_speed_ms: f64,
    /// 峰值流速方向（弧度，x 正向起逆时针）
    pub peak_speed_direction_rad: f64,
    /// 末门湿单元占比
    pub wet_fraction: f64,
}

/// 稳定性指标。
#[derive(Debug, Clone, Serialize)]
pub struct StabilitySection {
    /// 末门推算流速（m/s）
    pub implied_max_speed_ms: f64,
    /// 失稳阈值（m/s）
    pub instability_threshold_ms: f64,
    /// 是否被请求下车
    pub bailed: bool,
}

/// 跑在哪台机器上。
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentSection {
    /// 主机名
    pub hostname: String,
    /// 操作系统
    pub os: String,
    /// 可用核数
    pub cpu_count: usize,
    /// 总内存（MiB）
    pub total_memory_mb: u64,
}

impl EnvironmentSection {
    /// 采集当前机器信息。
    #[must_use]
    pub fn capture() -> Self {
        let mut system = sysinfo::System::new();
        system.refresh_memory();
        Self {
            hostname: sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_string()),
            os: sysinfo::System::long_os_version().unwrap_or_else(|| "unknown".to_string()),
            cpu_count: std::thread::available_parallelism().map_or(1, |n| n.get()),
            total_memory_mb: system.total_memory() / (1024 * 1024),
        }
    }
}

/// 一次运行的全量归纳，落成 JSON。
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// 归纳格式版本
    pub schema_version: String,
    /// 运行身份
    pub run: RunSection,
    /// 模型参数
    pub model: ModelSection,
    /// 网格摘要
    pub mesh: MeshSummary,
    /// 吞吐指标
    pub performance: PerformanceSection,
    /// 流场终态
    pub flow: FlowSection,
    /// 稳定性指标
    pub stability: StabilitySection,
    /// 运行环境
    pub environment: EnvironmentSection,
}

impl RunSummary {
    /// 写成带缩进的 JSON。
    pub fn write(&self, path: &Path) -> SimResult<()> {
        let file = File::create(path).map_err(|source| SimError::Diagnostics {
            path: path.to_path_buf(),
            source,
        })?;
        let mut sink = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut sink, self)
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(sink))
            .and_then(|()| sink.flush())
            .map_err(|source| SimError::Diagnostics {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!("run summary written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fr_foundation::defaults::{FORMAT_VERSION, INSTABILITY_SPEED_MS};
    use fr_geo::geometry::polar_angle;

    fn mesh() -> MeshSummary {
        MeshSummary {
            nx: 20,
            ny: 20,
            cell_size_m: 5.0,
            active_cells: 400,
            hole_cells: 0,
            region_count: 0,
        }
    }

    fn stats(time_s: f64, steps: u64) -> StepStats {
        StepStats {
            time_s,
            n_internal_steps: steps,
            last_dt_s: 0.5,
            active_cells: 400,
            wet_cells: 120,
            wet_fraction: 0.3,
            volume_m3: 321.0,
            max_depth_m: 0.8,
            max_speed_ms: 1.6,
            peak_speed_x: 1.2,
            peak_speed_y: -0.9,
            min_wet_inradius_m: 2.5,
        }
    }

    #[test]
    fn test_implied_speed_from_cfl() {
        let s = stats(60.0, 100);
        assert!((implied_max_speed(0.9, &s) - 4.5).abs() < 1.0e-12);

        let mut dry = s;
        dry.wet_cells = 0;
        assert_eq!(implied_max_speed(0.9, &dry), 0.0);

        let mut stalled = s;
        stalled.last_dt_s = 0.0;
        assert_eq!(implied_max_speed(0.9, &stalled), 0.0);
    }

    #[test]
    fn test_csv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = DiagnosticsWriter::create(dir.path(), 1, &mesh(), 0.9, 0.0).unwrap();
        writer.record(&stats(60.0, 100), 512.0).unwrap();
        writer.record(&stats(120.0, 100), 513.0).unwrap();
        assert_eq!(writer.rows(), 2);
        assert_eq!(writer.total_steps(), 200);

        let text = std::fs::read_to_string(dir.path().join("run_diagnostics_1.csv")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "# uniform grid 20x20 @ 5 m, 400 active cells, 0 hole cells, 0 regions");
        assert_eq!(lines[1], DIAGNOSTIC_COLUMNS.join(","));
        for row in &lines[2..] {
            assert_eq!(row.split(',').count(), 14);
        }
        // 平均步长跨门累计: 120 s / 200 步 = 600 ms
        let fields: Vec<&str> = lines[3].split(',').collect();
        assert_eq!(fields[0], "120.000");
        assert_eq!(fields[3], "600.000");
        assert_eq!(fields[5], "4.500");
    }

    #[test]
    fn test_mean_dt_respects_resume_origin() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = DiagnosticsWriter::create(dir.path(), 2, &mesh(), 0.9, 600.0).unwrap();
        writer.record(&stats(660.0, 120), 512.0).unwrap();
        let text = std::fs::read_to_string(dir.path().join("run_diagnostics_2.csv")).unwrap();
        let row = text.lines().nth(2).unwrap();
        let fields: Vec<&str> = row.split(',').collect();
        // (660 - 600) s / 120 步 = 500 ms
        assert_eq!(fields[3], "500.000");
    }

    #[test]
    fn test_summary_round_trips_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_summary_1.json");
        let summary = RunSummary {
            schema_version: FORMAT_VERSION.to_string(),
            run: RunSection {
                label: "run_7_3_0".to_string(),
                batch: 1,
                uuid: Uuid::new_v4(),
                outcome: RunOutcome::Completed,
                started_at: "2026-08-25T10:00:00+10:00".to_string(),
                finished_at: "2026-08-25T10:05:00+10:00".to_string(),
                wall_time_s: 300.0,
            },
            model: ModelSection {
                model_start: "2024-01-01T00:00:00+00:00".to_string(),
                duration_s: 3_600.0,
                yieldstep_s: 60.0,
                n_ranks: 2,
                checkpoint_every: 1,
                cfl: 0.9,
            },
            mesh: mesh(),
            performance: PerformanceSection {
                total_steps: 7_200,
                gates: 60,
                mean_dt_ms: 500.0,
                steps_per_wall_second: 24.0,
            },
            flow: FlowSection {
                final_volume_m3: 321.0,
                max_depth_m: 0.8,
                max_speed_ms: 1.6,
                peak_speed_direction_rad: polar_angle(1.2, -0.9),
                wet_fraction: 0.3,
            },
            stability: StabilitySection {
                implied_max_speed_ms: 4.5,
                instability_threshold_ms: INSTABILITY_SPEED_MS,
                bailed: false,
            },
            environment: EnvironmentSection::capture(),
        };
        summary.write(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["schema_version"], "1.0");
        assert_eq!(value["run"]["outcome"], "Completed");
        assert_eq!(value["model"]["model_start"], "2024-01-01T00:00:00+00:00");
        assert_eq!(value["mesh"]["active_cells"], 400);
        assert_eq!(value["stability"]["instability_threshold_ms"], 20.0);
        // 第四象限方向折回 [3π/2, 2π)
        let dir_rad = value["flow"]["peak_speed_direction_rad"].as_f64().unwrap();
        assert!(dir_rad > 4.71 && dir_rad < 6.29);
    }

    #[test]
    fn test_product_file_names() {
        assert_eq!(diagnostics_file_name(1), "run_diagnostics_1.csv");
        assert_eq!(summary_file_name(3), "run_summary_3.json");
        assert_eq!(journal_file_name(2), "run_2.log");
    }
}
