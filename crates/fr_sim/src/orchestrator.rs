// crates/fr_sim/src/orchestrator.rs
//! 运行编排。
//!
//! `run_scenario` 把一个情景包跑成产物：烧录地形、建网、切片、
//! 沿同步门演进、写流场时序与检查点，收尾时落诊断归纳并触发
//! 出图。阶段机为 INIT → MESH_BUILD → DISTRIBUTE →（RESTART）
//! → EVOLVE → FINALIZE，出错落入 FAILED，错误带着失败阶段向
//! 上冒。
//!
//! 演进途中三件事能让循环提前退出：推算流速触顶（失稳）、
//! 产物目录出现下车哨兵文件、进程内的下车标志被置位。下车的
//! 运行会补一份检查点再走，结局记 BAILED 且跳过收尾。

use crate::builder::build_domain;
use crate::callback::{CallbackSet, JournalCallback};
use crate::context::RunContext;
use crate::diagnostics::{
    implied_max_speed, journal_file_name, summary_file_name, DiagnosticsWriter,
    EnvironmentSection, FlowSection, ModelSection, PerformanceSection, RunSection, RunSummary,
    StabilitySection,
};
use crate::error::{SimError, SimResult};
use crate::phase::{compute_yieldstep, RunOutcome, RunPhase};
use crate::ranks::RankPool;
use fr_engine::{Frame, StepStats, UniformGridEngine};
use fr_foundation::defaults::{CHECKPOINT_EVERY_STEPS, FORMAT_VERSION, INSTABILITY_SPEED_MS};
use fr_foundation::MemoryMonitor;
use fr_geo::geometry::polar_angle;
use fr_geo::Polygon;
use fr_io::{series_path, CheckpointStore, SeriesWriter};
use fr_scenario::ScenarioPackage;
use fr_terrain::{burn_structures, ElevationModel};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use uuid::Uuid;

/// 下车哨兵文件名。把这个名字的空文件扔进产物目录，运行会在
/// 下一个同步门补好检查点后干净退出。
pub const BAIL_SENTINEL: &str = "bail";

/// 缺省分片数：可用核数，至多 4。
#[must_use]
pub fn default_ranks() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get().min(4))
}

/// 一次运行的参数。
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// 批次号，1 起计；大于 1 走检查点续算
    pub batch_number: u32,
    /// 指定恢复时刻（秒），缺省取全分片最晚的共同检查点
    pub checkpoint_time: Option<f64>,
    /// 分片数，会被网格行数夹住
    pub n_ranks: usize,
    /// 每多少个同步门写一次检查点，0 表示不写
    pub checkpoint_every: usize,
    /// 出图分辨率（米），缺省按最细加密区或配置分辨率
    pub post_resolution: Option<f64>,
    /// 进程内下车标志，信号钩子置位后运行在下一个同步门下车
    pub bail_flag: Option<Arc<AtomicBool>>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            batch_number: 1,
            checkpoint_time: None,
            n_ranks: default_ranks(),
            checkpoint_every: CHECKPOINT_EVERY_STEPS,
            post_resolution: None,
            bail_flag: None,
        }
    }
}

/// 一次运行的回执。
#[derive(Debug, Clone)]
pub struct RunReport {
    /// 运行标识
    pub run_label: String,
    /// 批次号
    pub batch_number: u32,
    /// 结局
    pub outcome: RunOutcome,
    /// 演进到的时刻（秒）
    pub sim_time_s: f64,
    /// 计划时长（秒）
    pub duration_s: f64,
    /// 内部步数
    pub total_steps: u64,
    /// 同步门数
    pub gates: usize,
    /// 归纳文件路径，下车时不写
    pub summary_path: Option<PathBuf>,
    /// 出图归纳，出图失败时为 `None`
    pub post: Option<fr_post::PostSummary>,
}

/// 演进循环收尾时带出来的东西。
struct EvolveEnd {
    outcome: RunOutcome,
    sim_time_s: f64,
    start_time_s: f64,
    gates: usize,
    total_steps: u64,
    bailed: bool,
    last_stats: StepStats,
    diagnostics_path: PathBuf,
}

/// 跑一个情景包。
///
/// 回调集合由调用方装好；编排方会自动追加一个写
/// `run_{batch}.log` 流水账的监听方。返回的错误带着失败时
/// 所处的阶段。
pub fn run_scenario(
    package: &ScenarioPackage,
    mut callbacks: CallbackSet,
    options: &RunOptions,
) -> SimResult<RunReport> {
    let duration = package.config().duration;
    let context = match &options.bail_flag {
        Some(flag) => {
            RunContext::with_bail_flag(package.run_label(), duration, Arc::clone(flag))
        }
        None => RunContext::new(package.run_label(), duration),
    };
    let journal_path = package
        .output_dir()
        .join(journal_file_name(options.batch_number));
    callbacks.push(Arc::new(JournalCallback::create(journal_path)?));

    match drive(package, &callbacks, options, &context) {
        Ok(report) => {
            context.set_phase(RunPhase::Complete);
            callbacks.status(&format!("COMPLETE {}", report.outcome));
            Ok(report)
        }
        Err(err) => {
            let err = err.in_phase(context.phase());
            context.set_phase(RunPhase::Failed);
            callbacks.status(&format!("FAILED {err}"));
            tracing::error!("{}: run failed: {}", context.run_label(), err);
            Err(err)
        }
    }
}

fn drive(
    package: &ScenarioPackage,
    callbacks: &CallbackSet,
    options: &RunOptions,
    context: &RunContext,
) -> SimResult<RunReport> {
    let config = package.config();
    let run_label = package.run_label();
    let output_dir = package.output_dir();
    let checkpoint_dir = package.checkpoint_dir();
    let duration = config.duration;
    let yieldstep = compute_yieldstep(duration);
    let batch = options.batch_number;
    let started_at = chrono::Local::now().to_rfc3339();

    // INIT: 地形先行，烧录构筑物再加载
    callbacks.status(&format!("INIT {run_label} batch {batch}"));
    callbacks.metric("duration_s", duration);
    callbacks.metric("yieldstep_s", yieldstep);
    let elevation = prepare_terrain(package, callbacks)?;

    // MESH_BUILD
    context.set_phase(RunPhase::MeshBuild);
    let spec = build_domain(package, elevation);
    let grid = UniformGridEngine::from_spec(&spec)?;
    let mesh = grid.mesh_summary();
    let geometry = grid.frame_geometry();
    let cfl = grid.cfl();
    callbacks.status(&format!("MESH_BUILD {mesh}"));
    callbacks.metric("active_cells", mesh.active_cells as f64);

    // DISTRIBUTE
    context.set_phase(RunPhase::Distribute);
    let n_ranks = options.n_ranks.clamp(1, mesh.ny);
    let pool = RankPool::spawn(grid.partition(n_ranks)?, &checkpoint_dir, &run_label)?;
    callbacks.status(&format!("DISTRIBUTE {n_ranks} ranks"));

    let series_file = series_path(&output_dir, &run_label);
    let evolved = (|| -> SimResult<EvolveEnd> {
        // RESTART: 两段式恢复，全员就位才继续
        let start_time = if batch > 1 {
            context.set_phase(RunPhase::Restart);
            let resume = match options.checkpoint_time {
                Some(t) => t,
                None => CheckpointStore::new(&checkpoint_dir, &run_label)
                    .latest_common_time(n_ranks)?
                    .ok_or_else(|| SimError::NoCheckpoint {
                        run_label: run_label.clone(),
                    })?,
            };
            pool.restore_all(resume)?;
            callbacks.status(&format!("RESTART from t={resume}s"));
            resume
        } else {
            0.0
        };
        context.set_sim_time(start_time);

        let mut series = if batch > 1 {
            SeriesWriter::resume(&series_file, &geometry, start_time)?
        } else {
            SeriesWriter::create(&series_file, &run_label, &geometry)?
        };

        // EVOLVE
        context.set_phase(RunPhase::Evolve);
        let mut diagnostics =
            DiagnosticsWriter::create(&output_dir, batch, &mesh, cfl, start_time)?;
        let mut memory = MemoryMonitor::new();
        let mut last_stats = StepStats::empty(start_time);
        let mut gates = 0usize;
        let mut unstable = false;
        let mut bailed = false;
        let mut t = start_time;

        if batch == 1 {
            // 起点帧，出图才有 t=0 的栅格
            let gate = pool.advance(0.0, false)?;
            series.append(&Frame::assemble(gate.slices))?;
            series.flush()?;
        }

        while t < duration {
            let target = (t + yieldstep).min(duration);
            gates += 1;
            let save_state = options.checkpoint_every > 0
                && (gates % options.checkpoint_every == 0 || target >= duration);
            let gate = pool.advance(target, save_state)?;
            t = gate.stats.time_s;
            context.set_sim_time(t);
            series.append(&Frame::assemble(gate.slices))?;
            series.flush()?;

            let sample = memory.sample();
            let mem_mb = sample.used_bytes as f64 / (1024.0 * 1024.0);
            let implied = diagnostics.record(&gate.stats, mem_mb)?;
            last_stats = gate.stats;

            callbacks.status(&format!("EVOLVE {:.0}%", context.progress() * 100.0));
            callbacks.metric("sim_time_s", t);
            callbacks.metric("volume_m3", gate.stats.volume_m3);
            callbacks.metric("max_depth_m", gate.stats.max_depth_m);
            callbacks.metric("implied_max_speed_ms", implied);
            if sample.pressure.is_elevated() {
                callbacks.status(&format!(
                    "MEMORY {} {:.0}% used",
                    sample.pressure,
                    sample.fraction * 100.0
                ));
            }

            if implied >= INSTABILITY_SPEED_MS {
                unstable = true;
                tracing::warn!(
                    "{}: implied speed {:.1} m/s exceeds {} m/s, stopping",
                    run_label,
                    implied,
                    INSTABILITY_SPEED_MS
                );
                callbacks.status(&format!("UNSTABLE implied speed {implied:.1} m/s at t={t}s"));
                break;
            }
            if context.bail_requested() || output_dir.join(BAIL_SENTINEL).exists() {
                bailed = true;
                // 本门没落检查点就原地补一份，下车必须接得上
                if gate.checkpoints.is_empty() {
                    pool.advance(t, true)?;
                }
                callbacks.status(&format!("BAILED at t={t}s"));
                break;
            }
        }

        Ok(EvolveEnd {
            outcome: RunOutcome::classify(t, duration, unstable, bailed),
            sim_time_s: t,
            start_time_s: start_time,
            gates,
            total_steps: diagnostics.total_steps(),
            bailed,
            last_stats,
            diagnostics_path: diagnostics.path().to_path_buf(),
        })
    })();

    let finished = pool.finish();
    let end = evolved?;
    finished?;

    // FINALIZE: 归纳与出图。下车的运行不收尾，等下一批次接着跑。
    let mut summary_path = None;
    let mut post = None;
    if end.outcome != RunOutcome::Bailed {
        context.set_phase(RunPhase::Finalize);
        let wall_s = context.elapsed_s();
        let evolved_s = end.sim_time_s - end.start_time_s;
        let summary = RunSummary {
            schema_version: FORMAT_VERSION.to_string(),
            run: RunSection {
                label: run_label.clone(),
                batch,
                uuid: Uuid::new_v4(),
                outcome: end.outcome,
                started_at,
                finished_at: chrono::Local::now().to_rfc3339(),
                wall_time_s: wall_s,
            },
            model: ModelSection {
                model_start: config
                    .model_start
                    .map_or_else(|| "1970-01-01T00:00:00+00:00".to_string(), |t| t.to_rfc3339()),
                duration_s: duration,
                yieldstep_s: yieldstep,
                n_ranks,
                checkpoint_every: options.checkpoint_every,
                cfl,
            },
            mesh: mesh.clone(),
            performance: PerformanceSection {
                total_steps: end.total_steps,
                gates: end.gates,
                mean_dt_ms: if end.total_steps > 0 {
                    evolved_s * 1000.0 / end.total_steps as f64
                } else {
                    0.0
                },
                steps_per_wall_second: if wall_s > 0.0 {
                    end.total_steps as f64 / wall_s
                } else {
                    0.0
                },
            },
            flow: FlowSection {
                final_volume_m3: end.last_stats.volume_m3,
                max_depth_m: end.last_stats.max_depth_m,
                max_speed_ms: end.last_stats.max_speed_ms,
                peak_speed_direction_rad: polar_angle(
                    end.last_stats.peak_speed_x,
                    end.last_stats.peak_speed_y,
                ),
                wet_fraction: end.last_stats.wet_fraction,
            },
            stability: StabilitySection {
                implied_max_speed_ms: implied_max_speed(cfl, &end.last_stats),
                instability_threshold_ms: INSTABILITY_SPEED_MS,
                bailed: end.bailed,
            },
            environment: EnvironmentSection::capture(),
        };
        let path = output_dir.join(summary_file_name(batch));
        summary.write(&path)?;
        callbacks.announce_file("summary", &path)?;
        callbacks.announce_file("diagnostics", &end.diagnostics_path)?;
        callbacks.announce_file("flow_series", &series_file)?;
        summary_path = Some(path);

        // 出图失败不拖垮运行，时序和归纳已经在手
        match fr_post::post_process(package, options.post_resolution) {
            Ok(products) => {
                for quantity in fr_post::Quantity::ALL {
                    let name = format!("{run_label}_{quantity}_max.{}", fr_post::RASTER_EXT);
                    let raster = output_dir.join(name);
                    if raster.exists() {
                        callbacks.announce_file("raster_max", &raster)?;
                    }
                }
                post = Some(products);
            }
            Err(e) => {
                tracing::warn!("{}: post-processing failed: {}", run_label, e);
                callbacks.status(&format!("FINALIZE post-processing failed: {e}"));
            }
        }
    }

    Ok(RunReport {
        run_label,
        batch_number: batch,
        outcome: end.outcome,
        sim_time_s: end.sim_time_s,
        duration_s: duration,
        total_steps: end.total_steps,
        gates: end.gates,
        summary_path,
        post,
    })
}

/// 烧录构筑物并加载地形模型。没有地形栅格时当平地跑。
fn prepare_terrain(
    package: &ScenarioPackage,
    callbacks: &CallbackSet,
) -> SimResult<Option<ElevationModel>> {
    let Some(path) = package.elevation_path() else {
        tracing::info!("no terrain raster, running on a flat bed");
        return Ok(None);
    };
    let shapes: Vec<Polygon> = package.elevation_shapes().into_iter().cloned().collect();
    if !shapes.is_empty() {
        let burned = burn_structures(&shapes, path, Some(package.config().epsg))?;
        if burned {
            callbacks.status(&format!(
                "INIT burned {} structure footprints into terrain",
                shapes.len()
            ));
        }
    }
    Ok(Some(ElevationModel::from_path(path)?))
}
