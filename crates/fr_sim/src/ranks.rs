// crates/fr_sim/src/ranks.rs
//! 分片线程池。
//!
//! 每个分片跑在自己的线程里，领队经专属指令通道下发动作，
//! 分片经共享报告通道回话。通道即同步门：领队收齐全部报告
//! 才进入下一步，任何分片失败都放弃整门。
//!
//! 检查点恢复走两段式：各分片先各自有限重试加载，把结果报
//! 给领队；领队收齐后全员成功才放行，有一家耗尽重试就整体
//! 中止，不会出现半边恢复半边从头跑的缝合状态。

use crate::error::{SimError, SimResult};
use fr_engine::{FrameSlice, HaloData, RankEngine, StepStats};
use fr_foundation::defaults::{RESTORE_RETRY_DELAY_MS, RESTORE_RETRY_LIMIT};
use fr_io::CheckpointStore;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Duration;
use std::{sync::mpsc, thread};

// ============================================================
// 报文
// ============================================================

/// 领队发给分片的指令。
#[derive(Debug, Clone)]
enum Directive {
    /// 恢复指定时刻的检查点
    Restore {
        time_s: f64,
        attempts: usize,
        delay_ms: u64,
    },
    /// 演进到目标时刻，按需落状态
    Advance { target_s: f64, save_state: bool },
    /// 注入邻带带缘水深
    Halo {
        below: Option<HaloData>,
        above: Option<HaloData>,
    },
    /// 收工
    Finish,
}

/// 一个分片完成演进后的回话内容。
#[derive(Debug)]
struct AdvanceReport {
    rank: usize,
    stats: StepStats,
    halo: HaloData,
    slice: FrameSlice,
    checkpoint: Option<PathBuf>,
}

/// 分片发回领队的报告。
#[derive(Debug)]
enum Report {
    /// 恢复成功，附当前带缘供领队刷新邻带
    Restored { rank: usize, halo: HaloData },
    /// 恢复重试耗尽
    RestoreFailed {
        rank: usize,
        attempts: usize,
        reason: String,
    },
    /// 演进完成
    Advanced(AdvanceReport),
    /// 演进或落盘失败
    Failed { rank: usize, reason: String },
}

// ============================================================
// 分片线程
// ============================================================

fn restore(
    engine: &mut dyn RankEngine,
    store: &CheckpointStore,
    time_s: f64,
    attempts: usize,
    delay_ms: u64,
) -> Report {
    let rank = engine.rank();
    let mut last_reason = String::new();
    for attempt in 1..=attempts {
        let outcome = store
            .load(rank as u64, time_s)
            .map_err(|e| e.to_string())
            .and_then(|record| engine.restore_state(&record.payload).map_err(|e| e.to_string()));
        match outcome {
            Ok(()) => {
                tracing::info!("rank {} restored checkpoint at t={}s", rank, time_s);
                return Report::Restored {
                    rank,
                    halo: engine.halo_out(),
                };
            }
            Err(reason) => {
                tracing::warn!(
                    "rank {} restore attempt {}/{} failed: {}",
                    rank,
                    attempt,
                    attempts,
                    reason
                );
                last_reason = reason;
                if attempt < attempts {
                    thread::sleep(Duration::from_millis(delay_ms));
                }
            }
        }
    }
    Report::RestoreFailed {
        rank,
        attempts,
        reason: last_reason,
    }
}

fn advance(
    engine: &mut dyn RankEngine,
    store: &CheckpointStore,
    target_s: f64,
    save_state: bool,
) -> Report {
    let rank = engine.rank();
    let stats = match engine.evolve_to(target_s) {
        Ok(stats) => stats,
        Err(e) => {
            return Report::Failed {
                rank,
                reason: e.to_string(),
            }
        }
    };
    let checkpoint = if save_state {
        match store.save(rank as u64, engine.time(), &engine.state_bytes()) {
            Ok(path) => Some(path),
            Err(e) => {
                return Report::Failed {
                    rank,
                    reason: format!("检查点写出失败: {e}"),
                }
            }
        }
    } else {
        None
    };
    Report::Advanced(AdvanceReport {
        rank,
        stats,
        halo: engine.halo_out(),
        slice: engine.frame_slice(),
        checkpoint,
    })
}

fn rank_worker(
    mut engine: Box<dyn RankEngine>,
    store: CheckpointStore,
    directives: Receiver<Directive>,
    reports: Sender<Report>,
) {
    let rank = engine.rank();
    while let Ok(directive) = directives.recv() {
        let report = match directive {
            Directive::Restore {
                time_s,
                attempts,
                delay_ms,
            } => restore(engine.as_mut(), &store, time_s, attempts, delay_ms),
            Directive::Advance {
                target_s,
                save_state,
            } => advance(engine.as_mut(), &store, target_s, save_state),
            Directive::Halo { below, above } => {
                engine.halo_in(below.as_ref(), above.as_ref());
                continue;
            }
            Directive::Finish => break,
        };
        if reports.send(report).is_err() {
            break;
        }
    }
    tracing::debug!("rank {} worker exits", rank);
}

// ============================================================
// 领队侧
// ============================================================

/// 一个同步门收拢的结果。
#[derive(Debug)]
pub struct Gate {
    /// 全分片合并后的统计
    pub stats: StepStats,
    /// 各分片量值切片
    pub slices: Vec<FrameSlice>,
    /// 本门写出的检查点文件
    pub checkpoints: Vec<PathBuf>,
}

/// 分片线程池的领队句柄。
pub struct RankPool {
    directives: Vec<Sender<Directive>>,
    reports: Receiver<Report>,
    workers: Vec<JoinHandle<()>>,
}

impl RankPool {
    /// 为每个分片起一个线程。
    pub fn spawn(
        engines: Vec<Box<dyn RankEngine>>,
        checkpoint_dir: &Path,
        run_label: &str,
    ) -> SimResult<Self> {
        let (report_tx, report_rx) = mpsc::channel();
        let mut directives = Vec::with_capacity(engines.len());
        let mut workers = Vec::with_capacity(engines.len());
        for engine in engines {
            let rank = engine.rank();
            let (tx, rx) = mpsc::channel();
            let store = CheckpointStore::new(checkpoint_dir, run_label);
            let reports = report_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("rank-{rank}"))
                .spawn(move || rank_worker(engine, store, rx, reports))
                .map_err(|source| SimError::Spawn { rank, source })?;
            directives.push(tx);
            workers.push(handle);
        }
        tracing::info!("{} rank workers spawned", directives.len());
        Ok(Self {
            directives,
            reports: report_rx,
            workers,
        })
    }

    /// 分片数。
    #[must_use]
    pub fn n_ranks(&self) -> usize {
        self.directives.len()
    }

    fn send(&self, rank: usize, directive: Directive) -> SimResult<()> {
        self.directives[rank]
            .send(directive)
            .map_err(|_| SimError::RankLost { rank })
    }

    fn collect(&self) -> SimResult<Vec<Report>> {
        let n = self.n_ranks();
        let mut reports = Vec::with_capacity(n);
        for _ in 0..n {
            reports.push(self.reports.recv().map_err(|_| SimError::PoolClosed)?);
        }
        Ok(reports)
    }

    /// 把邻带带缘发给每个分片。端部分片缺的一侧发 `None`。
    fn exchange_halos(&self, halos: Vec<Option<HaloData>>) -> SimResult<()> {
        if self.n_ranks() < 2 {
            return Ok(());
        }
        for rank in 0..self.n_ranks() {
            let below = rank.checked_sub(1).and_then(|r| halos[r].clone());
            let above = halos.get(rank + 1).cloned().flatten();
            self.send(rank, Directive::Halo { below, above })?;
        }
        Ok(())
    }

    /// 全员恢复到同一检查点时刻，按默认重试参数。
    pub fn restore_all(&self, time_s: f64) -> SimResult<()> {
        self.restore_all_with(time_s, RESTORE_RETRY_LIMIT, RESTORE_RETRY_DELAY_MS)
    }

    /// 全员恢复，重试次数与间隔由调用方给定。
    ///
    /// 两段式过闸：先收齐每个分片的恢复结果，有失败就整体
    /// 返回错误；全员成功后再互换带缘，恢复出的状态才能无缝
    /// 接着演进。
    pub fn restore_all_with(
        &self,
        time_s: f64,
        attempts: usize,
        delay_ms: u64,
    ) -> SimResult<()> {
        for rank in 0..self.n_ranks() {
            self.send(
                rank,
                Directive::Restore {
                    time_s,
                    attempts,
                    delay_ms,
                },
            )?;
        }
        let mut halos: Vec<Option<HaloData>> = vec![None; self.n_ranks()];
        let mut failure: Option<SimError> = None;
        for report in self.collect()? {
            match report {
                Report::Restored { rank, halo } => halos[rank] = Some(halo),
                Report::RestoreFailed {
                    rank,
                    attempts,
                    reason,
                } => {
                    failure.get_or_insert(SimError::Restore {
                        rank,
                        time_s,
                        attempts,
                        reason,
                    });
                }
                Report::Advanced(a) => {
                    failure.get_or_insert(SimError::Rank {
                        rank: a.rank,
                        reason: "恢复期间收到演进报告".to_string(),
                    });
                }
                Report::Failed { rank, reason } => {
                    failure.get_or_insert(SimError::Rank { rank, reason });
                }
            }
        }
        if let Some(err) = failure {
            return Err(err);
        }
        self.exchange_halos(halos)?;
        tracing::info!(
            "{} ranks restored to t={}s and halos refreshed",
            self.n_ranks(),
            time_s
        );
        Ok(())
    }

    /// 驱动全员演进到目标时刻，收拢统计、切片与检查点，并在
    /// 返回前完成带缘互换。
    pub fn advance(&self, target_s: f64, save_state: bool) -> SimResult<Gate> {
        for rank in 0..self.n_ranks() {
            self.send(
                rank,
                Directive::Advance {
                    target_s,
                    save_state,
                },
            )?;
        }
        let mut parts = Vec::with_capacity(self.n_ranks());
        let mut slices = Vec::with_capacity(self.n_ranks());
        let mut checkpoints = Vec::new();
        let mut halos: Vec<Option<HaloData>> = vec![None; self.n_ranks()];
        let mut failure: Option<SimError> = None;
        for report in self.collect()? {
            match report {
                Report::Advanced(a) => {
                    halos[a.rank] = Some(a.halo);
                    parts.push(a.stats);
                    slices.push(a.slice);
                    if let Some(path) = a.checkpoint {
                        checkpoints.push(path);
                    }
                }
                Report::Failed { rank, reason } => {
                    failure.get_or_insert(SimError::Rank { rank, reason });
                }
                Report::Restored { rank, .. } | Report::RestoreFailed { rank, .. } => {
                    failure.get_or_insert(SimError::Rank {
                        rank,
                        reason: "演进期间收到恢复报告".to_string(),
                    });
                }
            }
        }
        if let Some(err) = failure {
            return Err(err);
        }
        self.exchange_halos(halos)?;
        Ok(Gate {
            stats: StepStats::merge(&parts),
            slices,
            checkpoints,
        })
    }

    /// 收工并等全部线程退出。
    pub fn finish(mut self) -> SimResult<()> {
        for tx in &self.directives {
            // 已退出的分片收不到也无妨
            let _ = tx.send(Directive::Finish);
        }
        for (rank, handle) in self.workers.drain(..).enumerate() {
            handle.join().map_err(|_| SimError::RankLost { rank })?;
        }
        Ok(())
    }
}
