// apps/fr_cli/src/commands/run.rs

//! 运行模拟命令
//!
//! 加载情景包并跑完整个编排流程。Ctrl-C 在这里映射到运行的
//! 下车标志：第一次按下后运行会在下一个同步门补好检查点再
//! 退出，之后可以用更高的批次号续算。

use anyhow::{bail, Context, Result};
use clap::Args;
use fr_sim::{default_ranks, run_scenario, CallbackSet, LoggingCallback, RunOptions, RunOutcome};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// 运行模拟参数
#[derive(Args)]
pub struct RunArgs {
    /// 情景包目录或 scenario.json 路径
    pub package: PathBuf,

    /// 批次号，1 起计；大于 1 走检查点续算
    #[arg(short, long, default_value_t = 1)]
    pub batch_number: u32,

    /// 指定恢复时刻 [秒]，缺省取全分片最晚的共同检查点
    #[arg(long)]
    pub checkpoint_time: Option<f64>,

    /// 分片数，缺省按可用核数
    #[arg(short, long)]
    pub ranks: Option<usize>,

    /// 出图分辨率 [米]，缺省按最细加密区或配置分辨率
    #[arg(long)]
    pub resolution: Option<f64>,

    /// 全量日志（逐门进度与指标）
    #[arg(short, long)]
    pub verbose: bool,
}

/// 执行运行命令
pub fn execute(args: RunArgs) -> Result<()> {
    info!("=== Freshet 模拟启动 ===");

    let package = fr_scenario::ScenarioPackage::load(&args.package).context("情景包加载失败")?;
    info!(
        "情景: {}, 时长 {} s, 批次 {}",
        package.run_label(),
        package.config().duration,
        args.batch_number
    );

    // Ctrl-C 只置下车标志，演进循环在同步门处自己收手
    let bail_flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&bail_flag);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
        eprintln!("收到中断信号，将在下一个同步门下车");
    })
    .context("安装中断处理失败")?;

    let callback = if args.verbose {
        LoggingCallback::verbose()
    } else {
        LoggingCallback::new()
    };
    let options = RunOptions {
        batch_number: args.batch_number,
        checkpoint_time: args.checkpoint_time,
        n_ranks: args.ranks.unwrap_or_else(default_ranks),
        post_resolution: args.resolution,
        bail_flag: Some(bail_flag),
        ..RunOptions::default()
    };
    info!("分片数: {}", options.n_ranks);

    let start = Instant::now();
    let report = run_scenario(&package, CallbackSet::with(Arc::new(callback)), &options)?;
    let elapsed = start.elapsed();

    info!("=== 模拟结束 ===");
    info!("结局: {}", report.outcome);
    info!(
        "演进: {:.0} / {:.0} s, {} 个同步门, {} 内部步",
        report.sim_time_s, report.duration_s, report.gates, report.total_steps
    );
    info!("计算时间: {:.2} s", elapsed.as_secs_f64());
    if let Some(path) = &report.summary_path {
        info!("运行归纳: {}", path.display());
    }
    if let Some(post) = &report.post {
        info!(
            "出图: {} 帧 -> {} 个栅格 @ {} m",
            post.frames, post.rasters_written, post.resolution
        );
    }

    match report.outcome {
        RunOutcome::Completed => {
            println!("✓ 运行完成: {}", report.run_label);
            Ok(())
        }
        RunOutcome::Bailed => {
            warn!(
                "运行按请求下车，可用 --batch-number {} 续算",
                report.batch_number + 1
            );
            println!("⚠ 运行已下车，演进止于 t={} s", report.sim_time_s);
            Ok(())
        }
        RunOutcome::Unstable => {
            bail!("运行数值失稳，演进止于 t={} s", report.sim_time_s)
        }
        RunOutcome::Incomplete => {
            bail!("运行未跑完，演进止于 t={} s", report.sim_time_s)
        }
    }
}
