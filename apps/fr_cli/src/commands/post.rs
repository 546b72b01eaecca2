// apps/fr_cli/src/commands/post.rs

//! 出图命令
//!
//! 不重跑模拟，把已有的流场时序重新栅格化。换一个分辨率出图
//! 或补齐被打断的出图时用。

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

/// 出图参数
#[derive(Args)]
pub struct PostArgs {
    /// 情景包目录或 scenario.json 路径
    pub package: PathBuf,

    /// 出图分辨率 [米]，缺省按最细加密区或配置分辨率
    #[arg(short, long)]
    pub resolution: Option<f64>,
}

/// 执行出图命令
pub fn execute(args: PostArgs) -> Result<()> {
    let package = fr_scenario::ScenarioPackage::load(&args.package).context("情景包加载失败")?;
    info!("出图: {}", package.run_label());

    let summary = fr_post::post_process(&package, args.resolution).context("出图失败")?;

    info!(
        "{} 帧 -> {} 个栅格, {}x{} @ {} m",
        summary.frames, summary.rasters_written, summary.nx, summary.ny, summary.resolution
    );
    println!(
        "✓ 出图完成: {} 个栅格写入 {}",
        summary.rasters_written,
        package.output_dir().display()
    );
    Ok(())
}
