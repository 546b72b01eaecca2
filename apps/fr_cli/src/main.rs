// apps/fr_cli/src/main.rs

//! Freshet 命令行界面
//!
//! 洪水情景模拟工具链的统一入口：校验情景包、查看情景信息、
//! 跑模拟、单独出图、预览栅格与清点产物。
//!
//! 库层只打 `tracing` 日志，订阅器在这里装；中断信号也只在
//! 这里映射到运行的下车标志。

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Freshet 洪水情景模拟命令行工具
#[derive(Parser)]
#[command(name = "fr_cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Freshet flood scenario simulation toolkit", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 校验情景包
    Validate(commands::validate::ValidateArgs),
    /// 显示情景信息
    Info(commands::info::InfoArgs),
    /// 运行模拟
    Run(commands::run::RunArgs),
    /// 把流场时序单独出图
    PostProcess(commands::post::PostArgs),
    /// 在终端预览量值栅格
    Viz(commands::viz::VizArgs),
    /// 清点待上传的产物
    Upload(commands::upload::UploadArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // 执行命令
    match cli.command {
        Commands::Validate(args) => commands::validate::execute(args),
        Commands::Info(args) => commands::info::execute(args),
        Commands::Run(args) => commands::run::execute(args),
        Commands::PostProcess(args) => commands::post::execute(args),
        Commands::Viz(args) => commands::viz::execute(args),
        Commands::Upload(args) => commands::upload::execute(args),
    }
}
