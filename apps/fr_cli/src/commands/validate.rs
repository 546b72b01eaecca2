// apps/fr_cli/src/commands/validate.rs

//! 情景包校验命令
//!
//! 加载整个情景包，把配置与输入文件的全部违规一次性列出来。
//! 校验通过时打印情景关键参数，并对常见的配置缺口给出警告。

use anyhow::{bail, Context, Result};
use clap::Args;
use fr_foundation::validation::{require_positive, ValidationReport};
use fr_scenario::{InflowGeometry, ScenarioError, ScenarioPackage};
use std::path::PathBuf;

/// 校验参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 情景包目录或 scenario.json 路径
    pub package: PathBuf,

    /// 严格模式（警告也视为失败）
    #[arg(long)]
    pub strict: bool,
}

/// 执行校验命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    println!("检查情景包: {}", args.package.display());

    let package = match ScenarioPackage::load(&args.package) {
        Ok(p) => p,
        Err(ScenarioError::Config(err)) => {
            println!("\n=== 验证结果 ===");
            println!("\n错误 ({}):", err.len());
            for violation in err.violations() {
                println!("  ✗ {violation}");
            }
            println!("\n✗ 验证失败");
            bail!("情景包校验失败，共 {} 项违规", err.len());
        }
        Err(other) => return Err(other).context("情景包加载失败"),
    };

    let config = package.config();
    println!("\n=== 情景参数 ===");
    println!("运行标识: {}", package.run_label());
    println!("坐标系: EPSG:{}", config.epsg);
    println!("模拟时长: {} s", config.duration);
    println!("出图分辨率: {} m", package.finest_resolution(None));
    println!(
        "边界环: {} 段, 面积 {:.3} km²",
        package.boundary().n_edges(),
        package.boundary().polygon().area() / 1.0e6
    );

    let report = inspect(&package);
    if !report.errors.is_empty() {
        println!("\n错误 ({}):", report.error_count());
        for error in &report.errors {
            println!("  ✗ {error}");
        }
    }
    if !report.warnings.is_empty() {
        println!("\n警告 ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  ⚠ {warning}");
        }
    }

    println!("\n=== 验证结果 ===");
    if !report.is_valid() {
        println!("✗ 验证失败");
        bail!("情景包校验失败，共 {} 项违规", report.error_count());
    }
    if args.strict && !report.warnings.is_empty() {
        println!("✗ 验证失败（严格模式）");
        bail!("严格模式下 {} 条警告视为失败", report.warnings.len());
    }
    println!("✓ 验证通过");
    Ok(())
}

/// 配置解析之外的几何检查与开跑前提示。
///
/// 退化的边界环算错误；其余配置缺口不阻止运行，只作警告。
fn inspect(package: &ScenarioPackage) -> ValidationReport {
    let config = package.config();
    let mut report = ValidationReport::new();

    report.check(require_positive(
        "边界环面积",
        package.boundary().polygon().area(),
    ));

    if package.elevation_path().is_none() {
        report.add_warning("未配置地形栅格，将按平地运行");
    }
    if package.inflows().is_empty() {
        report.add_warning("没有入流要素，域内不会进水");
    }
    if config.resolution.is_none() && package.mesh_regions().is_empty() {
        report.add_warning(format!(
            "未配置分辨率也没有加密区，将按兜底 {} m 建网",
            package.finest_resolution(None)
        ));
    }
    if config.simplify_mesh {
        report.add_warning("simplify_mesh 已请求，但均匀网格求解器不做网格简化");
    }
    for (i, inflow) in package.inflows().iter().enumerate() {
        if let InflowGeometry::Region(polygon) = &inflow.geometry {
            if polygon.area() <= 0.0 {
                report.add_warning(format!("入流要素 {i} 占地面积为零，运行时会被跳过"));
            }
        }
        if !package.boundary().polygon().contains_all(inflow.geometry.points()) {
            report.add_warning(format!("入流要素 {i} 触碰或越过外边界，出界部分不会进水"));
        }
    }
    report
}
