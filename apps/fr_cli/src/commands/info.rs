// apps/fr_cli/src/commands/info.rs

//! 情景信息命令
//!
//! 打印情景的关键参数、输入清单与域要素统计，开跑前看一眼
//! 用的。不建网也不动产物目录里的东西。

use anyhow::{Context, Result};
use clap::Args;
use fr_geo::BoundaryKind;
use fr_scenario::{InflowKind, ScenarioPackage, StructureMethod};
use std::path::PathBuf;

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// 情景包目录或 scenario.json 路径
    pub package: PathBuf,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    let package = ScenarioPackage::load(&args.package).context("情景包加载失败")?;
    let config = package.config();

    println!("=== 情景 ===");
    println!("运行标识: {}", package.run_label());
    println!("包根: {}", package.root().display());
    println!("坐标系: EPSG:{}", config.epsg);
    println!("模拟时长: {} s", config.duration);
    if let Some(start) = config.model_start {
        println!("起算时刻: {}", start.to_rfc3339());
    }
    println!(
        "同步门间隔: {} s",
        fr_sim::compute_yieldstep(config.duration)
    );
    println!("出图分辨率: {} m", package.finest_resolution(None));
    if config.simplify_mesh {
        println!("网格简化: 已请求");
    }

    println!("\n=== 输入清单 ===");
    println!("boundary: {}", config.boundary);
    print_input("elevation", config.elevation.as_deref());
    print_input("friction", config.friction.as_deref());
    print_input("inflow", config.inflow.as_deref());
    print_input("structure", config.structure.as_deref());
    print_input("mesh_region", config.mesh_region.as_deref());

    println!("\n=== 域要素 ===");
    let ring = package.boundary();
    let (reflective, transmissive, dirichlet) = count_kinds(ring.edge_kinds());
    println!(
        "边界环: {} 段 (Reflective {reflective}, Transmissive {transmissive}, Dirichlet {dirichlet}), 面积 {:.3} km²",
        ring.n_edges(),
        ring.polygon().area() / 1.0e6
    );
    println!("糙率分区: {}", package.frictions().len());

    let rainfall = count_inflows(&package, InflowKind::Rainfall);
    let surface = count_inflows(&package, InflowKind::Surface);
    println!(
        "入流要素: {} (降雨 {rainfall}, 地表入流 {surface})",
        package.inflows().len()
    );

    let holes = count_structures(&package, StructureMethod::Hole);
    let mannings = count_structures(&package, StructureMethod::Mannings);
    let elevated = count_structures(&package, StructureMethod::Elevation);
    println!(
        "构筑物: {} (孔洞 {holes}, 糙率 {mannings}, 抬升 {elevated})",
        package.structures().len()
    );

    match package
        .mesh_regions()
        .iter()
        .map(|r| r.resolution)
        .fold(None::<f64>, |acc, r| Some(acc.map_or(r, |a| a.min(r))))
    {
        Some(finest) => println!(
            "加密区: {} (最细 {finest} m)",
            package.mesh_regions().len()
        ),
        None => println!("加密区: 0"),
    }

    println!("\n=== 产物 ===");
    println!("产物目录: {}", package.output_dir().display());
    println!("检查点目录: {}", package.checkpoint_dir().display());
    let series = fr_io::series_path(&package.output_dir(), &package.run_label());
    if series.is_file() {
        println!("流场时序: {} (已存在，可续算或出图)", series.display());
    } else {
        println!("流场时序: 尚未生成");
    }

    Ok(())
}

fn print_input(field: &str, name: Option<&str>) {
    match name {
        Some(n) => println!("{field}: {n}"),
        None => println!("{field}: (未配置)"),
    }
}

fn count_kinds(kinds: &[BoundaryKind]) -> (usize, usize, usize) {
    let mut reflective = 0;
    let mut transmissive = 0;
    let mut dirichlet = 0;
    for kind in kinds {
        match kind {
            BoundaryKind::Reflective => reflective += 1,
            BoundaryKind::Transmissive => transmissive += 1,
            BoundaryKind::Dirichlet => dirichlet += 1,
        }
    }
    (reflective, transmissive, dirichlet)
}

fn count_inflows(package: &ScenarioPackage, kind: InflowKind) -> usize {
    package.inflows().iter().filter(|p| p.kind == kind).count()
}

fn count_structures(package: &ScenarioPackage, method: StructureMethod) -> usize {
    package
        .structures()
        .iter()
        .filter(|s| s.method == method)
        .count()
}
