// apps/fr_cli/src/commands/upload.rs

//! 产物清点命令
//!
//! 按类别清点产物目录下待交付的文件。网络上传不在工具链范围
//! 内，这个命令只负责盘点：核对产物齐不齐、看看总量有多大。

use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// 清点参数
#[derive(Args)]
pub struct UploadArgs {
    /// 情景包目录或 scenario.json 路径
    pub package: PathBuf,

    /// 只清点不上传（上传后端未配置时两者等价）
    #[arg(long)]
    pub dry_run: bool,
}

/// 一类产物的清点结果。
struct Category {
    label: &'static str,
    files: usize,
    bytes: u64,
}

/// 执行清点命令
pub fn execute(args: UploadArgs) -> Result<()> {
    let package = fr_scenario::ScenarioPackage::load(&args.package).context("情景包加载失败")?;
    let out_dir = package.output_dir();
    println!("清点产物: {}", out_dir.display());

    let mut categories = [
        Category::new("流场时序 (.fts)"),
        Category::new("运行归纳 (.json)"),
        Category::new("逐门诊断 (.csv)"),
        Category::new("运行流水账 (.log)"),
        Category::new("量值栅格"),
        Category::new("检查点 (.fck)"),
        Category::new("其他"),
    ];
    let mut total_bytes = 0u64;
    let mut total_files = 0usize;

    for path in walk_files(&out_dir)? {
        let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let slot = categorize(&path);
        categories[slot].files += 1;
        categories[slot].bytes += size;
        total_files += 1;
        total_bytes += size;
    }

    println!("\n=== 产物清单 ===");
    for category in &categories {
        if category.files > 0 {
            println!(
                "{:<20} {:>4} 个文件  {:>10}",
                category.label,
                category.files,
                human_bytes(category.bytes)
            );
        }
    }
    println!(
        "合计: {} 个文件, {}",
        total_files,
        human_bytes(total_bytes)
    );

    if args.dry_run {
        println!("\n✓ 清点完成（--dry-run，不上传）");
    } else {
        warn!("上传后端未配置，本次仅完成清点");
        println!("\n⚠ 上传后端未配置，本次仅完成清点");
    }
    Ok(())
}

impl Category {
    fn new(label: &'static str) -> Self {
        Self {
            label,
            files: 0,
            bytes: 0,
        }
    }
}

/// 递归列出目录下的所有文件，按路径排序。
fn walk_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let entries = fs::read_dir(&current)
            .with_context(|| format!("读取目录 {} 失败", current.display()))?;
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

fn categorize(path: &Path) -> usize {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("fts") => 0,
        Some("json") => 1,
        Some("csv") => 2,
        Some("log") => 3,
        Some("asc") | Some("tif") | Some("tiff") | Some("txt") => 4,
        Some("fck") => 5,
        _ => 6,
    }
}

fn human_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b >= KIB * KIB * KIB {
        format!("{:.2} GiB", b / (KIB * KIB * KIB))
    } else if b >= KIB * KIB {
        format!("{:.2} MiB", b / (KIB * KIB))
    } else if b >= KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{bytes} B")
    }
}
