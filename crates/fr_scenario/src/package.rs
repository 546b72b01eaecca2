// crates/fr_scenario/src/package.rs
//! 情景包加载。
//!
//! [`ScenarioPackage::load`] 一次完成配置校验、输入文件解析与
//! 域要素装配。配置本身的违规先行报告；配置可用后，所有输入
//! 文件的违规再汇总成一份 [`ConfigError`] 报告。加载成功即创建
//! 产物目录与检查点目录。

use crate::assemble::{
    assemble_boundary, check_polygons_inside, finest_region_resolution, interior_regions,
    FrictionTable, HoleSet,
};
use crate::config::{RawScenario, ScenarioConfig};
use crate::error::{ConfigError, ScenarioError, ScenarioResult};
use crate::features::{
    BoundaryLine, FrictionPatch, InflowPatch, MeshRegion, StructureMethod, StructureShape,
};
use crate::geojson::FeatureCollection;
use fr_geo::{BoundaryRing, Polygon};
use std::fs;
use std::path::{Path, PathBuf};

/// 找不到更细分辨率时的兜底出图分辨率（米）。
const FALLBACK_RESOLUTION_M: f64 = 1000.0;

/// 加载完成的情景包。
#[derive(Debug, Clone)]
pub struct ScenarioPackage {
    root: PathBuf,
    config: ScenarioConfig,
    boundary: BoundaryRing,
    frictions: FrictionTable,
    inflows: Vec<InflowPatch>,
    structures: Vec<StructureShape>,
    holes: HoleSet,
    mesh_regions: Vec<MeshRegion>,
    elevation_path: Option<PathBuf>,
}

impl ScenarioPackage {
    /// 从目录或 `scenario.json` 路径加载情景包。
    pub fn load(path: &Path) -> ScenarioResult<Self> {
        let (root, config_path) = resolve_package_root(path)?;
        tracing::info!(package = %root.display(), "loading scenario package");

        let text = fs::read_to_string(&config_path)
            .map_err(|e| ScenarioError::io(config_path.clone(), e))?;
        let raw: RawScenario = serde_json::from_str(&text)
            .map_err(|e| ScenarioError::json(config_path.clone(), e))?;
        let config = ScenarioConfig::from_raw(raw)?;

        let mut violations: Vec<String> = Vec::new();

        // 外边界（必填）
        let boundary = load_boundary(&root, &config, &mut violations);

        // 可选输入：配置里声明了就必须存在且可解析
        let patches = load_optional_features(
            &root,
            &config,
            config.friction.as_deref(),
            "friction",
            FrictionPatch::from_feature,
            &mut violations,
        );
        let inflows = load_optional_features(
            &root,
            &config,
            config.inflow.as_deref(),
            "inflow",
            InflowPatch::from_feature,
            &mut violations,
        );
        let structures = load_optional_features(
            &root,
            &config,
            config.structure.as_deref(),
            "structure",
            StructureShape::from_feature,
            &mut violations,
        );
        let mesh_regions = load_optional_features(
            &root,
            &config,
            config.mesh_region.as_deref(),
            "mesh_region",
            MeshRegion::from_feature,
            &mut violations,
        );

        let elevation_path = match config.elevation.as_deref() {
            None => None,
            Some(name) => match resolve_input(&root, name) {
                Some(p) => Some(p),
                None => {
                    violations.push(missing_file("elevation", name, &root));
                    None
                }
            },
        };

        let holes = match HoleSet::build(&structures) {
            Ok(h) => h,
            Err(mut errs) => {
                violations.append(&mut errs);
                HoleSet::default()
            }
        };
        let frictions = FrictionTable::build(&structures, &patches);

        // 点位检查：加密区必须整体落在外边界内，否则网格生成会失败；
        // 入流与构筑物允许贴边或出界，出界部分在求解时自然落空，只告警
        if let Some(ring) = &boundary {
            let region_polys: Vec<&Polygon> =
                mesh_regions.iter().map(|r| &r.polygon).collect();
            violations.extend(check_polygons_inside(
                "mesh_region",
                &region_polys,
                ring.polygon(),
            ));
            for (i, inflow) in inflows.iter().enumerate() {
                if !ring.polygon().contains_all(inflow.geometry.points()) {
                    tracing::warn!(index = i, "inflow touches or crosses the boundary ring");
                }
            }
            for (i, shape) in structures.iter().enumerate() {
                if !ring.polygon().contains_all(shape.polygon.vertices()) {
                    tracing::warn!(index = i, "structure extends beyond the boundary ring");
                }
            }
        }

        if !violations.is_empty() {
            return Err(ConfigError::new(violations).into());
        }
        let boundary = boundary.ok_or_else(|| {
            ScenarioError::from(ConfigError::single("boundary: 装配结果不可用"))
        })?;

        let package = Self {
            root,
            config,
            boundary,
            frictions,
            inflows,
            structures,
            holes,
            mesh_regions,
            elevation_path,
        };
        package.create_output_dirs()?;
        tracing::info!(
            run = %package.run_label(),
            edges = package.boundary.n_edges(),
            area_m2 = package.boundary.polygon().area(),
            "scenario package loaded"
        );
        Ok(package)
    }

    fn create_output_dirs(&self) -> ScenarioResult<()> {
        let checkpoints = self.checkpoint_dir();
        fs::create_dir_all(&checkpoints).map_err(|e| ScenarioError::io(checkpoints.clone(), e))
    }

    /// 包根目录。
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 校验后的配置。
    #[must_use]
    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// 外边界环。
    #[must_use]
    pub fn boundary(&self) -> &BoundaryRing {
        &self.boundary
    }

    /// 糙率查询表。
    #[must_use]
    pub fn frictions(&self) -> &FrictionTable {
        &self.frictions
    }

    /// 入流要素。
    #[must_use]
    pub fn inflows(&self) -> &[InflowPatch] {
        &self.inflows
    }

    /// 全部构筑物。
    #[must_use]
    pub fn structures(&self) -> &[StructureShape] {
        &self.structures
    }

    /// 网格孔洞。
    #[must_use]
    pub fn holes(&self) -> &HoleSet {
        &self.holes
    }

    /// 网格加密区。
    #[must_use]
    pub fn mesh_regions(&self) -> &[MeshRegion] {
        &self.mesh_regions
    }

    /// 加密区的 `(多边形, 分辨率)` 列表。
    #[must_use]
    pub fn interior_regions(&self) -> Vec<(Polygon, f64)> {
        interior_regions(&self.mesh_regions)
    }

    /// 抬升地形的构筑物占地。
    #[must_use]
    pub fn elevation_shapes(&self) -> Vec<&Polygon> {
        self.structures
            .iter()
            .filter(|s| s.method == StructureMethod::Elevation)
            .map(|s| &s.polygon)
            .collect()
    }

    /// 地形栅格路径。
    #[must_use]
    pub fn elevation_path(&self) -> Option<&Path> {
        self.elevation_path.as_deref()
    }

    /// 运行标识。
    #[must_use]
    pub fn run_label(&self) -> String {
        self.config.run_label()
    }

    /// 产物目录（包根下）。
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(self.config.output_dir_name())
    }

    /// 检查点目录。
    #[must_use]
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.root.join(self.config.checkpoint_dir_name())
    }

    /// 出图分辨率。显式指定优先，其次最细加密区，再次配置
    /// 分辨率，最后兜底 1000 m。
    #[must_use]
    pub fn finest_resolution(&self, explicit: Option<f64>) -> f64 {
        explicit
            .or_else(|| finest_region_resolution(&self.mesh_regions))
            .or(self.config.resolution)
            .unwrap_or(FALLBACK_RESOLUTION_M)
    }
}

/// 接受目录或 `scenario.json` 路径，返回 `(包根, 配置路径)`。
fn resolve_package_root(path: &Path) -> ScenarioResult<(PathBuf, PathBuf)> {
    if path.is_file() {
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        return Ok((root, path.to_path_buf()));
    }
    let config_path = path.join("scenario.json");
    if config_path.is_file() {
        Ok((path.to_path_buf(), config_path))
    } else {
        Err(ScenarioError::NotAPackage {
            path: path.to_path_buf(),
        })
    }
}

/// 在包根与 `inputs/` 下找输入文件。
fn resolve_input(root: &Path, name: &str) -> Option<PathBuf> {
    let direct = root.join(name);
    if direct.is_file() {
        return Some(direct);
    }
    let nested = root.join("inputs").join(name);
    if nested.is_file() {
        return Some(nested);
    }
    None
}

fn missing_file(field: &str, name: &str, root: &Path) -> String {
    format!(
        "{field}: 找不到文件 {name}（{} 与 {}/inputs 下均无）",
        root.display(),
        root.display()
    )
}

fn load_boundary(
    root: &Path,
    config: &ScenarioConfig,
    violations: &mut Vec<String>,
) -> Option<BoundaryRing> {
    let path = match resolve_input(root, &config.boundary) {
        Some(p) => p,
        None => {
            violations.push(missing_file("boundary", &config.boundary, root));
            return None;
        }
    };
    let fc = match FeatureCollection::from_path(&path) {
        Ok(fc) => fc,
        Err(e) => {
            violations.push(format!("boundary: {e}"));
            return None;
        }
    };
    check_crs(&fc, config, "boundary");
    let mut lines: Vec<BoundaryLine> = Vec::new();
    let before = violations.len();
    for (i, feature) in fc.features.iter().enumerate() {
        match BoundaryLine::from_feature(i, feature) {
            Ok(line) => lines.push(line),
            Err(e) => violations.push(format!("boundary: {e}")),
        }
    }
    if violations.len() > before {
        return None;
    }
    match assemble_boundary(lines, config.ring_tolerance) {
        Ok(ring) => Some(ring),
        Err(e) => {
            violations.push(format!("boundary: {e}"));
            None
        }
    }
}

fn load_optional_features<T>(
    root: &Path,
    config: &ScenarioConfig,
    name: Option<&str>,
    field: &str,
    convert: impl Fn(usize, &crate::geojson::Feature) -> Result<T, String>,
    violations: &mut Vec<String>,
) -> Vec<T> {
    let Some(name) = name else {
        return Vec::new();
    };
    let Some(path) = resolve_input(root, name) else {
        violations.push(missing_file(field, name, root));
        return Vec::new();
    };
    let fc = match FeatureCollection::from_path(&path) {
        Ok(fc) => fc,
        Err(e) => {
            violations.push(format!("{field}: {e}"));
            return Vec::new();
        }
    };
    check_crs(&fc, config, field);
    let mut out = Vec::with_capacity(fc.features.len());
    for (i, feature) in fc.features.iter().enumerate() {
        match convert(i, feature) {
            Ok(t) => out.push(t),
            Err(e) => violations.push(format!("{field}: {e}")),
        }
    }
    out
}

/// 输入文件声明的 CRS 与配置不一致时告警，不算违规。
fn check_crs(fc: &FeatureCollection, config: &ScenarioConfig, label: &str) {
    match fc.epsg() {
        Some(code) if code != config.epsg => {
            tracing::warn!(
                input = label,
                declared = code,
                expected = config.epsg,
                "input CRS differs from scenario EPSG"
            );
        }
        None => {
            tracing::warn!(input = label, "input has no CRS declaration");
        }
        Some(_) => {}
    }
}
