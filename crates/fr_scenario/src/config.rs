// crates/fr_scenario/src/config.rs
//! 情景配置解析与校验。
//!
//! `scenario.json` 先按宽松结构 [`RawScenario`] 读入，再经
//! [`ScenarioConfig::from_raw`] 校验。校验一次收集所有违规项，
//! 缺三个字段就报三条，而不是修一条再发现下一条。

use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use fr_foundation::defaults::{DEFAULT_RING_TOLERANCE_M, FORMAT_VERSION};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `scenario.json` 的宽松映像，所有字段可缺省。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawScenario {
    /// 情景包格式版本，缺省为当前版本
    #[serde(default)]
    pub format_version: Option<String>,
    /// 情景编号
    #[serde(default)]
    pub id: Option<i64>,
    /// 项目编号
    #[serde(default)]
    pub project: Option<i64>,
    /// 运行编号，缺省为 0
    #[serde(default)]
    pub run_id: Option<i64>,
    /// 投影坐标系，如 `"EPSG:28355"`
    #[serde(default)]
    pub epsg: Option<EpsgSpec>,
    /// 模拟时长（秒）
    #[serde(default)]
    pub duration: Option<f64>,
    /// 网格目标分辨率（米），可被加密区覆盖
    #[serde(default)]
    pub resolution: Option<f64>,
    /// 边界线段 GeoJSON 文件名
    #[serde(default)]
    pub boundary: Option<String>,
    /// 地形栅格文件名
    #[serde(default)]
    pub elevation: Option<String>,
    /// 糙率分区 GeoJSON 文件名
    #[serde(default)]
    pub friction: Option<String>,
    /// 入流要素 GeoJSON 文件名
    #[serde(default)]
    pub inflow: Option<String>,
    /// 构筑物 GeoJSON 文件名
    #[serde(default)]
    pub structure: Option<String>,
    /// 网格加密区 GeoJSON 文件名
    #[serde(default)]
    pub mesh_region: Option<String>,
    /// 是否请求网格简化
    #[serde(default)]
    pub simplify_mesh: Option<bool>,
    /// 模型起算时刻，ISO-8601 字符串
    #[serde(default)]
    pub model_start: Option<String>,
    /// 边界环装配的端点匹配容差（米）
    #[serde(default)]
    pub ring_tolerance: Option<f64>,
}

/// EPSG 写法：`"EPSG:28355"`、`"28355"` 或整数 `28355` 均可。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EpsgSpec {
    /// 整数代码
    Code(u32),
    /// 字符串写法
    Name(String),
}

impl EpsgSpec {
    /// 提取整数 EPSG 代码，取最后一个冒号之后的数字。
    #[must_use]
    pub fn code(&self) -> Option<u32> {
        match self {
            EpsgSpec::Code(c) => Some(*c),
            EpsgSpec::Name(s) => s
                .rsplit(':')
                .next()
                .and_then(|tail| tail.trim().parse::<u32>().ok()),
        }
    }
}

/// 校验后的情景配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// 情景包格式版本
    pub format_version: String,
    /// 情景编号
    pub id: i64,
    /// 项目编号
    pub project: i64,
    /// 运行编号
    pub run_id: i64,
    /// EPSG 代码
    pub epsg: u32,
    /// 模拟时长（秒）
    pub duration: f64,
    /// 网格目标分辨率（米）
    pub resolution: Option<f64>,
    /// 边界文件名
    pub boundary: String,
    /// 地形栅格文件名
    pub elevation: Option<String>,
    /// 糙率文件名
    pub friction: Option<String>,
    /// 入流文件名
    pub inflow: Option<String>,
    /// 构筑物文件名
    pub structure: Option<String>,
    /// 加密区文件名
    pub mesh_region: Option<String>,
    /// 是否请求网格简化
    pub simplify_mesh: bool,
    /// 模型起算时刻
    pub model_start: Option<DateTime<Utc>>,
    /// 边界环装配容差（米）
    pub ring_tolerance: f64,
}

impl ScenarioConfig {
    /// 校验宽松配置，收集全部违规项。
    pub fn from_raw(raw: RawScenario) -> Result<Self, ConfigError> {
        let mut violations: Vec<String> = Vec::new();

        let format_version = match raw.format_version {
            None => FORMAT_VERSION.to_string(),
            Some(v) if v != FORMAT_VERSION => {
                violations.push(format!(
                    "format_version: 本版本仅支持 '{FORMAT_VERSION}'，实际为 '{v}'"
                ));
                v
            }
            Some(v) => v,
        };

        let id = require(&mut violations, "id", raw.id);
        let project = require(&mut violations, "project", raw.project);
        let run_id = raw.run_id.unwrap_or(0);

        let epsg = match &raw.epsg {
            None => {
                violations.push("epsg: 缺少必填字段".to_string());
                0
            }
            Some(spec) => match spec.code() {
                Some(code) => code,
                None => {
                    violations.push(format!("epsg: 无法从 {spec:?} 解析出 EPSG 代码"));
                    0
                }
            },
        };

        let duration = match raw.duration {
            None => {
                violations.push("duration: 缺少必填字段".to_string());
                0.0
            }
            Some(d) if !d.is_finite() || d <= 0.0 => {
                violations.push(format!("duration: 必须为正数秒，实际为 {d}"));
                0.0
            }
            Some(d) => d,
        };

        let boundary = match &raw.boundary {
            None => {
                violations.push("boundary: 缺少必填字段".to_string());
                String::new()
            }
            Some(b) if b.trim().is_empty() => {
                violations.push("boundary: 文件名不能为空".to_string());
                String::new()
            }
            Some(b) => b.clone(),
        };

        if let Some(r) = raw.resolution {
            if !r.is_finite() || r <= 0.0 {
                violations.push(format!("resolution: 必须为正数米，实际为 {r}"));
            }
        }

        let model_start = match &raw.model_start {
            None => None,
            Some(s) => match DateTime::parse_from_rfc3339(s) {
                Ok(t) => Some(t.with_timezone(&Utc)),
                Err(e) => {
                    violations.push(format!("model_start: 不是合法的 ISO-8601 时刻 '{s}'（{e}）"));
                    None
                }
            },
        };

        let ring_tolerance = match raw.ring_tolerance {
            None => DEFAULT_RING_TOLERANCE_M,
            Some(t) if !t.is_finite() || t <= 0.0 => {
                violations.push(format!("ring_tolerance: 必须为正数米，实际为 {t}"));
                DEFAULT_RING_TOLERANCE_M
            }
            Some(t) => t,
        };

        if !violations.is_empty() {
            return Err(ConfigError::new(violations));
        }

        Ok(Self {
            format_version,
            id,
            project,
            run_id,
            epsg,
            duration,
            resolution: raw.resolution,
            boundary,
            elevation: raw.elevation,
            friction: raw.friction,
            inflow: raw.inflow,
            structure: raw.structure,
            mesh_region: raw.mesh_region,
            simplify_mesh: raw.simplify_mesh.unwrap_or(false),
            model_start,
            ring_tolerance,
        })
    }

    /// 运行标识 `run_{project}_{id}_{run_id}`，用于所有产物命名。
    #[must_use]
    pub fn run_label(&self) -> String {
        format!("run_{}_{}_{}", self.project, self.id, self.run_id)
    }

    /// 产物目录名 `outputs_{project}_{id}_{run_id}`。
    #[must_use]
    pub fn output_dir_name(&self) -> String {
        format!("outputs_{}_{}_{}", self.project, self.id, self.run_id)
    }

    /// 检查点子目录名。
    #[must_use]
    pub fn checkpoint_dir_name(&self) -> PathBuf {
        PathBuf::from(self.output_dir_name()).join("checkpoints")
    }
}

fn require(violations: &mut Vec<String>, field: &str, value: Option<i64>) -> i64 {
    match value {
        Some(v) => v,
        None => {
            violations.push(format!("{field}: 缺少必填字段"));
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> &'static str {
        r#"{
            "id": 1,
            "project": 1,
            "run_id": 1,
            "epsg": "EPSG:28355",
            "duration": 600,
            "boundary": "boundary.geojson"
        }"#
    }

    #[test]
    fn test_minimal_config_validates() {
        let raw: RawScenario = serde_json::from_str(minimal_json()).unwrap();
        let config = ScenarioConfig::from_raw(raw).unwrap();
        assert_eq!(config.epsg, 28355);
        assert_eq!(config.duration, 600.0);
        assert_eq!(config.run_label(), "run_1_1_1");
        assert_eq!(config.output_dir_name(), "outputs_1_1_1");
        assert_eq!(config.ring_tolerance, DEFAULT_RING_TOLERANCE_M);
        assert_eq!(config.format_version, FORMAT_VERSION);
        assert!(!config.simplify_mesh);
        assert!(config.model_start.is_none());
    }

    #[test]
    fn test_format_version_current_accepted() {
        let raw: RawScenario = serde_json::from_str(
            r#"{"format_version": "1.0", "id": 1, "project": 1,
                "epsg": 28355, "duration": 60, "boundary": "b.geojson"}"#,
        )
        .unwrap();
        let config = ScenarioConfig::from_raw(raw).unwrap();
        assert_eq!(config.format_version, "1.0");
    }

    #[test]
    fn test_unsupported_format_version_rejected() {
        let raw: RawScenario = serde_json::from_str(
            r#"{"format_version": "2.0", "id": 1, "project": 1,
                "epsg": 28355, "duration": 60, "boundary": "b.geojson"}"#,
        )
        .unwrap();
        let err = ScenarioConfig::from_raw(raw).unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(err.mentions("format_version"));
    }

    #[test]
    fn test_model_start_parsed_to_utc() {
        let raw: RawScenario = serde_json::from_str(
            r#"{"id": 1, "project": 1, "epsg": 28355, "duration": 60,
                "boundary": "b.geojson", "model_start": "2024-01-01T10:00:00+10:00"}"#,
        )
        .unwrap();
        let config = ScenarioConfig::from_raw(raw).unwrap();
        let start = config.model_start.unwrap();
        assert_eq!(start.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_bad_model_start_is_a_violation() {
        let raw: RawScenario = serde_json::from_str(
            r#"{"id": 1, "project": 1, "epsg": 28355, "duration": 60,
                "boundary": "b.geojson", "model_start": "昨天下午"}"#,
        )
        .unwrap();
        let err = ScenarioConfig::from_raw(raw).unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(err.mentions("model_start"));
    }

    #[test]
    fn test_run_id_defaults_to_zero() {
        let raw: RawScenario = serde_json::from_str(
            r#"{"id": 7, "project": 3, "epsg": 28355, "duration": 60, "boundary": "b.geojson"}"#,
        )
        .unwrap();
        let config = ScenarioConfig::from_raw(raw).unwrap();
        assert_eq!(config.run_id, 0);
        assert_eq!(config.run_label(), "run_3_7_0");
    }

    #[test]
    fn test_all_missing_fields_reported_at_once() {
        let raw: RawScenario = serde_json::from_str("{}").unwrap();
        let err = ScenarioConfig::from_raw(raw).unwrap_err();
        assert_eq!(err.len(), 5);
        for field in ["id", "project", "epsg", "duration", "boundary"] {
            assert!(err.mentions(field), "未报告缺失字段 {field}");
        }
    }

    #[test]
    fn test_missing_duration_names_the_field() {
        let raw: RawScenario = serde_json::from_str(
            r#"{"id": 1, "project": 1, "epsg": "EPSG:28355", "boundary": "b.geojson"}"#,
        )
        .unwrap();
        let err = ScenarioConfig::from_raw(raw).unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(err.mentions("duration"));
    }

    #[test]
    fn test_bad_values_rejected() {
        let raw: RawScenario = serde_json::from_str(
            r#"{
                "id": 1, "project": 1, "epsg": "EPSG:28355",
                "duration": -5, "boundary": "b.geojson",
                "resolution": 0, "ring_tolerance": -1
            }"#,
        )
        .unwrap();
        let err = ScenarioConfig::from_raw(raw).unwrap_err();
        assert_eq!(err.len(), 3);
        assert!(err.mentions("duration"));
        assert!(err.mentions("resolution"));
        assert!(err.mentions("ring_tolerance"));
    }

    #[test]
    fn test_epsg_spellings() {
        assert_eq!(EpsgSpec::Name("EPSG:28355".to_string()).code(), Some(28355));
        assert_eq!(
            EpsgSpec::Name("urn:ogc:def:crs:EPSG::28355".to_string()).code(),
            Some(28355)
        );
        assert_eq!(EpsgSpec::Name("28355".to_string()).code(), Some(28355));
        assert_eq!(EpsgSpec::Code(7856).code(), Some(7856));
        assert_eq!(EpsgSpec::Name("WGS84".to_string()).code(), None);
    }
}
