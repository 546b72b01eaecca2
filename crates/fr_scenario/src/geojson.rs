// crates/fr_scenario/src/geojson.rs
//! 宽松的 GeoJSON 读取。
//!
//! 只解析情景包用到的子集：`FeatureCollection` 下的 Point、
//! LineString 与 Polygon。坐标按任意维度读入，只取前两维；
//! 属性保留原始 JSON 值，由上层按需取用。GIS 软件导出的数值
//! 属性经常写成字符串，取数接口两种写法都接受。

use fr_geo::{Point2D, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// GeoJSON 要素集合。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    /// 固定为 `"FeatureCollection"`
    #[serde(rename = "type")]
    pub kind: String,
    /// 图层名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// 坐标系声明
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<Crs>,
    /// 要素列表
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// 从文件读取。
    pub fn from_path(path: &Path) -> Result<Self, crate::ScenarioError> {
        let text = fs::read_to_string(path)
            .map_err(|e| crate::ScenarioError::io(path.to_path_buf(), e))?;
        serde_json::from_str(&text).map_err(|e| crate::ScenarioError::json(path.to_path_buf(), e))
    }

    /// 声明的 EPSG 代码，没有 CRS 或无法解析时为 `None`。
    #[must_use]
    pub fn epsg(&self) -> Option<u32> {
        self.crs.as_ref().and_then(Crs::epsg)
    }
}

/// 坐标系声明，兼容 `EPSG:28355` 与 `urn:ogc:def:crs:EPSG::28355` 写法。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crs {
    /// CRS 属性
    pub properties: CrsProperties,
}

/// CRS 名字段。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrsProperties {
    /// 坐标系名
    pub name: String,
}

impl Crs {
    /// 提取 EPSG 代码。
    #[must_use]
    pub fn epsg(&self) -> Option<u32> {
        self.properties
            .name
            .rsplit(':')
            .next()
            .and_then(|tail| tail.trim().parse::<u32>().ok())
    }
}

/// 单个要素。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    /// 固定为 `"Feature"`
    #[serde(rename = "type")]
    pub kind: String,
    /// 几何体
    pub geometry: Geometry,
    /// 属性表
    #[serde(default)]
    pub properties: serde_json::Map<String, Value>,
}

impl Feature {
    /// 字符串属性，数值属性也按其十进制写法返回。
    #[must_use]
    pub fn property_str(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// 数值属性，接受 JSON 数字与数字字符串两种写法。
    #[must_use]
    pub fn property_f64(&self, key: &str) -> Option<f64> {
        match self.properties.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// 原始属性值。
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// 几何体，坐标维度不限，使用时只取前两维。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    /// 单点
    Point {
        /// `[x, y, ...]`
        coordinates: Vec<f64>,
    },
    /// 折线
    LineString {
        /// 顶点序列
        coordinates: Vec<Vec<f64>>,
    },
    /// 多边形，首环为外环，内环忽略
    Polygon {
        /// 环序列
        coordinates: Vec<Vec<Vec<f64>>>,
    },
}

impl Geometry {
    /// 作为单点。
    #[must_use]
    pub fn as_point(&self) -> Option<Point2D> {
        match self {
            Geometry::Point { coordinates } if coordinates.len() >= 2 => {
                Some(Point2D::new(coordinates[0], coordinates[1]))
            }
            _ => None,
        }
    }

    /// 作为折线顶点序列，至少两个顶点才算折线。
    #[must_use]
    pub fn as_linestring(&self) -> Option<Vec<Point2D>> {
        match self {
            Geometry::LineString { coordinates } if coordinates.len() >= 2 => coordinates
                .iter()
                .map(|c| {
                    if c.len() >= 2 {
                        Some(Point2D::new(c[0], c[1]))
                    } else {
                        None
                    }
                })
                .collect(),
            _ => None,
        }
    }

    /// 作为多边形，取外环。
    #[must_use]
    pub fn as_polygon(&self) -> Option<Polygon> {
        match self {
            Geometry::Polygon { coordinates } => {
                let exterior = coordinates.first()?;
                let points: Option<Vec<Point2D>> = exterior
                    .iter()
                    .map(|c| {
                        if c.len() >= 2 {
                            Some(Point2D::new(c[0], c[1]))
                        } else {
                            None
                        }
                    })
                    .collect();
                let polygon = Polygon::new(points?);
                if polygon.len() >= 3 {
                    Some(polygon)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// 几何类型名。
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point { .. } => "Point",
            Geometry::LineString { .. } => "LineString",
            Geometry::Polygon { .. } => "Polygon",
        }
    }
}
