// crates/fr_scenario/src/features.rs
//! 带类型的领域要素。
//!
//! 把 [`crate::geojson`] 的原始要素转成边界线、糙率分区、入流、
//! 构筑物与网格加密区等记录。每个转换函数返回违规描述字符串
//! 而不是硬错误，由上层汇总成一份完整的校验报告。

use crate::geojson::Feature;
use fr_geo::{BoundaryKind, BoundarySegment, Point2D, Polygon, SegmentLocation};
use serde_json::Value;
use std::str::FromStr;

// ============================================================
// 边界线
// ============================================================

/// 一条带边界条件的边界线。
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryLine {
    /// 线标识
    pub id: String,
    /// 折线顶点
    pub points: Vec<Point2D>,
    /// 边界条件类型
    pub kind: BoundaryKind,
    /// 外边界或内部线
    pub location: SegmentLocation,
}

impl BoundaryLine {
    /// 从 GeoJSON 要素转换。
    pub fn from_feature(index: usize, feature: &Feature) -> Result<Self, String> {
        let points = feature
            .geometry
            .as_linestring()
            .ok_or_else(|| format!("要素 {index}: 边界要素必须是 LineString"))?;
        let kind_text = feature
            .property_str("boundary")
            .ok_or_else(|| format!("要素 {index}: 缺少 boundary 属性"))?;
        let kind = BoundaryKind::from_str(&kind_text)
            .map_err(|e| format!("要素 {index}: {e}"))?;
        let location = match feature.property_str("location") {
            None => SegmentLocation::External,
            Some(text) => SegmentLocation::from_str(&text)
                .map_err(|e| format!("要素 {index}: {e}"))?,
        };
        let id = feature
            .property_str("id")
            .unwrap_or_else(|| format!("boundary_{index}"));
        Ok(Self {
            id,
            points,
            kind,
            location,
        })
    }

    /// 转成装配器输入。
    #[must_use]
    pub fn into_segment(self) -> BoundarySegment {
        BoundarySegment {
            id: self.id,
            points: self.points,
            kind: self.kind,
            location: self.location,
        }
    }
}

// ============================================================
// 糙率分区
// ============================================================

/// 一块人工指定曼宁系数的区域。
#[derive(Debug, Clone, PartialEq)]
pub struct FrictionPatch {
    /// 区域多边形
    pub polygon: Polygon,
    /// 曼宁糙率 n
    pub mannings: f64,
}

impl FrictionPatch {
    /// 从 GeoJSON 要素转换。
    pub fn from_feature(index: usize, feature: &Feature) -> Result<Self, String> {
        let polygon = feature
            .geometry
            .as_polygon()
            .ok_or_else(|| format!("要素 {index}: 糙率要素必须是 Polygon"))?;
        let mannings = feature
            .property_f64("mannings")
            .ok_or_else(|| format!("要素 {index}: 缺少 mannings 属性"))?;
        if !mannings.is_finite() || mannings <= 0.0 {
            return Err(format!("要素 {index}: mannings 必须为正数，实际为 {mannings}"));
        }
        Ok(Self { polygon, mannings })
    }
}

// ============================================================
// 入流
// ============================================================

/// 入流类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InflowKind {
    /// 降雨，速率单位 mm/h，按面积摊成水深增量
    Rainfall,
    /// 地表入流，速率单位 m³/s，摊在要素占地上
    Surface,
}

impl FromStr for InflowKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rainfall" => Ok(InflowKind::Rainfall),
            "surface" => Ok(InflowKind::Surface),
            other => Err(format!("未知入流类型: {other}")),
        }
    }
}

/// 随时间变化的速率：常数或折线时序。
#[derive(Debug, Clone, PartialEq)]
pub enum RateSeries {
    /// 全程常数
    Constant(f64),
    /// `(时间秒, 速率)` 折线，按时间升序
    Series(Vec<(f64, f64)>),
}

impl RateSeries {
    /// 从属性值解析。接受数字、数字字符串或 `[[t, v], ...]` 数组。
    pub fn parse(value: &Value) -> Result<Self, String> {
        match value {
            Value::Number(n) => n
                .as_f64()
                .map(RateSeries::Constant)
                .ok_or_else(|| "data: 数值超出 f64 范围".to_string()),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(RateSeries::Constant)
                .map_err(|_| format!("data: 无法解析速率 {s:?}")),
            Value::Array(items) => {
                let mut series: Vec<(f64, f64)> = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let pair = item
                        .as_array()
                        .filter(|p| p.len() == 2)
                        .ok_or_else(|| format!("data[{i}]: 期望 [时间, 速率] 二元组"))?;
                    let t = pair[0]
                        .as_f64()
                        .ok_or_else(|| format!("data[{i}]: 时间必须是数字"))?;
                    let v = pair[1]
                        .as_f64()
                        .ok_or_else(|| format!("data[{i}]: 速率必须是数字"))?;
                    series.push((t, v));
                }
                if series.is_empty() {
                    return Err("data: 时序不能为空".to_string());
                }
                series.sort_by(|a, b| a.0.total_cmp(&b.0));
                Ok(RateSeries::Series(series))
            }
            other => Err(format!("data: 不支持的取值 {other}")),
        }
    }

    /// 时刻 `t` 的速率。时序两端之外取端点值，中间线性插值。
    #[must_use]
    pub fn rate_at(&self, t: f64) -> f64 {
        match self {
            RateSeries::Constant(v) => *v,
            RateSeries::Series(points) => {
                let first = points[0];
                let last = points[points.len() - 1];
                if t <= first.0 {
                    return first.1;
                }
                if t >= last.0 {
                    return last.1;
                }
                for window in points.windows(2) {
                    let (t0, v0) = window[0];
                    let (t1, v1) = window[1];
                    if t >= t0 && t <= t1 {
                        if t1 == t0 {
                            return v1;
                        }
                        let frac = (t - t0) / (t1 - t0);
                        return v0 + (v1 - v0) * frac;
                    }
                }
                last.1
            }
        }
    }
}

/// 入流的作用几何。
///
/// 面状要素直接圈定摊铺范围；线状和点状要素在建域时按网格
/// 尺寸铺成带状或方块。
#[derive(Debug, Clone, PartialEq)]
pub enum InflowGeometry {
    /// 面状要素
    Region(Polygon),
    /// 线状要素
    Line(Vec<Point2D>),
    /// 点状要素
    Point(Point2D),
}

impl InflowGeometry {
    /// 按给定铺设宽度合成摊铺多边形。
    #[must_use]
    pub fn footprint(&self, width: f64) -> Polygon {
        match self {
            InflowGeometry::Region(polygon) => polygon.clone(),
            InflowGeometry::Line(points) => Polygon::strip(points, width),
            InflowGeometry::Point(center) => {
                let h = width / 2.0;
                Polygon::new(vec![
                    Point2D::new(center.x - h, center.y - h),
                    Point2D::new(center.x + h, center.y - h),
                    Point2D::new(center.x + h, center.y + h),
                    Point2D::new(center.x - h, center.y + h),
                ])
            }
        }
    }

    /// 要素自身的面积，线与点为零。
    #[must_use]
    pub fn area(&self) -> f64 {
        match self {
            InflowGeometry::Region(polygon) => polygon.area(),
            _ => 0.0,
        }
    }

    /// 定义几何的顶点。
    #[must_use]
    pub fn points(&self) -> &[Point2D] {
        match self {
            InflowGeometry::Region(polygon) => polygon.vertices(),
            InflowGeometry::Line(points) => points,
            InflowGeometry::Point(point) => std::slice::from_ref(point),
        }
    }
}

/// 一处入流要素。
#[derive(Debug, Clone, PartialEq)]
pub struct InflowPatch {
    /// 作用几何
    pub geometry: InflowGeometry,
    /// 入流类型
    pub kind: InflowKind,
    /// 速率时序，单位由 [`InflowKind`] 决定
    pub rate: RateSeries,
}

impl InflowPatch {
    /// 从 GeoJSON 要素转换。
    pub fn from_feature(index: usize, feature: &Feature) -> Result<Self, String> {
        let geometry = if let Some(polygon) = feature.geometry.as_polygon() {
            InflowGeometry::Region(polygon)
        } else if let Some(line) = feature.geometry.as_linestring() {
            InflowGeometry::Line(line)
        } else if let Some(point) = feature.geometry.as_point() {
            InflowGeometry::Point(point)
        } else {
            return Err(format!(
                "要素 {index}: 入流几何 {} 无法解析",
                feature.geometry.type_name()
            ));
        };
        let kind = match feature.property_str("type") {
            None => InflowKind::Rainfall,
            Some(text) => {
                InflowKind::from_str(&text).map_err(|e| format!("要素 {index}: {e}"))?
            }
        };
        let data = feature
            .property("data")
            .ok_or_else(|| format!("要素 {index}: 缺少 data 属性"))?;
        let rate = RateSeries::parse(data).map_err(|e| format!("要素 {index}: {e}"))?;
        Ok(Self {
            geometry,
            kind,
            rate,
        })
    }
}

// ============================================================
// 构筑物
// ============================================================

/// 构筑物在网格中的处理方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureMethod {
    /// 从网格中挖出孔洞
    Hole,
    /// 按高糙率区处理
    Mannings,
    /// 抬升地形栅格
    Elevation,
}

impl FromStr for StructureMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // 旧情景包写 Holes 与 Reflective，继续接受
        match s.trim().to_ascii_lowercase().as_str() {
            "hole" | "holes" => Ok(StructureMethod::Hole),
            "mannings" => Ok(StructureMethod::Mannings),
            "elevation" | "reflective" => Ok(StructureMethod::Elevation),
            other => Err(format!("未知构筑物处理方式: {other}")),
        }
    }
}

/// 一座构筑物。
#[derive(Debug, Clone, PartialEq)]
pub struct StructureShape {
    /// 占地多边形
    pub polygon: Polygon,
    /// 处理方式
    pub method: StructureMethod,
    /// 名称，缺省时由装配阶段编号生成
    pub name: Option<String>,
}

impl StructureShape {
    /// 从 GeoJSON 要素转换。
    pub fn from_feature(index: usize, feature: &Feature) -> Result<Self, String> {
        let polygon = feature
            .geometry
            .as_polygon()
            .ok_or_else(|| format!("要素 {index}: 构筑物要素必须是 Polygon"))?;
        let method_text = feature
            .property_str("method")
            .ok_or_else(|| format!("要素 {index}: 缺少 method 属性"))?;
        let method = StructureMethod::from_str(&method_text)
            .map_err(|e| format!("要素 {index}: {e}"))?;
        Ok(Self {
            polygon,
            method,
            name: feature.property_str("name"),
        })
    }
}

// ============================================================
// 网格加密区
// ============================================================

/// 一块指定分辨率的网格加密区。
#[derive(Debug, Clone, PartialEq)]
pub struct MeshRegion {
    /// 区域多边形
    pub polygon: Polygon,
    /// 目标分辨率（米）
    pub resolution: f64,
}

impl MeshRegion {
    /// 从 GeoJSON 要素转换。
    pub fn from_feature(index: usize, feature: &Feature) -> Result<Self, String> {
        let polygon = feature
            .geometry
            .as_polygon()
            .ok_or_else(|| format!("要素 {index}: 加密区要素必须是 Polygon"))?;
        let resolution = feature
            .property_f64("resolution")
            .ok_or_else(|| format!("要素 {index}: 缺少 resolution 属性"))?;
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(format!(
                "要素 {index}: resolution 必须为正数米，实际为 {resolution}"
            ));
        }
        Ok(Self {
            polygon,
            resolution,
        })
    }
}
