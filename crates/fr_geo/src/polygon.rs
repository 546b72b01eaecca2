// crates/fr_geo/src/polygon.rs
//! 多边形运算。
//!
//! [`Polygon`] 采用开环表示：首尾顶点不重复，边数等于顶点数。
//! 含点判定为严格内部语义，落在边上的点视为不在多边形内。

use crate::error::{GeoResult, GeometryError};
use crate::geometry::{Bounds, Point2D};
use serde::{Deserialize, Serialize};

/// 点落在线段上的判定容差（米）。
const ON_EDGE_EPS: f64 = 1.0e-9;

/// 简单多边形（开环顶点序列）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    vertices: Vec<Point2D>,
}

impl Polygon {
    /// 由顶点序列创建，若首尾顶点重合则去掉重复的闭合点。
    #[must_use]
    pub fn new(mut vertices: Vec<Point2D>) -> Self {
        if vertices.len() >= 2 {
            let first = vertices[0];
            let last = vertices[vertices.len() - 1];
            if first.distance_squared_to(&last) < ON_EDGE_EPS * ON_EDGE_EPS {
                vertices.pop();
            }
        }
        Self { vertices }
    }

    /// 由 `[x, y]` 数组创建。
    #[must_use]
    pub fn from_coords(coords: &[[f64; 2]]) -> Self {
        Self::new(coords.iter().map(|c| Point2D::from(*c)).collect())
    }

    /// 沿折线铺出的带状多边形，总宽 `width`。
    ///
    /// 顶点处的铺设方向取相邻两段法向的平均，急折处带宽会比
    /// 标称值宽一些。顶点不足两个或宽度非正时返回空多边形。
    #[must_use]
    pub fn strip(points: &[Point2D], width: f64) -> Self {
        let n = points.len();
        if n < 2 || width <= 0.0 || !width.is_finite() {
            return Self::new(Vec::new());
        }
        let segment_dir = |i: usize| -> Point2D {
            let d = points[i + 1] - points[i];
            let len = d.length();
            if len > 0.0 {
                d * (1.0 / len)
            } else {
                Point2D::ZERO
            }
        };
        let half = width / 2.0;
        let mut left = Vec::with_capacity(2 * n);
        let mut right = Vec::with_capacity(n);
        for i in 0..n {
            let ahead = if i + 1 < n {
                segment_dir(i)
            } else {
                segment_dir(i - 1)
            };
            let behind = if i > 0 { segment_dir(i - 1) } else { ahead };
            let mut dir = (ahead + behind) * 0.5;
            if dir.length_squared() < 1.0e-24 {
                dir = ahead;
            }
            let len = dir.length();
            if len > 0.0 {
                dir = dir * (1.0 / len);
            }
            let normal = Point2D::new(-dir.y, dir.x);
            left.push(points[i] + normal * half);
            right.push(points[i] - normal * half);
        }
        right.reverse();
        left.extend(right);
        Self::new(left)
    }

    /// 顶点数。
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// 是否没有顶点。
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// 顶点切片。
    #[inline]
    #[must_use]
    pub fn vertices(&self) -> &[Point2D] {
        &self.vertices
    }

    /// 取出顶点序列。
    #[inline]
    #[must_use]
    pub fn into_vertices(self) -> Vec<Point2D> {
        self.vertices
    }

    /// 第 `i` 条边的两端点，最后一条边回绕到首顶点。
    #[inline]
    #[must_use]
    pub fn edge(&self, i: usize) -> (Point2D, Point2D) {
        let n = self.vertices.len();
        (self.vertices[i % n], self.vertices[(i + 1) % n])
    }

    /// 鞋带公式有符号面积，逆时针为正。
    #[must_use]
    pub fn signed_area(&self) -> f64 {
        let n = self.vertices.len();
        if n < 3 {
            return 0.0;
        }
        let mut sum = 0.0;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            sum += a.x * b.y - b.x * a.y;
        }
        sum / 2.0
    }

    /// 面积绝对值（平方米）。
    #[inline]
    #[must_use]
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// 顶点是否按顺时针排列。
    #[inline]
    #[must_use]
    pub fn is_clockwise(&self) -> bool {
        self.signed_area() < 0.0
    }

    /// 就地反转顶点顺序。
    #[inline]
    pub fn reverse(&mut self) {
        self.vertices.reverse();
    }

    /// 周长（米）。
    #[must_use]
    pub fn perimeter(&self) -> f64 {
        let n = self.vertices.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| {
                let (a, b) = self.edge(i);
                a.distance_to(&b)
            })
            .sum()
    }

    /// 包围盒，空多边形返回 `None`。
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(self.vertices.iter())
    }

    /// 面积加权形心。顶点数不足时退化为顶点均值。
    #[must_use]
    pub fn centroid(&self) -> Point2D {
        let n = self.vertices.len();
        if n == 0 {
            return Point2D::ZERO;
        }
        let area2 = 2.0 * self.signed_area();
        if area2.abs() < 1.0e-12 {
            let sum = self
                .vertices
                .iter()
                .fold(Point2D::ZERO, |acc, p| acc + *p);
            return sum * (1.0 / n as f64);
        }
        let mut cx = 0.0;
        let mut cy = 0.0;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            let w = a.x * b.y - b.x * a.y;
            cx += (a.x + b.x) * w;
            cy += (a.y + b.y) * w;
        }
        Point2D::new(cx / (3.0 * area2), cy / (3.0 * area2))
    }

    /// 严格内部含点判定，边上的点返回 `false`。
    ///
    /// 采用奇偶射线法，水平射线向 +x 方向发射。
    #[must_use]
    pub fn contains(&self, p: &Point2D) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let a = self.vertices[j];
            let b = self.vertices[i];
            if point_on_segment(p, &a, &b) {
                return false;
            }
            if (b.y > p.y) != (a.y > p.y) {
                let t = (p.y - b.y) / (a.y - b.y);
                let x_cross = b.x + t * (a.x - b.x);
                if p.x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// 所有点是否都严格落在多边形内部。
    #[must_use]
    pub fn contains_all(&self, points: &[Point2D]) -> bool {
        points.iter().all(|p| self.contains(p))
    }

    /// 保证落在多边形内部的代表点。
    ///
    /// 先尝试形心，凹多边形形心可能落在外部，此时沿多条水平扫描线
    /// 取最宽跨度的中点。全部失败返回 [`GeometryError::NoInteriorPoint`]。
    pub fn representative_point(&self) -> GeoResult<Point2D> {
        if self.vertices.len() < 3 {
            return Err(GeometryError::NoInteriorPoint);
        }
        let centroid = self.centroid();
        if self.contains(&centroid) {
            return Ok(centroid);
        }
        let bounds = self.bounds().ok_or(GeometryError::NoInteriorPoint)?;
        let height = bounds.height();
        // 扫描线高度依次取形心高度和若干无理数比例，避开顶点共线
        let candidates = [
            centroid.y,
            bounds.min.y + height * 0.5,
            bounds.min.y + height * 0.381_966,
            bounds.min.y + height * 0.618_034,
            bounds.min.y + height * 0.211_325,
            bounds.min.y + height * 0.788_675,
        ];
        for y in candidates {
            if let Some(p) = self.scanline_point(y) {
                return Ok(p);
            }
        }
        Err(GeometryError::NoInteriorPoint)
    }

    /// 高度 `y` 处水平扫描线上最宽内部跨度的中点。
    fn scanline_point(&self, y: f64) -> Option<Point2D> {
        let n = self.vertices.len();
        let mut crossings: Vec<f64> = Vec::new();
        for i in 0..n {
            let (a, b) = self.edge(i);
            if (b.y > y) != (a.y > y) {
                let t = (y - a.y) / (b.y - a.y);
                crossings.push(a.x + t * (b.x - a.x));
            }
        }
        if crossings.len() < 2 {
            return None;
        }
        crossings.sort_by(|a, b| a.total_cmp(b));
        let mut best: Option<(f64, Point2D)> = None;
        for pair in crossings.chunks_exact(2) {
            let width = pair[1] - pair[0];
            let candidate = Point2D::new((pair[0] + pair[1]) / 2.0, y);
            if !self.contains(&candidate) {
                continue;
            }
            if best.map_or(true, |(w, _)| width > w) {
                best = Some((width, candidate));
            }
        }
        best.map(|(_, p)| p)
    }
}

/// 点是否落在线段 `ab` 上（含端点）。
fn point_on_segment(p: &Point2D, a: &Point2D, b: &Point2D) -> bool {
    let ab = *b - *a;
    let ap = *p - *a;
    let cross = ab.cross(&ap);
    let len = ab.length();
    if len == 0.0 {
        return p.distance_to(a) < ON_EDGE_EPS;
    }
    if cross.abs() / len > ON_EDGE_EPS {
        return false;
    }
    let dot = ab.dot(&ap);
    dot >= -ON_EDGE_EPS && dot <= ab.length_squared() + ON_EDGE_EPS
}

/// 单点或点列表两种坐标写法。
///
/// 反序列化时 `[x, y]` 与 `[[x, y], ...]` 都被接受，单点会被
/// 当作只含一个点的列表处理。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoordinateList {
    /// 单个 `[x, y]` 点
    Single([f64; 2]),
    /// 点列表
    Many(Vec<[f64; 2]>),
}

impl CoordinateList {
    /// 展开成点序列。
    #[must_use]
    pub fn points(&self) -> Vec<Point2D> {
        match self {
            CoordinateList::Single(c) => vec![Point2D::from(*c)],
            CoordinateList::Many(cs) => cs.iter().map(|c| Point2D::from(*c)).collect(),
        }
    }

    /// 点数。
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            CoordinateList::Single(_) => 1,
            CoordinateList::Many(cs) => cs.len(),
        }
    }

    /// 是否为空列表。
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 所有点是否都严格落在多边形内部。
    #[must_use]
    pub fn all_inside(&self, polygon: &Polygon) -> bool {
        polygon.contains_all(&self.points())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_100m() -> Polygon {
        Polygon::from_coords(&[
            [321000.0, 5812000.0],
            [321100.0, 5812000.0],
            [321100.0, 5812100.0],
            [321000.0, 5812100.0],
        ])
    }

    #[test]
    fn test_signed_area_and_orientation() {
        let ccw = square_100m();
        assert!((ccw.signed_area() - 10_000.0).abs() < 1.0e-6);
        assert!(!ccw.is_clockwise());

        let mut cw = ccw.clone();
        cw.reverse();
        assert!((cw.signed_area() + 10_000.0).abs() < 1.0e-6);
        assert!(cw.is_clockwise());
    }

    #[test]
    fn test_closed_ring_input_is_deduplicated() {
        let poly = Polygon::from_coords(&[
            [0.0, 0.0],
            [10.0, 0.0],
            [10.0, 10.0],
            [0.0, 10.0],
            [0.0, 0.0],
        ]);
        assert_eq!(poly.len(), 4);
        assert!((poly.area() - 100.0).abs() < 1.0e-9);
    }

    #[test]
    fn test_contains_strict_interior() {
        let poly = square_100m();
        assert!(poly.contains(&Point2D::new(321050.0, 5812050.0)));
        assert!(!poly.contains(&Point2D::new(320000.0, 5812050.0)));
        // 边上与顶点上都不算内部
        assert!(!poly.contains(&Point2D::new(321000.0, 5812050.0)));
        assert!(!poly.contains(&Point2D::new(321000.0, 5812000.0)));
    }

    #[test]
    fn test_contains_concave() {
        // U 形多边形，凹口在上方
        let poly = Polygon::from_coords(&[
            [0.0, 0.0],
            [30.0, 0.0],
            [30.0, 30.0],
            [20.0, 30.0],
            [20.0, 10.0],
            [10.0, 10.0],
            [10.0, 30.0],
            [0.0, 30.0],
        ]);
        assert!(poly.contains(&Point2D::new(5.0, 20.0)));
        assert!(poly.contains(&Point2D::new(25.0, 20.0)));
        assert!(!poly.contains(&Point2D::new(15.0, 20.0)));
    }

    #[test]
    fn test_centroid_square() {
        let c = square_100m().centroid();
        assert!((c.x - 321050.0).abs() < 1.0e-6);
        assert!((c.y - 5812050.0).abs() < 1.0e-6);
    }

    #[test]
    fn test_representative_point_convex() {
        let poly = square_100m();
        let p = poly.representative_point().unwrap();
        assert!(poly.contains(&p));
    }

    #[test]
    fn test_representative_point_concave() {
        // C 形多边形，形心落在凹口里
        let poly = Polygon::from_coords(&[
            [0.0, 0.0],
            [30.0, 0.0],
            [30.0, 8.0],
            [8.0, 8.0],
            [8.0, 22.0],
            [30.0, 22.0],
            [30.0, 30.0],
            [0.0, 30.0],
        ]);
        let centroid = poly.centroid();
        let p = poly.representative_point().unwrap();
        assert!(poly.contains(&p));
        // 确认该形状确实需要回退到扫描线
        if poly.contains(&centroid) {
            assert_eq!(p, centroid);
        }
    }

    #[test]
    fn test_degenerate_polygon_has_no_interior() {
        let line = Polygon::from_coords(&[[0.0, 0.0], [10.0, 0.0]]);
        assert!(!line.contains(&Point2D::new(5.0, 0.0)));
        assert!(line.representative_point().is_err());
    }

    #[test]
    fn test_strip_along_horizontal_line() {
        let band = Polygon::strip(&[Point2D::new(0.0, 0.0), Point2D::new(20.0, 0.0)], 4.0);
        assert_eq!(band.len(), 4);
        assert!((band.area() - 80.0).abs() < 1.0e-9);
        assert!(band.contains(&Point2D::new(10.0, 1.9)));
        assert!(band.contains(&Point2D::new(10.0, -1.9)));
        assert!(!band.contains(&Point2D::new(10.0, 2.1)));
    }

    #[test]
    fn test_strip_follows_bend() {
        let band = Polygon::strip(
            &[
                Point2D::new(0.0, 0.0),
                Point2D::new(10.0, 0.0),
                Point2D::new(10.0, 10.0),
            ],
            2.0,
        );
        assert!(band.contains(&Point2D::new(5.0, 0.5)));
        assert!(band.contains(&Point2D::new(9.5, 5.0)));
        assert!(!band.contains(&Point2D::new(5.0, 5.0)));
    }

    #[test]
    fn test_strip_degenerate_is_empty() {
        assert!(Polygon::strip(&[Point2D::new(1.0, 1.0)], 2.0).is_empty());
        assert!(Polygon::strip(&[Point2D::new(0.0, 0.0), Point2D::new(1.0, 0.0)], 0.0).is_empty());
    }

    #[test]
    fn test_coordinate_list_single_matches_wrapped() {
        let poly = square_100m();
        let single: CoordinateList =
            serde_json::from_str("[321050.0, 5812050.0]").unwrap();
        let wrapped: CoordinateList =
            serde_json::from_str("[[321050.0, 5812050.0]]").unwrap();
        assert_eq!(single.points(), wrapped.points());
        assert!(single.all_inside(&poly));
        assert!(wrapped.all_inside(&poly));
    }

    #[test]
    fn test_coordinate_list_outlier_rejected() {
        let poly = square_100m();
        let list: CoordinateList =
            serde_json::from_str("[[321050.0, 5812050.0], [0.0, 0.0]]").unwrap();
        assert!(!list.all_inside(&poly));
    }
}
