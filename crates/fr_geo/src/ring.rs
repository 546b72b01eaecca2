// crates/fr_geo/src/ring.rs
//! 边界环装配。
//!
//! 情景包中的边界以零散线段给出，线段顺序任意、方向任意。
//! [`RingAssembler`] 按端点邻接把外边界线段链接成单一闭合环，
//! 统一为顺时针方向，并为每条环边保留来源线段的边界条件类型。
//! 端点匹配使用可配置容差，略有缝隙的数字化数据也能闭合。

use crate::error::{GeoResult, GeometryError};
use crate::geometry::Point2D;
use crate::polygon::Polygon;
use fr_foundation::defaults::DEFAULT_RING_TOLERANCE_M;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================
// 边界条件类型与线段
// ============================================================

/// 环边上的水力边界条件类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundaryKind {
    /// 透射边界，水流自由流出
    Transmissive,
    /// 反射边界，按固壁处理
    Reflective,
    /// 给定水位边界
    Dirichlet,
}

impl BoundaryKind {
    /// 标签字符串，与情景包中的写法一致。
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            BoundaryKind::Transmissive => "Transmissive",
            BoundaryKind::Reflective => "Reflective",
            BoundaryKind::Dirichlet => "Dirichlet",
        }
    }
}

impl fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoundaryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transmissive" => Ok(BoundaryKind::Transmissive),
            "reflective" => Ok(BoundaryKind::Reflective),
            "dirichlet" => Ok(BoundaryKind::Dirichlet),
            other => Err(format!("未知边界条件类型: {other}")),
        }
    }
}

/// 线段是外边界还是内部构件。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentLocation {
    /// 参与外边界环装配
    External,
    /// 内部线段，不参与装配
    Internal,
}

impl FromStr for SegmentLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "external" => Ok(SegmentLocation::External),
            "internal" => Ok(SegmentLocation::Internal),
            other => Err(format!("未知线段位置: {other}")),
        }
    }
}

/// 一条边界线段及其属性。
#[derive(Debug, Clone, PartialEq)]
pub struct BoundarySegment {
    /// 线段标识，用于错误提示
    pub id: String,
    /// 折线顶点，至少两个
    pub points: Vec<Point2D>,
    /// 边界条件类型
    pub kind: BoundaryKind,
    /// 外边界或内部
    pub location: SegmentLocation,
}

impl BoundarySegment {
    /// 创建外边界线段。
    #[must_use]
    pub fn external(id: impl Into<String>, points: Vec<Point2D>, kind: BoundaryKind) -> Self {
        Self {
            id: id.into(),
            points,
            kind,
            location: SegmentLocation::External,
        }
    }

    /// 首端点。
    #[inline]
    #[must_use]
    pub fn first(&self) -> Point2D {
        self.points[0]
    }

    /// 尾端点。
    #[inline]
    #[must_use]
    pub fn last(&self) -> Point2D {
        self.points[self.points.len() - 1]
    }
}

// ============================================================
// 环装配
// ============================================================

/// 端点邻接式边界环装配器。
#[derive(Debug, Clone, Copy)]
pub struct RingAssembler {
    tolerance: f64,
}

impl Default for RingAssembler {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_RING_TOLERANCE_M,
        }
    }
}

impl RingAssembler {
    /// 指定端点匹配容差（米）创建装配器。
    #[must_use]
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// 当前容差。
    #[inline]
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// 把线段集合装配成闭合边界环。
    ///
    /// 只使用 [`SegmentLocation::External`] 线段。线段输入顺序与折线
    /// 方向均不影响结果：从任意一条线段出发，反复寻找端点与当前链尾
    /// 在容差内重合的未用线段并接上（必要时反转），直至链尾回到链首。
    ///
    /// 错误情形：
    /// - 没有外边界线段 → [`GeometryError::EmptyBoundary`]
    /// - 链无法延伸也未闭合 → [`GeometryError::DanglingSegment`]
    /// - 闭合后仍有剩余线段 → [`GeometryError::MultipleRings`]
    /// - 环退化（顶点少于 3 或面积为零） → [`GeometryError::DegeneratePolygon`]
    pub fn assemble(&self, segments: &[BoundarySegment]) -> GeoResult<BoundaryRing> {
        let external: Vec<&BoundarySegment> = segments
            .iter()
            .filter(|s| s.location == SegmentLocation::External)
            .collect();
        if external.is_empty() {
            return Err(GeometryError::EmptyBoundary);
        }
        for seg in &external {
            for p in &seg.points {
                if !p.is_finite() {
                    return Err(GeometryError::invalid(p.x, p.y));
                }
            }
        }

        let mut chain: Vec<Point2D> = Vec::new();
        let mut edge_kinds: Vec<BoundaryKind> = Vec::new();
        let mut used = vec![false; external.len()];

        self.append_segment(&mut chain, &mut edge_kinds, external[0], false);
        used[0] = true;

        loop {
            let head = chain[0];
            let tail = chain[chain.len() - 1];
            let closed = chain.len() > 2 && self.matches(&tail, &head);
            if closed {
                break;
            }

            let next = external.iter().enumerate().find_map(|(i, seg)| {
                if used[i] {
                    return None;
                }
                if self.matches(&seg.first(), &tail) {
                    Some((i, false))
                } else if self.matches(&seg.last(), &tail) {
                    Some((i, true))
                } else {
                    None
                }
            });

            match next {
                Some((i, reversed)) => {
                    self.append_segment(&mut chain, &mut edge_kinds, external[i], reversed);
                    used[i] = true;
                }
                None => {
                    return Err(GeometryError::dangling(tail.x, tail.y, self.tolerance));
                }
            }
        }

        let leftover = used.iter().filter(|u| !**u).count();
        if leftover > 0 {
            return Err(GeometryError::MultipleRings { count: leftover });
        }

        // 闭合：去掉与链首重合的链尾点，环边数与顶点数相等
        chain.pop();
        if chain.len() < 3 {
            return Err(GeometryError::degenerate(chain.len(), 0.0));
        }
        debug_assert_eq!(chain.len(), edge_kinds.len());

        let mut polygon = Polygon::new(chain);
        if polygon.len() < 3 || polygon.area() <= self.tolerance * self.tolerance {
            return Err(GeometryError::degenerate(polygon.len(), polygon.area()));
        }

        // 统一为顺时针：反转顶点后，边标签按映射 j -> (n-2-j) mod n 重排
        if !polygon.is_clockwise() {
            polygon.reverse();
            let n = edge_kinds.len();
            let mut reversed_kinds = vec![edge_kinds[0]; n];
            for (j, slot) in reversed_kinds.iter_mut().enumerate() {
                *slot = edge_kinds[(2 * n - 2 - j) % n];
            }
            edge_kinds = reversed_kinds;
        }

        // 旋转到字典序最小的顶点，装配结果与线段输入顺序无关
        let start = polygon
            .vertices()
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)))
            .map(|(i, _)| i)
            .unwrap_or(0);
        if start > 0 {
            let mut verts = polygon.into_vertices();
            verts.rotate_left(start);
            edge_kinds.rotate_left(start);
            polygon = Polygon::new(verts);
        }

        Ok(BoundaryRing {
            polygon,
            edge_kinds,
        })
    }

    /// 两端点是否在容差内重合。
    #[inline]
    fn matches(&self, a: &Point2D, b: &Point2D) -> bool {
        a.distance_squared_to(b) <= self.tolerance * self.tolerance
    }

    /// 把线段折线接到链尾，首条线段整体压入，后续线段跳过共享端点。
    fn append_segment(
        &self,
        chain: &mut Vec<Point2D>,
        edge_kinds: &mut Vec<BoundaryKind>,
        segment: &BoundarySegment,
        reversed: bool,
    ) {
        let mut pts: Vec<Point2D> = segment.points.clone();
        if reversed {
            pts.reverse();
        }
        let skip = usize::from(!chain.is_empty());
        for p in pts.into_iter().skip(skip) {
            chain.push(p);
            if chain.len() > 1 {
                edge_kinds.push(segment.kind);
            }
        }
        if skip == 0 {
            // 首条线段：边数等于点数减一
            debug_assert_eq!(edge_kinds.len() + 1, chain.len());
        }
    }
}

// ============================================================
// 装配结果
// ============================================================

/// 闭合的带标签边界环。
///
/// 顶点为顺时针开环表示，`edge_kinds[i]` 是顶点 `i` 到顶点
/// `(i + 1) % n` 这条边的边界条件类型，长度与顶点数相等。
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryRing {
    polygon: Polygon,
    edge_kinds: Vec<BoundaryKind>,
}

impl BoundaryRing {
    /// 环多边形（顺时针）。
    #[inline]
    #[must_use]
    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }

    /// 环边数，与顶点数相等。
    #[inline]
    #[must_use]
    pub fn n_edges(&self) -> usize {
        self.edge_kinds.len()
    }

    /// 第 `i` 条边的边界条件类型。
    #[inline]
    #[must_use]
    pub fn kind_of_edge(&self, i: usize) -> BoundaryKind {
        self.edge_kinds[i]
    }

    /// 全部边标签。
    #[inline]
    #[must_use]
    pub fn edge_kinds(&self) -> &[BoundaryKind] {
        &self.edge_kinds
    }

    /// 按标签分组的边索引表。
    ///
    /// 每条边恰好出现在一个分组中，各分组索引数之和等于边数。
    #[must_use]
    pub fn tag_groups(&self) -> BTreeMap<String, Vec<usize>> {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, kind) in self.edge_kinds.iter().enumerate() {
            groups
                .entry(kind.as_str().to_string())
                .or_default()
                .push(i);
        }
        groups
    }

    /// 拆出多边形与边标签。
    #[must_use]
    pub fn into_parts(self) -> (Polygon, Vec<BoundaryKind>) {
        (self.polygon, self.edge_kinds)
    }
}
