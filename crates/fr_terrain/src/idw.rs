// crates/fr_terrain/src/idw.rs

//! 网格顶点近邻查询与反距离加权插值。
//!
//! R-tree 建一次，多个量值共用同一批近邻结果，栅格化每个量值
//! 时不再重复查树。

use fr_foundation::defaults::{IDW_POWER, K_NEAREST_NEIGHBOURS};
use fr_geo::Point2D;
use rstar::{RTree, RTreeObject, AABB};

/// 命中采样点的距离平方阈值 [m²]
const EXACT_HIT_DIST2: f64 = 1e-12;

// ============================================================
// R-tree 条目
// ============================================================

#[derive(Debug, Clone)]
struct VertexEntry {
    position: [f64; 2],
    index: u32,
}

impl RTreeObject for VertexEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl rstar::PointDistance for VertexEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        dx * dx + dy * dy
    }
}

// ============================================================
// 顶点索引
// ============================================================

/// 网格顶点的 R-tree 索引。
pub struct VertexIndex {
    tree: RTree<VertexEntry>,
    n: usize,
}

impl VertexIndex {
    /// 从顶点坐标批量构建。
    #[must_use]
    pub fn build(points: &[Point2D]) -> Self {
        let entries: Vec<VertexEntry> = points
            .iter()
            .enumerate()
            .map(|(i, p)| VertexEntry {
                position: [p.x, p.y],
                index: i as u32,
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
            n: points.len(),
        }
    }

    /// 顶点数。
    #[must_use]
    pub fn len(&self) -> usize {
        self.n
    }

    /// 是否为空。
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// 离 `point` 最近的 `k` 个顶点，(顶点号, 距离平方)，近的在前。
    #[must_use]
    pub fn nearest(&self, point: &Point2D, k: usize) -> Vec<(usize, f64)> {
        let query = [point.x, point.y];
        self.tree
            .nearest_neighbor_iter(&query)
            .take(k)
            .map(|e| {
                let dx = e.position[0] - query[0];
                let dy = e.position[1] - query[1];
                (e.index as usize, dx * dx + dy * dy)
            })
            .collect()
    }

    /// 按默认邻居数与指数在 `point` 处插值 `values`。
    ///
    /// 顶点为空时返回 `None`。
    #[must_use]
    pub fn sample(&self, point: &Point2D, values: &[f64]) -> Option<f64> {
        let neighbors = self.nearest(point, K_NEAREST_NEIGHBOURS);
        idw_over(&neighbors, values)
    }
}

/// 对已查到的近邻做反距离加权。
///
/// 查询点正好落在采样点上时直接返回该点的值。`neighbors` 为
/// (顶点号, 距离平方)。
#[must_use]
pub fn idw_over(neighbors: &[(usize, f64)], values: &[f64]) -> Option<f64> {
    if neighbors.is_empty() {
        return None;
    }
    for &(idx, d2) in neighbors {
        if d2 < EXACT_HIT_DIST2 {
            return Some(values[idx]);
        }
    }

    let half_power = IDW_POWER / 2.0;
    let mut weight_sum = 0.0;
    let mut value_sum = 0.0;
    for &(idx, d2) in neighbors {
        let weight = 1.0 / d2.powf(half_power);
        weight_sum += weight;
        value_sum += weight * values[idx];
    }
    if weight_sum > 0.0 {
        Some(value_sum / weight_sum)
    } else {
        None
    }
}

// ============================================================
// 测试
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn corner_points() -> Vec<Point2D> {
        vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(10.0, 0.0),
            Point2D::new(0.0, 10.0),
            Point2D::new(10.0, 10.0),
        ]
    }

    #[test]
    fn test_nearest_ordering() {
        let index = VertexIndex::build(&corner_points());
        let hits = index.nearest(&Point2D::new(1.0, 1.0), 3);

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].0, 0);
        assert!(hits[0].1 <= hits[1].1 && hits[1].1 <= hits[2].1);
    }

    #[test]
    fn test_exact_hit_returns_sample() {
        let index = VertexIndex::build(&corner_points());
        let values = [5.0, 6.0, 7.0, 8.0];

        let z = index.sample(&Point2D::new(10.0, 0.0), &values).unwrap();
        assert!((z - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_weighting_favours_closer_vertex() {
        let index = VertexIndex::build(&corner_points());
        let values = [0.0, 100.0, 0.0, 0.0];

        // 靠近 (10,0) 的查询点应显著偏向 100
        let near = index.sample(&Point2D::new(9.0, 0.5), &values).unwrap();
        let far = index.sample(&Point2D::new(4.0, 0.5), &values).unwrap();
        assert!(near > far);
        assert!(near > 50.0);
    }

    #[test]
    fn test_equidistant_average() {
        let points = vec![Point2D::new(0.0, 0.0), Point2D::new(2.0, 0.0)];
        let index = VertexIndex::build(&points);
        let z = index.sample(&Point2D::new(1.0, 0.0), &[4.0, 8.0]).unwrap();
        assert!((z - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_index() {
        let index = VertexIndex::build(&[]);
        assert!(index.is_empty());
        assert_eq!(index.sample(&Point2D::ZERO, &[]), None);
    }
}
