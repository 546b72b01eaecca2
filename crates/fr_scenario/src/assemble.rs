// crates/fr_scenario/src/assemble.rs
//! 域要素装配。
//!
//! 把类型化要素拼成引擎可用的结构：外边界环、糙率查询表、
//! 网格孔洞与加密区。糙率表的次序是固定约定：构筑物高糙率区
//! 最先，人工糙率分区居中，全域缺省值垫底，查询时先到先得。

use crate::features::{BoundaryLine, FrictionPatch, MeshRegion, StructureMethod, StructureShape};
use fr_foundation::defaults::{BUILDING_MANNINGS_N, DEFAULT_MANNINGS_N};
use fr_geo::{BoundaryRing, GeoResult, Point2D, Polygon, RingAssembler};

// ============================================================
// 外边界
// ============================================================

/// 把边界线装配成闭合外边界环。
pub fn assemble_boundary(lines: Vec<BoundaryLine>, tolerance: f64) -> GeoResult<BoundaryRing> {
    let segments: Vec<_> = lines.into_iter().map(BoundaryLine::into_segment).collect();
    RingAssembler::new(tolerance).assemble(&segments)
}

// ============================================================
// 糙率表
// ============================================================

/// 一条糙率表项。`footprint` 为 `None` 表示全域兜底。
#[derive(Debug, Clone, PartialEq)]
pub struct FrictionZone {
    /// 作用范围
    pub footprint: Option<Polygon>,
    /// 曼宁糙率 n
    pub n: f64,
}

/// 有序糙率查询表。
#[derive(Debug, Clone, PartialEq)]
pub struct FrictionTable {
    zones: Vec<FrictionZone>,
}

impl FrictionTable {
    /// 按固定次序建表：Mannings 构筑物、人工糙率分区、全域缺省。
    #[must_use]
    pub fn build(structures: &[StructureShape], patches: &[FrictionPatch]) -> Self {
        let mut zones: Vec<FrictionZone> = Vec::new();
        for shape in structures {
            if shape.method == StructureMethod::Mannings {
                zones.push(FrictionZone {
                    footprint: Some(shape.polygon.clone()),
                    n: BUILDING_MANNINGS_N,
                });
            }
        }
        for patch in patches {
            zones.push(FrictionZone {
                footprint: Some(patch.polygon.clone()),
                n: patch.mannings,
            });
        }
        zones.push(FrictionZone {
            footprint: None,
            n: DEFAULT_MANNINGS_N,
        });
        Self { zones }
    }

    /// 点处的曼宁糙率，从前到后第一个命中的表项生效。
    #[must_use]
    pub fn n_at(&self, point: &Point2D) -> f64 {
        for zone in &self.zones {
            match &zone.footprint {
                None => return zone.n,
                Some(polygon) if polygon.contains(point) => return zone.n,
                Some(_) => {}
            }
        }
        DEFAULT_MANNINGS_N
    }

    /// 表项数，含兜底项。
    #[must_use]
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// 表是否为空。建表后至少含兜底项，恒为 `false`。
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// 全部表项。
    #[must_use]
    pub fn zones(&self) -> &[FrictionZone] {
        &self.zones
    }
}

// ============================================================
// 网格孔洞
// ============================================================

/// 网格孔洞集合：占地、内部种子点与名字一一对应。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HoleSet {
    /// 孔洞占地多边形
    pub footprints: Vec<Polygon>,
    /// 每个孔洞的内部代表点，供网格生成器挖洞
    pub seeds: Vec<Point2D>,
    /// 孔洞名
    pub names: Vec<String>,
}

impl HoleSet {
    /// 收集 Hole 构筑物。找不到内部代表点的构筑物记为违规。
    pub fn build(structures: &[StructureShape]) -> Result<Self, Vec<String>> {
        let mut set = HoleSet::default();
        let mut violations: Vec<String> = Vec::new();
        for (i, shape) in structures.iter().enumerate() {
            if shape.method != StructureMethod::Hole {
                continue;
            }
            let name = shape
                .name
                .clone()
                .unwrap_or_else(|| format!("structure_{i}"));
            match shape.polygon.representative_point() {
                Ok(seed) => {
                    set.footprints.push(shape.polygon.clone());
                    set.seeds.push(seed);
                    set.names.push(name);
                }
                Err(e) => violations.push(format!("构筑物 {name}: {e}")),
            }
        }
        if violations.is_empty() {
            Ok(set)
        } else {
            Err(violations)
        }
    }

    /// 孔洞数。
    #[must_use]
    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    /// 是否没有孔洞。
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }
}

// ============================================================
// 加密区与点位检查
// ============================================================

/// 加密区转成 `(多边形, 分辨率)` 列表。
#[must_use]
pub fn interior_regions(regions: &[MeshRegion]) -> Vec<(Polygon, f64)> {
    regions
        .iter()
        .map(|r| (r.polygon.clone(), r.resolution))
        .collect()
}

/// 加密区中最细的分辨率。
#[must_use]
pub fn finest_region_resolution(regions: &[MeshRegion]) -> Option<f64> {
    regions
        .iter()
        .map(|r| r.resolution)
        .min_by(|a, b| a.total_cmp(b))
}

/// 检查一组多边形的所有顶点都落在外边界内部，返回违规描述。
#[must_use]
pub fn check_polygons_inside(
    what: &str,
    polygons: &[&Polygon],
    boundary: &Polygon,
) -> Vec<String> {
    let mut violations = Vec::new();
    for (i, polygon) in polygons.iter().enumerate() {
        if !boundary.contains_all(polygon.vertices()) {
            violations.push(format!("{what} {i}: 顶点超出外边界范围"));
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use fr_geo::BoundaryKind;

    fn square(x0: f64, y0: f64, side: f64) -> Polygon {
        Polygon::from_coords(&[
            [x0, y0],
            [x0 + side, y0],
            [x0 + side, y0 + side],
            [x0, y0 + side],
        ])
    }

    fn structure(x0: f64, y0: f64, side: f64, method: StructureMethod) -> StructureShape {
        StructureShape {
            polygon: square(x0, y0, side),
            method,
            name: None,
        }
    }

    #[test]
    fn test_assemble_boundary_from_lines() {
        let lines = vec![
            BoundaryLine {
                id: "south".to_string(),
                points: vec![Point2D::new(0.0, 0.0), Point2D::new(100.0, 0.0)],
                kind: BoundaryKind::Transmissive,
                location: fr_geo::SegmentLocation::External,
            },
            BoundaryLine {
                id: "east".to_string(),
                points: vec![Point2D::new(100.0, 0.0), Point2D::new(100.0, 100.0)],
                kind: BoundaryKind::Reflective,
                location: fr_geo::SegmentLocation::External,
            },
            BoundaryLine {
                id: "north".to_string(),
                points: vec![Point2D::new(100.0, 100.0), Point2D::new(0.0, 100.0)],
                kind: BoundaryKind::Transmissive,
                location: fr_geo::SegmentLocation::External,
            },
            BoundaryLine {
                id: "west".to_string(),
                points: vec![Point2D::new(0.0, 100.0), Point2D::new(0.0, 0.0)],
                kind: BoundaryKind::Reflective,
                location: fr_geo::SegmentLocation::External,
            },
        ];
        let ring = assemble_boundary(lines, 1.0e-6).unwrap();
        assert_eq!(ring.n_edges(), 4);
        assert!(ring.polygon().is_clockwise());
    }

    #[test]
    fn test_friction_table_order() {
        let structures = vec![
            structure(10.0, 10.0, 10.0, StructureMethod::Mannings),
            structure(40.0, 40.0, 10.0, StructureMethod::Hole),
        ];
        let patches = vec![FrictionPatch {
            // 覆盖左下 60×60，与构筑物重叠
            polygon: square(0.0, 0.0, 60.0),
            mannings: 0.1,
        }];
        let table = FrictionTable::build(&structures, &patches);
        // Mannings 构筑物 + 分区 + 兜底，Hole 构筑物不进表
        assert_eq!(table.len(), 3);

        // 构筑物内：构筑物高糙率优先于覆盖它的分区
        assert_eq!(table.n_at(&Point2D::new(15.0, 15.0)), BUILDING_MANNINGS_N);
        // 分区内构筑物外
        assert_eq!(table.n_at(&Point2D::new(50.0, 5.0)), 0.1);
        // 全域兜底
        assert_eq!(table.n_at(&Point2D::new(90.0, 90.0)), DEFAULT_MANNINGS_N);
    }

    #[test]
    fn test_friction_table_without_inputs_still_answers() {
        let table = FrictionTable::build(&[], &[]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.n_at(&Point2D::new(0.0, 0.0)), DEFAULT_MANNINGS_N);
    }

    #[test]
    fn test_hole_set_takes_only_hole_structures() {
        let structures = vec![
            structure(10.0, 10.0, 10.0, StructureMethod::Hole),
            structure(30.0, 30.0, 10.0, StructureMethod::Mannings),
            StructureShape {
                polygon: square(50.0, 50.0, 10.0),
                method: StructureMethod::Hole,
                name: Some("depot".to_string()),
            },
        ];
        let holes = HoleSet::build(&structures).unwrap();
        assert_eq!(holes.len(), 2);
        assert_eq!(holes.names, vec!["structure_0".to_string(), "depot".to_string()]);
        for (seed, footprint) in holes.seeds.iter().zip(&holes.footprints) {
            assert!(footprint.contains(seed));
        }
    }

    #[test]
    fn test_degenerate_hole_is_a_violation() {
        let structures = vec![StructureShape {
            polygon: Polygon::from_coords(&[[0.0, 0.0], [10.0, 0.0]]),
            method: StructureMethod::Hole,
            name: Some("sliver".to_string()),
        }];
        let violations = HoleSet::build(&structures).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("sliver"));
    }

    #[test]
    fn test_finest_region_resolution() {
        let regions = vec![
            MeshRegion {
                polygon: square(0.0, 0.0, 10.0),
                resolution: 8.0,
            },
            MeshRegion {
                polygon: square(20.0, 20.0, 10.0),
                resolution: 2.5,
            },
        ];
        assert_eq!(finest_region_resolution(&regions), Some(2.5));
        assert_eq!(finest_region_resolution(&[]), None);
    }

    #[test]
    fn test_check_polygons_inside() {
        let boundary = square(0.0, 0.0, 100.0);
        let inside = square(10.0, 10.0, 20.0);
        let outside = square(90.0, 90.0, 20.0);
        let violations =
            check_polygons_inside("加密区", &[&inside, &outside], &boundary);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("加密区 1"));
    }
}
