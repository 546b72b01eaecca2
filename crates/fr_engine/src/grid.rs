// crates/fr_engine/src/grid.rs
//! 规则网格扩散波求解器。
//!
//! 把边界环的包围盒划成边长 `resolution` 的方格，外边界外与
//! 孔洞内的单元标记为不活动。水深用显式扩散波格式演进：相邻
//! 单元按曼宁公式过流，时间步长由 CFL 条件控制。环边的边界
//! 条件映射到缺邻单元上：透射边自由出流，给定水位边与虚拟
//! 定水位单元过流，反射边不过流。
//!
//! 求解器按行带切分为若干分片。分片在同步门之间各自演进，
//! 门处交换带缘水深，带缝通量用冻结的邻带数据近似。

use crate::domain::{DomainSpec, PiecewiseRate};
use crate::engine::{
    is_wet, FrameGeometry, FrameSlice, HaloData, MeshSummary, RankEngine, StepStats,
};
use crate::error::{EngineError, EngineResult};
use fr_foundation::defaults::MIN_ALLOWED_HEIGHT_M;
use fr_geo::{BoundaryKind, Point2D};
use std::sync::Arc;

/// 重力加速度（m/s²）。
const GRAVITY: f64 = 9.81;
/// 网格单元数上限。
const MAX_CELLS: usize = 20_000_000;
/// 内部时间步长下限（秒）。
const MIN_DT_S: f64 = 1.0e-3;
/// 内部时间步长上限（秒）。
const MAX_DT_S: f64 = 30.0;
/// CFL 分母的速度下限（m/s），全干时避免步长发散。
const SPEED_FLOOR_MS: f64 = 0.1;

// ============================================================
// 静态网格
// ============================================================

/// 建网结果，所有分片共享的只读部分。
#[derive(Debug)]
struct GridGeometry {
    nx: usize,
    ny: usize,
    dx: f64,
    origin: Point2D,
    /// 单元是否参与计算，行优先
    active: Vec<bool>,
    /// 单元是否被孔洞挖掉（在边界内但不活动）
    hole: Vec<bool>,
    /// 单元中心高程（米）
    elevation: Vec<f64>,
    /// 单元曼宁糙率
    friction: Vec<f64>,
    /// 缺邻活动单元的边界条件，其余为 `None`
    boundary_kind: Vec<Option<BoundaryKind>>,
    /// 源项：速率曲线与作用单元
    sources: Vec<(PiecewiseRate, Vec<u32>)>,
    /// 每行活动单元数的前缀和，长度 `ny + 1`
    row_active_offsets: Vec<usize>,
    active_cells: usize,
    hole_cells: usize,
    region_count: usize,
    dirichlet_stage: f64,
    cfl: f64,
}

impl GridGeometry {
    #[inline]
    fn idx(&self, row: usize, col: usize) -> usize {
        row * self.nx + col
    }

    #[inline]
    fn center(&self, row: usize, col: usize) -> Point2D {
        Point2D::new(
            self.origin.x + (col as f64 + 0.5) * self.dx,
            self.origin.y + (row as f64 + 0.5) * self.dx,
        )
    }

    #[inline]
    fn cell_area(&self) -> f64 {
        self.dx * self.dx
    }

    /// 某行范围内的活动单元数。
    fn active_in_rows(&self, row0: usize, row1: usize) -> usize {
        self.row_active_offsets[row1] - self.row_active_offsets[row0]
    }
}

// ============================================================
// 引擎（建网与切分）
// ============================================================

/// 规则网格求解器：负责建网、摘要与行带切分。
#[derive(Debug)]
pub struct UniformGridEngine {
    geometry: Arc<GridGeometry>,
}

impl UniformGridEngine {
    /// 按域描述建网。
    pub fn from_spec(spec: &DomainSpec) -> EngineResult<Self> {
        if !spec.resolution.is_finite() || spec.resolution <= 0.0 {
            return Err(EngineError::invalid_domain(format!(
                "分辨率必须为正数米，实际为 {}",
                spec.resolution
            )));
        }
        let polygon = spec.boundary.polygon();
        let bounds = polygon
            .bounds()
            .ok_or_else(|| EngineError::invalid_domain("边界环没有顶点".to_string()))?;
        let dx = spec.resolution;
        let nx = (bounds.width() / dx).ceil().max(1.0) as usize;
        let ny = (bounds.height() / dx).ceil().max(1.0) as usize;
        if nx.saturating_mul(ny) > MAX_CELLS {
            return Err(EngineError::TooManyCells {
                nx,
                ny,
                limit: MAX_CELLS,
            });
        }

        let n = nx * ny;
        let mut active = vec![false; n];
        let mut hole = vec![false; n];
        let mut elevation = vec![0.0; n];
        let mut friction = vec![0.0; n];
        let mut hole_cells = 0usize;
        let origin = bounds.min;

        for row in 0..ny {
            for col in 0..nx {
                let i = row * nx + col;
                let center = Point2D::new(
                    origin.x + (col as f64 + 0.5) * dx,
                    origin.y + (row as f64 + 0.5) * dx,
                );
                if !polygon.contains(&center) {
                    continue;
                }
                if spec.holes.iter().any(|h| h.contains(&center)) {
                    hole[i] = true;
                    hole_cells += 1;
                    continue;
                }
                active[i] = true;
                elevation[i] = (spec.elevation)(&center);
                friction[i] = (spec.friction)(&center).max(1.0e-4);
            }
        }

        let active_cells = active.iter().filter(|a| **a).count();
        if active_cells == 0 {
            return Err(EngineError::invalid_domain(
                "边界内没有活动单元，检查分辨率与边界范围".to_string(),
            ));
        }

        let mut row_active_offsets = vec![0usize; ny + 1];
        for row in 0..ny {
            let in_row = (0..nx).filter(|&c| active[row * nx + c]).count();
            row_active_offsets[row + 1] = row_active_offsets[row] + in_row;
        }

        let mut geometry = GridGeometry {
            nx,
            ny,
            dx,
            origin,
            active,
            hole,
            elevation,
            friction,
            boundary_kind: vec![None; n],
            sources: Vec::new(),
            row_active_offsets,
            active_cells,
            hole_cells,
            region_count: spec.interior_regions.len(),
            dirichlet_stage: spec.dirichlet_stage,
            cfl: spec.cfl,
        };
        assign_boundary_kinds(&mut geometry, spec);
        assign_sources(&mut geometry, spec);

        tracing::info!(
            nx,
            ny,
            dx,
            active = geometry.active_cells,
            holes = geometry.hole_cells,
            "uniform grid built"
        );
        Ok(Self {
            geometry: Arc::new(geometry),
        })
    }

    /// 网格摘要。
    #[must_use]
    pub fn mesh_summary(&self) -> MeshSummary {
        MeshSummary {
            nx: self.geometry.nx,
            ny: self.geometry.ny,
            cell_size_m: self.geometry.dx,
            active_cells: self.geometry.active_cells,
            hole_cells: self.geometry.hole_cells,
            region_count: self.geometry.region_count,
        }
    }

    /// 活动单元的静态几何。
    #[must_use]
    pub fn frame_geometry(&self) -> FrameGeometry {
        let geo = &self.geometry;
        let mut points = Vec::with_capacity(geo.active_cells);
        let mut elevation = Vec::with_capacity(geo.active_cells);
        for row in 0..geo.ny {
            for col in 0..geo.nx {
                let i = geo.idx(row, col);
                if geo.active[i] {
                    points.push(geo.center(row, col));
                    elevation.push(geo.elevation[i]);
                }
            }
        }
        FrameGeometry { points, elevation }
    }

    /// CFL 数。
    #[must_use]
    pub fn cfl(&self) -> f64 {
        self.geometry.cfl
    }

    /// 活动单元数。
    #[must_use]
    pub fn n_active(&self) -> usize {
        self.geometry.active_cells
    }

    /// 按行带切成 `ranks` 个分片，按活动单元数均衡行数。
    pub fn partition(&self, ranks: usize) -> EngineResult<Vec<Box<dyn RankEngine>>> {
        let geo = &self.geometry;
        if ranks == 0 || ranks > geo.ny {
            return Err(EngineError::BadPartition {
                rows: geo.ny,
                ranks,
            });
        }
        let total = geo.active_cells as f64;
        let mut bands: Vec<(usize, usize)> = Vec::with_capacity(ranks);
        let mut row = 0usize;
        for r in 0..ranks {
            let target = total * (r + 1) as f64 / ranks as f64;
            let mut end = row + 1;
            while end < geo.ny && (geo.row_active_offsets[end] as f64) < target {
                end += 1;
            }
            // 给后续分片留足行数
            let remaining_ranks = ranks - r - 1;
            let max_end = geo.ny - remaining_ranks;
            let end = end.min(max_end).max(row + 1);
            bands.push((row, end));
            row = end;
        }
        if let Some(last) = bands.last_mut() {
            last.1 = geo.ny;
        }

        let engines = bands
            .into_iter()
            .enumerate()
            .map(|(rank, (row0, row1))| {
                Box::new(GridRank::new(Arc::clone(&self.geometry), rank, row0, row1))
                    as Box<dyn RankEngine>
            })
            .collect();
        Ok(engines)
    }
}

/// 给临外活动单元找最近的环边，继承其边界条件。
/// 孔洞面是固壁，不算临外。
fn assign_boundary_kinds(geometry: &mut GridGeometry, spec: &DomainSpec) {
    let ring = &spec.boundary;
    let polygon = ring.polygon();
    let (nx, ny) = (geometry.nx, geometry.ny);
    for row in 0..ny {
        for col in 0..nx {
            let i = geometry.idx(row, col);
            if !geometry.active[i] {
                continue;
            }
            let missing_neighbour = [
                (row > 0).then(|| geometry.idx(row - 1, col)),
                (row + 1 < ny).then(|| geometry.idx(row + 1, col)),
                (col > 0).then(|| geometry.idx(row, col - 1)),
                (col + 1 < nx).then(|| geometry.idx(row, col + 1)),
            ]
            .into_iter()
            .any(|n| match n {
                None => true,
                Some(j) => !geometry.active[j] && !geometry.hole[j],
            });
            if !missing_neighbour {
                continue;
            }
            let center = geometry.center(row, col);
            let mut best: Option<(f64, BoundaryKind)> = None;
            for e in 0..ring.n_edges() {
                let (a, b) = polygon.edge(e);
                let d = center.distance_to_segment(&a, &b);
                if best.map_or(true, |(bd, _)| d < bd) {
                    best = Some((d, ring.kind_of_edge(e)));
                }
            }
            geometry.boundary_kind[i] = best.map(|(_, k)| k);
        }
    }
}

/// 源项映射到作用单元。
fn assign_sources(geometry: &mut GridGeometry, spec: &DomainSpec) {
    for source in &spec.sources {
        let mut cells: Vec<u32> = Vec::new();
        for row in 0..geometry.ny {
            for col in 0..geometry.nx {
                let i = geometry.idx(row, col);
                if geometry.active[i] && source.footprint.contains(&geometry.center(row, col)) {
                    cells.push(i as u32);
                }
            }
        }
        if cells.is_empty() {
            tracing::warn!("source footprint covers no active cell");
        }
        geometry.sources.push((source.rate.clone(), cells));
    }
}

// ============================================================
// 分片
// ============================================================

/// 一个行带分片。
///
/// 水深数组比行带多两行：下标 0 是下邻带缘（全局行 `row0 - 1`），
/// 最后一行是上邻带缘（全局行 `row1`）。速度数组只覆盖本带。
struct GridRank {
    geo: Arc<GridGeometry>,
    rank: usize,
    row0: usize,
    row1: usize,
    depth: Vec<f64>,
    vel_u: Vec<f64>,
    vel_v: Vec<f64>,
    time: f64,
}

impl GridRank {
    fn new(geo: Arc<GridGeometry>, rank: usize, row0: usize, row1: usize) -> Self {
        let nx = geo.nx;
        let rows = row1 - row0;
        Self {
            geo,
            rank,
            row0,
            row1,
            depth: vec![0.0; (rows + 2) * nx],
            vel_u: vec![0.0; rows * nx],
            vel_v: vec![0.0; rows * nx],
            time: 0.0,
        }
    }

    /// 全局行号到水深数组行号。
    #[inline]
    fn depth_row(&self, global_row: usize) -> usize {
        global_row + 1 - self.row0
    }

    #[inline]
    fn depth_at(&self, global_row: usize, col: usize) -> f64 {
        self.depth[self.depth_row(global_row) * self.geo.nx + col]
    }

    #[inline]
    fn own_index(&self, global_row: usize, col: usize) -> usize {
        (global_row - self.row0) * self.geo.nx + col
    }

    fn owned_rows(&self) -> usize {
        self.row1 - self.row0
    }

    /// 本步时间步长：CFL 条件加步长上下限。
    fn compute_dt(&self, target_s: f64) -> f64 {
        let geo = &self.geo;
        let mut h_max: f64 = 0.0;
        let mut v_max: f64 = 0.0;
        for r in self.row0..self.row1 {
            for c in 0..geo.nx {
                let i = geo.idx(r, c);
                if !geo.active[i] {
                    continue;
                }
                h_max = h_max.max(self.depth_at(r, c));
                let o = self.own_index(r, c);
                let speed = (self.vel_u[o] * self.vel_u[o] + self.vel_v[o] * self.vel_v[o]).sqrt();
                v_max = v_max.max(speed);
            }
        }
        let celerity = (GRAVITY * h_max).sqrt();
        let denom = celerity.max(v_max).max(SPEED_FLOOR_MS);
        let mut dt = (geo.cfl * geo.dx / denom).min(MAX_DT_S);
        let remaining = target_s - self.time;
        if dt >= remaining {
            remaining
        } else {
            dt = dt.max(MIN_DT_S);
            dt.min(remaining)
        }
    }

    /// 单个内部时间步。
    fn step(&mut self, dt: f64) {
        let geo = Arc::clone(&self.geo);
        let nx = geo.nx;
        let area = geo.cell_area();
        let n_owned = self.owned_rows() * nx;
        let mut delta = vec![0.0f64; n_owned];
        let mut acc_x = vec![0.0f64; n_owned];
        let mut acc_y = vec![0.0f64; n_owned];

        for r in self.row0..self.row1 {
            for c in 0..nx {
                let i = geo.idx(r, c);
                if !geo.active[i] {
                    continue;
                }
                let h_i = self.depth_at(r, c);
                let z_i = geo.elevation[i];
                let o_i = self.own_index(r, c);

                // 东向面：同行，两侧都归本带
                if c + 1 < nx {
                    let j = geo.idx(r, c + 1);
                    if geo.active[j] {
                        let q = face_flux(
                            h_i,
                            z_i,
                            self.depth_at(r, c + 1),
                            geo.elevation[j],
                            0.5 * (geo.friction[i] + geo.friction[j]),
                            geo.dx,
                            dt,
                        );
                        let dh = q * dt / area;
                        delta[o_i] -= dh;
                        delta[self.own_index(r, c + 1)] += dh;
                        let v_face = face_velocity(q, geo.dx, h_i, self.depth_at(r, c + 1));
                        acc_x[o_i] += v_face;
                        acc_x[self.own_index(r, c + 1)] += v_face;
                    }
                }

                // 北向面：带内两侧都更新，带缝只更新本侧
                if r + 1 < geo.ny {
                    let j = geo.idx(r + 1, c);
                    if geo.active[j] {
                        let q = face_flux(
                            h_i,
                            z_i,
                            self.depth_at(r + 1, c),
                            geo.elevation[j],
                            0.5 * (geo.friction[i] + geo.friction[j]),
                            geo.dx,
                            dt,
                        );
                        let dh = q * dt / area;
                        delta[o_i] -= dh;
                        let v_face = face_velocity(q, geo.dx, h_i, self.depth_at(r + 1, c));
                        acc_y[o_i] += v_face;
                        if r + 1 < self.row1 {
                            delta[self.own_index(r + 1, c)] += dh;
                            acc_y[self.own_index(r + 1, c)] += v_face;
                        }
                    }
                }

                // 带缝下缘：用冻结的邻带水深算本侧通量
                if r == self.row0 && r > 0 {
                    let j = geo.idx(r - 1, c);
                    if geo.active[j] {
                        let q = face_flux(
                            self.depth_at(r - 1, c),
                            geo.elevation[j],
                            h_i,
                            z_i,
                            0.5 * (geo.friction[i] + geo.friction[j]),
                            geo.dx,
                            dt,
                        );
                        let dh = q * dt / area;
                        delta[o_i] += dh;
                        let v_face = face_velocity(q, geo.dx, self.depth_at(r - 1, c), h_i);
                        acc_y[o_i] += v_face;
                    }
                }

                // 边界条件：缺邻方向按环边类型对虚拟单元过流
                if let Some(kind) = geo.boundary_kind[i] {
                    let missing = missing_sides(&geo, r, c);
                    if missing > 0 {
                        let dh = boundary_outflux(kind, h_i, z_i, &geo, dt) * missing as f64;
                        delta[o_i] += dh;
                    }
                }
            }
        }

        // 应用通量与源项，更新速度缓存
        let wet_floor = MIN_ALLOWED_HEIGHT_M;
        for r in self.row0..self.row1 {
            for c in 0..nx {
                let i = geo.idx(r, c);
                if !geo.active[i] {
                    continue;
                }
                let o = self.own_index(r, c);
                let d = self.depth_row(r) * nx + c;
                let mut h = (self.depth[d] + delta[o]).max(0.0);

                for (rate, cells) in &geo.sources {
                    // 源单元表按升序存放，二分足够快
                    if cells.binary_search(&(i as u32)).is_ok() {
                        let r_now = rate.rate_at(self.time);
                        h = (h + r_now * dt).max(0.0);
                    }
                }

                self.depth[d] = h;
                if h > wet_floor {
                    self.vel_u[o] = acc_x[o] / 2.0;
                    self.vel_v[o] = acc_y[o] / 2.0;
                } else {
                    self.vel_u[o] = 0.0;
                    self.vel_v[o] = 0.0;
                }
            }
        }
    }

    fn collect_stats(&self, n_steps: u64, last_dt: f64) -> StepStats {
        let geo = &self.geo;
        let mut stats = StepStats::empty(self.time);
        stats.n_internal_steps = n_steps;
        stats.last_dt_s = last_dt;
        stats.active_cells = geo.active_in_rows(self.row0, self.row1);
        for r in self.row0..self.row1 {
            for c in 0..geo.nx {
                let i = geo.idx(r, c);
                if !geo.active[i] {
                    continue;
                }
                let h = self.depth_at(r, c);
                stats.volume_m3 += h * geo.cell_area();
                stats.max_depth_m = stats.max_depth_m.max(h);
                if is_wet(h) {
                    stats.wet_cells += 1;
                    let o = self.own_index(r, c);
                    let speed =
                        (self.vel_u[o] * self.vel_u[o] + self.vel_v[o] * self.vel_v[o]).sqrt();
                    if speed > stats.max_speed_ms {
                        stats.max_speed_ms = speed;
                        stats.peak_speed_x = self.vel_u[o];
                        stats.peak_speed_y = self.vel_v[o];
                    }
                }
            }
        }
        if stats.wet_cells > 0 {
            stats.min_wet_inradius_m = geo.dx / 2.0;
        }
        stats.wet_fraction = if stats.active_cells > 0 {
            stats.wet_cells as f64 / stats.active_cells as f64
        } else {
            0.0
        };
        stats
    }
}

/// 临外方向数：出到网格外或边界环外。孔洞面是固壁，不计入。
fn missing_sides(geo: &GridGeometry, row: usize, col: usize) -> usize {
    let mut missing = 0usize;
    let neighbours = [
        (row > 0).then(|| geo.idx(row - 1, col)),
        (row + 1 < geo.ny).then(|| geo.idx(row + 1, col)),
        (col > 0).then(|| geo.idx(row, col - 1)),
        (col + 1 < geo.nx).then(|| geo.idx(row, col + 1)),
    ];
    for n in neighbours {
        match n {
            None => missing += 1,
            Some(j) if !geo.active[j] && !geo.hole[j] => missing += 1,
            Some(_) => {}
        }
    }
    missing
}

/// 相邻单元间的体积通量（m³/s），正值表示 a 流向 b。
fn face_flux(h_a: f64, z_a: f64, h_b: f64, z_b: f64, n_face: f64, dx: f64, dt: f64) -> f64 {
    let eta_a = z_a + h_a;
    let eta_b = z_b + h_b;
    let (eta_hi, eta_lo, sign) = if eta_a >= eta_b {
        (eta_a, eta_b, 1.0)
    } else {
        (eta_b, eta_a, -1.0)
    };
    let flow_depth = (eta_hi - z_a.max(z_b)).max(0.0);
    if flow_depth < MIN_ALLOWED_HEIGHT_M {
        return 0.0;
    }
    let slope = (eta_hi - eta_lo) / dx;
    if slope <= 0.0 {
        return 0.0;
    }
    let velocity = flow_depth.powf(2.0 / 3.0) * slope.sqrt() / n_face;
    let mut q = velocity * flow_depth * dx;
    // 限流：一步最多搬走水位差的一半，防止振荡
    let q_cap = 0.5 * (eta_hi - eta_lo) * dx * dx / dt;
    if q > q_cap {
        q = q_cap;
    }
    sign * q
}

/// 面流速（m/s），带符号，方向沿坐标轴正向。
fn face_velocity(q: f64, dx: f64, h_a: f64, h_b: f64) -> f64 {
    let h_face = (0.5 * (h_a + h_b)).max(MIN_ALLOWED_HEIGHT_M);
    q / (dx * h_face)
}

/// 缺邻方向上与虚拟单元的过流造成的本侧水深变化率（米/面）。
fn boundary_outflux(
    kind: BoundaryKind,
    h: f64,
    z: f64,
    geo: &GridGeometry,
    dt: f64,
) -> f64 {
    let area = geo.cell_area();
    match kind {
        BoundaryKind::Reflective => 0.0,
        BoundaryKind::Transmissive => {
            // 虚拟外单元同高程且干燥，水自由流出
            let q = face_flux(h, z, 0.0, z, 0.03, geo.dx, dt);
            -q.max(0.0) * dt / area
        }
        BoundaryKind::Dirichlet => {
            let h_out = (geo.dirichlet_stage - z).max(0.0);
            let q = face_flux(h, z, h_out, z, 0.03, geo.dx, dt);
            -q * dt / area
        }
    }
}

impl RankEngine for GridRank {
    fn rank(&self) -> usize {
        self.rank
    }

    fn time(&self) -> f64 {
        self.time
    }

    fn evolve_to(&mut self, target_s: f64) -> EngineResult<StepStats> {
        let mut n_steps = 0u64;
        let mut last_dt = 0.0f64;
        while self.time < target_s - 1.0e-9 {
            let dt = self.compute_dt(target_s);
            if dt <= 0.0 {
                break;
            }
            self.step(dt);
            self.time += dt;
            n_steps += 1;
            last_dt = dt;
        }
        self.time = self.time.max(target_s);
        Ok(self.collect_stats(n_steps, last_dt))
    }

    fn halo_out(&self) -> HaloData {
        let nx = self.geo.nx;
        let first = self.depth_row(self.row0) * nx;
        let last = self.depth_row(self.row1 - 1) * nx;
        HaloData {
            rank: self.rank,
            first_row_depth: self.depth[first..first + nx].to_vec(),
            last_row_depth: self.depth[last..last + nx].to_vec(),
        }
    }

    fn halo_in(&mut self, below: Option<&HaloData>, above: Option<&HaloData>) {
        let nx = self.geo.nx;
        if let Some(h) = below {
            self.depth[..nx].copy_from_slice(&h.last_row_depth);
        }
        if let Some(h) = above {
            let start = (self.owned_rows() + 1) * nx;
            self.depth[start..start + nx].copy_from_slice(&h.first_row_depth);
        }
    }

    fn frame_slice(&self) -> FrameSlice {
        let geo = &self.geo;
        let count = geo.active_in_rows(self.row0, self.row1);
        let mut slice = FrameSlice {
            rank: self.rank,
            time_s: self.time,
            stage: Vec::with_capacity(count),
            xmom: Vec::with_capacity(count),
            ymom: Vec::with_capacity(count),
        };
        for r in self.row0..self.row1 {
            for c in 0..geo.nx {
                let i = geo.idx(r, c);
                if !geo.active[i] {
                    continue;
                }
                let h = self.depth_at(r, c);
                let o = self.own_index(r, c);
                slice.stage.push(geo.elevation[i] + h);
                slice.xmom.push(h * self.vel_u[o]);
                slice.ymom.push(h * self.vel_v[o]);
            }
        }
        slice
    }

    fn state_bytes(&self) -> Vec<u8> {
        let nx = self.geo.nx;
        let n_owned = self.owned_rows() * nx;
        let mut bytes =
            Vec::with_capacity(4 * 8 + 8 + 3 * n_owned * 8);
        bytes.extend_from_slice(&(self.rank as u64).to_le_bytes());
        bytes.extend_from_slice(&(self.row0 as u64).to_le_bytes());
        bytes.extend_from_slice(&(self.row1 as u64).to_le_bytes());
        bytes.extend_from_slice(&(nx as u64).to_le_bytes());
        bytes.extend_from_slice(&self.time.to_le_bytes());
        for r in self.row0..self.row1 {
            for c in 0..nx {
                bytes.extend_from_slice(&self.depth_at(r, c).to_le_bytes());
            }
        }
        for v in self.vel_u.iter().chain(self.vel_v.iter()) {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    fn restore_state(&mut self, bytes: &[u8]) -> EngineResult<()> {
        let nx = self.geo.nx;
        let n_owned = self.owned_rows() * nx;
        let expected = 4 * 8 + 8 + 3 * n_owned * 8;
        if bytes.len() != expected {
            return Err(EngineError::CorruptState(format!(
                "长度 {} 字节，期望 {expected}",
                bytes.len()
            )));
        }
        let rank = read_u64(bytes, 0) as usize;
        let row0 = read_u64(bytes, 8) as usize;
        let row1 = read_u64(bytes, 16) as usize;
        let saved_nx = read_u64(bytes, 24) as usize;
        if rank != self.rank || row0 != self.row0 || row1 != self.row1 || saved_nx != nx {
            return Err(EngineError::state_mismatch(format!(
                "分片 {rank} 行带 [{row0}, {row1}) nx={saved_nx}，当前分片 {} 行带 [{}, {}) nx={nx}",
                self.rank, self.row0, self.row1
            )));
        }
        self.time = read_f64(bytes, 32);
        let mut offset = 40;
        for r in self.row0..self.row1 {
            let base = self.depth_row(r) * nx;
            for c in 0..nx {
                self.depth[base + c] = read_f64(bytes, offset);
                offset += 8;
            }
        }
        for v in self.vel_u.iter_mut() {
            *v = read_f64(bytes, offset);
            offset += 8;
        }
        for v in self.vel_v.iter_mut() {
            *v = read_f64(bytes, offset);
            offset += 8;
        }
        Ok(())
    }
}

#[inline]
fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

#[inline]
fn read_f64(bytes: &[u8], offset: usize) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    f64::from_le_bytes(buf)
}
