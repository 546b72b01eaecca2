// crates/fr_geo/src/geometry.rs
//! 平面几何原语。
//!
//! 二维点 [`Point2D`]、轴对齐包围盒 [`Bounds`] 以及极坐标角度工具。
//! 坐标约定为投影坐标系下的米制平面坐标。

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

// ============================================================
// 二维点
// ============================================================

/// 平面二维点（米）。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    /// 东向坐标 x（米）
    pub x: f64,
    /// 北向坐标 y（米）
    pub y: f64,
}

impl Point2D {
    /// 原点。
    pub const ZERO: Point2D = Point2D { x: 0.0, y: 0.0 };

    /// 创建点。
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// 到另一点的欧氏距离。
    #[inline]
    #[must_use]
    pub fn distance_to(&self, other: &Point2D) -> f64 {
        self.distance_squared_to(other).sqrt()
    }

    /// 到另一点的距离平方，避免开方开销。
    #[inline]
    #[must_use]
    pub fn distance_squared_to(&self, other: &Point2D) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// 向量点积。
    #[inline]
    #[must_use]
    pub fn dot(&self, other: &Point2D) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// 向量叉积的 z 分量，正值表示 `other` 在本向量逆时针侧。
    #[inline]
    #[must_use]
    pub fn cross(&self, other: &Point2D) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// 向量模长。
    #[inline]
    #[must_use]
    pub fn length(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// 向量模长平方。
    #[inline]
    #[must_use]
    pub fn length_squared(&self) -> f64 {
        self.dot(self)
    }

    /// 单位化，零向量返回 `None`。
    #[inline]
    #[must_use]
    pub fn normalize(&self) -> Option<Point2D> {
        let len = self.length();
        if len > 0.0 {
            Some(Point2D::new(self.x / len, self.y / len))
        } else {
            None
        }
    }

    /// 线性插值，`t` 取 0 得自身，取 1 得 `other`。
    #[inline]
    #[must_use]
    pub fn lerp(&self, other: &Point2D, t: f64) -> Point2D {
        Point2D::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    /// 两点中点。
    #[inline]
    #[must_use]
    pub fn midpoint(&self, other: &Point2D) -> Point2D {
        self.lerp(other, 0.5)
    }

    /// 坐标是否均为有限数。
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// 按坐标取两点的逐分量最小值。
    #[inline]
    #[must_use]
    pub fn min_components(&self, other: &Point2D) -> Point2D {
        Point2D::new(self.x.min(other.x), self.y.min(other.y))
    }

    /// 按坐标取两点的逐分量最大值。
    #[inline]
    #[must_use]
    pub fn max_components(&self, other: &Point2D) -> Point2D {
        Point2D::new(self.x.max(other.x), self.y.max(other.y))
    }

    /// 到线段 `ab` 的最短距离。
    #[must_use]
    pub fn distance_to_segment(&self, a: &Point2D, b: &Point2D) -> f64 {
        let ab = *b - *a;
        let len_sq = ab.length_squared();
        if len_sq == 0.0 {
            return self.distance_to(a);
        }
        let t = ((*self - *a).dot(&ab) / len_sq).clamp(0.0, 1.0);
        self.distance_to(&a.lerp(b, t))
    }
}

impl Add for Point2D {
    type Output = Point2D;

    #[inline]
    fn add(self, rhs: Point2D) -> Point2D {
        Point2D::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point2D {
    #[inline]
    fn add_assign(&mut self, rhs: Point2D) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point2D {
    type Output = Point2D;

    #[inline]
    fn sub(self, rhs: Point2D) -> Point2D {
        Point2D::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Point2D {
    #[inline]
    fn sub_assign(&mut self, rhs: Point2D) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f64> for Point2D {
    type Output = Point2D;

    #[inline]
    fn mul(self, rhs: f64) -> Point2D {
        Point2D::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Point2D {
    type Output = Point2D;

    #[inline]
    fn neg(self) -> Point2D {
        Point2D::new(-self.x, -self.y)
    }
}

impl From<[f64; 2]> for Point2D {
    #[inline]
    fn from(v: [f64; 2]) -> Self {
        Point2D::new(v[0], v[1])
    }
}

impl From<(f64, f64)> for Point2D {
    #[inline]
    fn from(v: (f64, f64)) -> Self {
        Point2D::new(v.0, v.1)
    }
}

impl From<Point2D> for [f64; 2] {
    #[inline]
    fn from(p: Point2D) -> Self {
        [p.x, p.y]
    }
}

// ============================================================
// 包围盒
// ============================================================

/// 轴对齐包围盒。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// 左下角
    pub min: Point2D,
    /// 右上角
    pub max: Point2D,
}

impl Bounds {
    /// 由对角点创建，自动归位最小最大。
    #[must_use]
    pub fn new(a: Point2D, b: Point2D) -> Self {
        Self {
            min: a.min_components(&b),
            max: a.max_components(&b),
        }
    }

    /// 由点集创建，空集返回 `None`。
    #[must_use]
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point2D>,
    {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut bounds = Bounds {
            min: first,
            max: first,
        };
        for p in iter {
            bounds.expand(p);
        }
        Some(bounds)
    }

    /// 扩张以包含一点。
    #[inline]
    pub fn expand(&mut self, p: &Point2D) {
        self.min = self.min.min_components(p);
        self.max = self.max.max_components(p);
    }

    /// 宽度（x 跨度）。
    #[inline]
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// 高度（y 跨度）。
    #[inline]
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// 中心点。
    #[inline]
    #[must_use]
    pub fn center(&self) -> Point2D {
        self.min.midpoint(&self.max)
    }

    /// 点是否落在盒内（含边界）。
    #[inline]
    #[must_use]
    pub fn contains(&self, p: &Point2D) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// 与另一包围盒求并。
    #[must_use]
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: self.min.min_components(&other.min),
            max: self.max.max_components(&other.max),
        }
    }

    /// 四周外扩 `margin` 米。
    #[must_use]
    pub fn inflate(&self, margin: f64) -> Bounds {
        Bounds {
            min: Point2D::new(self.min.x - margin, self.min.y - margin),
            max: Point2D::new(self.max.x + margin, self.max.y + margin),
        }
    }
}

// ============================================================
// 极坐标角度
// ============================================================

/// 按象限给 `atan(dy/dx)` 的修正量，使角度落入 `[0, 2π)`。
///
/// 任一分量为零时返回 0，与轴上点按零角处理的约定一致：
///
/// | dx | dy | 修正量 |
/// |----|----|--------|
/// | +  | +  | 0      |
/// | -  | +  | π      |
/// | -  | -  | π      |
/// | +  | -  | 2π     |
#[inline]
#[must_use]
pub fn correction_for_polar_quadrants(dx: f64, dy: f64) -> f64 {
    if dx == 0.0 || dy == 0.0 {
        return 0.0;
    }
    match (dx > 0.0, dy > 0.0) {
        (true, true) => 0.0,
        (false, true) => std::f64::consts::PI,
        (false, false) => std::f64::consts::PI,
        (true, false) => 2.0 * std::f64::consts::PI,
    }
}

/// 向量 `(dx, dy)` 相对 x 轴正向的极角，范围 `[0, 2π)`。
#[inline]
#[must_use]
pub fn polar_angle(dx: f64, dy: f64) -> f64 {
    if dx == 0.0 && dy == 0.0 {
        return 0.0;
    }
    if dx == 0.0 {
        return if dy > 0.0 {
            std::f64::consts::FRAC_PI_2
        } else {
            1.5 * std::f64::consts::PI
        };
    }
    let angle = (dy / dx).atan() + correction_for_polar_quadrants(dx, dy);
    // 2π 回绕到 0
    if angle >= 2.0 * std::f64::consts::PI {
        angle - 2.0 * std::f64::consts::PI
    } else {
        angle
    }
}
