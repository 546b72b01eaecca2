// crates/fr_geo/src/error.rs
//! 几何层错误类型。

use thiserror::Error;

/// 几何运算错误。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// 没有任何外边界线段可供装配
    #[error("边界装配失败：没有外边界线段")]
    EmptyBoundary,

    /// 某条线段端点悬空，无法与其余线段闭合成环
    #[error("边界线段在 ({x:.3}, {y:.3}) 处悬空，无法闭合成环（容差 {tolerance} m）")]
    DanglingSegment {
        /// 悬空端点 x 坐标
        x: f64,
        /// 悬空端点 y 坐标
        y: f64,
        /// 装配时使用的端点匹配容差（米）
        tolerance: f64,
    },

    /// 线段构成了多于一个互不连通的环
    #[error("边界线段构成 {count} 个互不连通的环，外边界必须是单一闭合环")]
    MultipleRings {
        /// 闭合后仍剩余的线段数
        count: usize,
    },

    /// 顶点数不足或面积退化
    #[error("多边形退化：顶点数 {vertices}，面积 {area:.6}")]
    DegeneratePolygon {
        /// 顶点数
        vertices: usize,
        /// 有符号面积绝对值
        area: f64,
    },

    /// 找不到多边形内部代表点
    #[error("无法为多边形找到内部代表点")]
    NoInteriorPoint,

    /// 坐标含 NaN 或无穷
    #[error("非法坐标 ({x}, {y})：坐标必须为有限数")]
    InvalidCoordinate {
        /// x 坐标
        x: f64,
        /// y 坐标
        y: f64,
    },
}

impl GeometryError {
    /// 构造悬空线段错误。
    #[inline]
    pub fn dangling(x: f64, y: f64, tolerance: f64) -> Self {
        Self::DanglingSegment { x, y, tolerance }
    }

    /// 构造退化多边形错误。
    #[inline]
    pub fn degenerate(vertices: usize, area: f64) -> Self {
        Self::DegeneratePolygon { vertices, area }
    }

    /// 构造非法坐标错误。
    #[inline]
    pub fn invalid(x: f64, y: f64) -> Self {
        Self::InvalidCoordinate { x, y }
    }
}

/// 几何运算结果别名。
pub type GeoResult<T> = Result<T, GeometryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GeometryError::dangling(321100.0, 5812000.0, 1.0e-6);
        let msg = err.to_string();
        assert!(msg.contains("悬空"));
        assert!(msg.contains("321100.000"));

        let err = GeometryError::MultipleRings { count: 4 };
        assert!(err.to_string().contains("4 个"));

        let err = GeometryError::degenerate(2, 0.0);
        assert!(err.to_string().contains("顶点数 2"));
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(GeometryError::EmptyBoundary, GeometryError::EmptyBoundary);
        assert_ne!(
            GeometryError::NoInteriorPoint,
            GeometryError::EmptyBoundary
        );
    }
}
