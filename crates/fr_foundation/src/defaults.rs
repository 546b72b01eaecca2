// crates/fr_foundation/src/defaults.rs

//! 全局默认参数
//!
//! 洪水情景模拟各环节共享的命名常量。所有时间单位为秒，
//! 长度单位为米，除非名称另有说明。

// ============================================================
// 演进步长
// ============================================================

/// 单次运行的目标 yieldstep 数量（时长按此均分）
pub const MAX_YIELDSTEPS: f64 = 100.0;

/// yieldstep 下限（秒）
pub const MIN_YIELDSTEP_S: f64 = 60.0;

/// yieldstep 上限（秒）
pub const MAX_YIELDSTEP_S: f64 = 1800.0;

// ============================================================
// 水深与流速阈值
// ============================================================

/// 可存储的最小水深（米），低于此视为干单元
pub const MINIMUM_STORABLE_HEIGHT_M: f64 = 0.005;

/// 计算流速时允许的最小水深（米），低于此流速记零
pub const MIN_ALLOWED_HEIGHT_M: f64 = 1.0e-5;

/// 湿单元判定阈值（米），用于诊断统计
pub const WET_DEPTH_THRESHOLD_M: f64 = 1.0e-3;

/// 数值失稳判定流速（米/秒），超过即判定发散
pub const INSTABILITY_SPEED_MS: f64 = 20.0;

// ============================================================
// 地形与糙率
// ============================================================

/// 建筑物烧录高度（米），叠加到高程栅格上
pub const BUILDING_BURN_HEIGHT_M: f64 = 5.0;

/// 以糙率表达建筑物时使用的曼宁系数
pub const BUILDING_MANNINGS_N: f64 = 10.0;

/// 默认曼宁糙率系数
pub const DEFAULT_MANNINGS_N: f64 = 0.04;

/// 降雨强度换算因子：mm/h 转 m/s
pub const RAINFALL_FACTOR: f64 = 1.0 / (1000.0 * 3600.0);

// ============================================================
// 栅格输出
// ============================================================

/// 输出栅格的无数据值
pub const RASTER_NODATA: f64 = -9999.0;

/// 插值使用的最近邻顶点数
pub const K_NEAREST_NEIGHBOURS: usize = 3;

/// 反距离加权的幂指数
pub const IDW_POWER: f64 = 2.0;

// ============================================================
// 几何
// ============================================================

/// 边界线段端点链接的默认容差（米）
pub const DEFAULT_RING_TOLERANCE_M: f64 = 1.0e-6;

// ============================================================
// 内存监控
// ============================================================

/// 内存占用告警阈值（占总内存比例）
pub const MEMORY_WARNING_FRACTION: f64 = 0.85;

/// 内存占用临界阈值（占总内存比例）
pub const MEMORY_CRITICAL_FRACTION: f64 = 0.92;

// ============================================================
// 检查点恢复
// ============================================================

/// 单个分区恢复检查点的最大重试次数
pub const RESTORE_RETRY_LIMIT: usize = 10;

/// 恢复重试的间隔（毫秒）
pub const RESTORE_RETRY_DELAY_MS: u64 = 3000;

/// 每隔多少个 yieldstep 写一次检查点
pub const CHECKPOINT_EVERY_STEPS: usize = 1;

/// 每个分区保留的检查点时刻数
pub const CHECKPOINT_KEEP: usize = 4;

// ============================================================
// 情景包
// ============================================================

/// 当前支持的情景配置格式版本
pub const FORMAT_VERSION: &str = "1.0";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yieldstep_bounds_are_ordered() {
        assert!(MIN_YIELDSTEP_S < MAX_YIELDSTEP_S);
        assert!(MAX_YIELDSTEPS > 0.0);
    }

    #[test]
    fn depth_thresholds_are_ordered() {
        assert!(MIN_ALLOWED_HEIGHT_M < WET_DEPTH_THRESHOLD_M);
        assert!(WET_DEPTH_THRESHOLD_M < MINIMUM_STORABLE_HEIGHT_M * 10.0);
    }

    #[test]
    fn rainfall_factor_converts_mm_per_hour() {
        // 3600 mm/h 即每秒 1 mm
        assert!((3600.0 * RAINFALL_FACTOR - 0.001).abs() < 1e-15);
    }

    #[test]
    fn memory_thresholds_are_fractions() {
        assert!(MEMORY_WARNING_FRACTION < MEMORY_CRITICAL_FRACTION);
        assert!(MEMORY_CRITICAL_FRACTION < 1.0);
    }
}
