// crates/fr_foundation/src/validation.rs

//! 数值字段校验工具
//!
//! 提供按字段累积错误与警告的 [`ValidationReport`]，以及
//! 常用的数值约束检查。上层配置校验在一次遍历中收集全部
//! 违规项，而不是在第一个错误处停下。

use std::fmt;

/// 校验报告，累积错误与警告
#[derive(Debug, Default, Clone)]
pub struct ValidationReport {
    /// 错误列表，任一条即判定校验失败
    pub errors: Vec<String>,
    /// 警告列表，不阻止后续流程
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// 创建空报告
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加错误
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// 添加警告
    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// 吸收一次检查结果，Err 记为错误
    pub fn check(&mut self, result: Result<(), String>) {
        if let Err(message) = result {
            self.add_error(message);
        }
    }

    /// 是否无错误
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// 错误数量
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// 合并另一份报告
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "校验通过")
        } else {
            writeln!(f, "发现 {} 个错误:", self.errors.len())?;
            for error in &self.errors {
                writeln!(f, "  - {}", error)?;
            }
            Ok(())
        }
    }
}

/// 要求值为有限浮点数
pub fn require_finite(field: &str, value: f64) -> Result<(), String> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(format!("{}: 值必须是有限数，实际为 {}", field, value))
    }
}

/// 要求值为正数
pub fn require_positive(field: &str, value: f64) -> Result<(), String> {
    require_finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(format!("{}: 值必须为正数，实际为 {}", field, value))
    }
}

/// 要求值非负
pub fn require_non_negative(field: &str, value: f64) -> Result<(), String> {
    require_finite(field, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(format!("{}: 值不能为负数，实际为 {}", field, value))
    }
}

/// 要求值落在闭区间内
pub fn require_in_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), String> {
    require_finite(field, value)?;
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(format!(
            "{}: 值必须在 [{}, {}] 范围内，实际为 {}",
            field, min, max, value
        ))
    }
}

/// 要求字符串非空
pub fn require_non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{}: 不能为空", field))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_accumulates_errors() {
        let mut report = ValidationReport::new();
        report.check(require_positive("duration", -1.0));
        report.check(require_positive("resolution", 2.0));
        report.check(require_non_empty("id", ""));
        assert!(!report.is_valid());
        assert_eq!(report.error_count(), 2);
    }

    #[test]
    fn finite_rejects_nan_and_inf() {
        assert!(require_finite("x", f64::NAN).is_err());
        assert!(require_finite("x", f64::INFINITY).is_err());
        assert!(require_finite("x", 0.0).is_ok());
    }

    #[test]
    fn range_check_is_inclusive() {
        assert!(require_in_range("f", 0.0, 0.0, 1.0).is_ok());
        assert!(require_in_range("f", 1.0, 0.0, 1.0).is_ok());
        assert!(require_in_range("f", 1.01, 0.0, 1.0).is_err());
    }

    #[test]
    fn merge_combines_reports() {
        let mut a = ValidationReport::new();
        a.add_error("first");
        let mut b = ValidationReport::new();
        b.add_error("second");
        b.add_warning("note");
        a.merge(b);
        assert_eq!(a.error_count(), 2);
        assert_eq!(a.warnings.len(), 1);
    }
}
