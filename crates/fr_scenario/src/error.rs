// crates/fr_scenario/src/error.rs
//! 情景层错误类型。

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// 配置校验错误，一次携带全部违规项。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    violations: Vec<String>,
}

impl ConfigError {
    /// 由违规列表构造。
    #[must_use]
    pub fn new(violations: Vec<String>) -> Self {
        Self { violations }
    }

    /// 单条违规。
    #[must_use]
    pub fn single(violation: impl Into<String>) -> Self {
        Self {
            violations: vec![violation.into()],
        }
    }

    /// 全部违规项。
    #[must_use]
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// 违规数。
    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// 是否没有违规。
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// 是否有违规项提到指定字段名。
    #[must_use]
    pub fn mentions(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.contains(field))
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "情景配置校验失败，共 {} 项:", self.violations.len())?;
        for (i, v) in self.violations.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, v)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigError {}

/// 情景包加载错误。
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// 配置校验失败
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 文件读写失败
    #[error("读取 {path} 失败: {source}")]
    Io {
        /// 出错的文件路径
        path: PathBuf,
        /// 底层 IO 错误
        #[source]
        source: std::io::Error,
    },

    /// JSON 解析失败
    #[error("解析 {path} 失败: {source}")]
    Json {
        /// 出错的文件路径
        path: PathBuf,
        /// 底层解析错误
        #[source]
        source: serde_json::Error,
    },

    /// 几何装配失败
    #[error("几何装配失败: {0}")]
    Geometry(#[from] fr_geo::GeometryError),

    /// 路径不是情景包
    #[error("{path} 不是情景包：目录下找不到 scenario.json")]
    NotAPackage {
        /// 被检查的路径
        path: PathBuf,
    },
}

impl ScenarioError {
    /// 构造 IO 错误。
    #[inline]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// 构造 JSON 解析错误。
    #[inline]
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

/// 情景层结果别名。
pub type ScenarioResult<T> = Result<T, ScenarioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_lists_everything() {
        let err = ConfigError::new(vec![
            "duration: 缺少必填字段".to_string(),
            "epsg: 缺少必填字段".to_string(),
        ]);
        assert_eq!(err.len(), 2);
        assert!(err.mentions("duration"));
        assert!(err.mentions("epsg"));
        let text = err.to_string();
        assert!(text.contains("共 2 项"));
        assert!(text.contains("1. duration"));
    }

    #[test]
    fn test_scenario_error_wraps_config() {
        let err: ScenarioError = ConfigError::single("boundary: 缺少必填字段").into();
        assert!(err.to_string().contains("boundary"));
    }
}
