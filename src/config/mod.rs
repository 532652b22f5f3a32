use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::error::{PipelineError, PipelineResult};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct OptimizerConfig {
    /// 投影下推总开关
    pub enable_projection_pushdown: bool,
    /// 以 info 级别输出每遍的统计摘要
    pub report_pass_stats: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enable_projection_pushdown: true,
            report_pass_stats: false,
        }
    }
}

impl OptimizerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PipelineError::Config(e.to_string()))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> PipelineResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_enables_pushdown() {
        let config = OptimizerConfig::default();
        assert!(config.enable_projection_pushdown);
        assert!(!config.report_pass_stats);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: OptimizerConfig = toml::from_str("report_pass_stats = true").unwrap();
        assert!(config.enable_projection_pushdown);
        assert!(config.report_pass_stats);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("optimizer.toml");
        let config = OptimizerConfig {
            enable_projection_pushdown: false,
            report_pass_stats: true,
        };
        config.save(&path).unwrap();
        let loaded = OptimizerConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
