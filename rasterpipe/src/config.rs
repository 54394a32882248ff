//! Pipeline run configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Log output settings; both fields have dated defaults derived from
/// the pipeline name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// Directory the log file lands in, relative to the workspace.
    pub dir: Option<PathBuf>,
    /// Log file name override.
    pub file: Option<String>,
}

/// Settings shared by a whole pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Name used in logs and default file names.
    pub name: String,
    /// Root folder all outputs (tiles, caches, logs) live under.
    pub workspace: PathBuf,
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "rasterpipe".to_string(),
            workspace: PathBuf::from("."),
            log: LogConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new(name: impl Into<String>, workspace: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            workspace: workspace.into(),
            log: LogConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_current_directory_and_no_log_overrides() {
        let config = PipelineConfig::default();
        assert_eq!(config.name, "rasterpipe");
        assert_eq!(config.workspace, PathBuf::from("."));
        assert!(config.log.dir.is_none());
        assert!(config.log.file.is_none());
    }

    #[test]
    fn round_trips_through_json() {
        let config = PipelineConfig::new("ndvi", "/data/runs");
        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "ndvi");
        assert_eq!(back.workspace, PathBuf::from("/data/runs"));
    }
}
