//! Engine configuration
//!
//! Defaults used by record operations when a caller omits an argument,
//! plus the logging threshold.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{HarvestError, HarvestResult};
use crate::observability::{log_event_with_fields, Event, Logger, Severity};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Separator used by flatten/unflatten (default: ".")
    #[serde(default = "default_flatten_separator")]
    pub flatten_separator: String,

    /// Upper bound in seconds of the fresh band (default: 3600)
    #[serde(default = "default_fresh_seconds")]
    pub fresh_seconds: i64,

    /// Upper bound in seconds of the aging band (default: 43200)
    #[serde(default = "default_aging_seconds")]
    pub aging_seconds: i64,

    /// Key written by `add_freshness` (default: "f")
    #[serde(default = "default_freshness_key")]
    pub freshness_key: String,

    /// Minimum severity written by the logger (default: WARN)
    #[serde(default)]
    pub log_level: Severity,
}

fn default_flatten_separator() -> String {
    ".".to_string()
}

fn default_fresh_seconds() -> i64 {
    3600
}

fn default_aging_seconds() -> i64 {
    43200
}

fn default_freshness_key() -> String {
    "f".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flatten_separator: default_flatten_separator(),
            fresh_seconds: default_fresh_seconds(),
            aging_seconds: default_aging_seconds(),
            freshness_key: default_freshness_key(),
            log_level: Severity::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON; absent fields take their defaults
    pub fn from_json(json: &str) -> HarvestResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a configuration file
    pub fn load(path: &Path) -> HarvestResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| HarvestError::Config {
            path: path.display().to_string(),
            source,
        })?;

        let config = Self::from_json(&content)?;
        log_event_with_fields(
            Event::ConfigLoaded,
            &[("path", &path.display().to_string())],
        );
        Ok(config)
    }

    /// Apply process-wide settings (the logging threshold)
    pub fn install(&self) {
        Logger::set_min_severity(self.log_level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::HarvestErrorCode;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.flatten_separator, ".");
        assert_eq!(config.fresh_seconds, 3600);
        assert_eq!(config.aging_seconds, 43200);
        assert_eq!(config.freshness_key, "f");
        assert_eq!(config.log_level, Severity::Warn);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = EngineConfig::from_json(r#"{"flatten_separator": "/", "log_level": "INFO"}"#)
            .unwrap();
        assert_eq!(config.flatten_separator, "/");
        assert_eq!(config.log_level, Severity::Info);
        assert_eq!(config.fresh_seconds, 3600);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("harvest.json");
        std::fs::write(&path, r#"{"fresh_seconds": 60, "aging_seconds": 600}"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.fresh_seconds, 60);
        assert_eq!(config.aging_seconds, 600);
        assert_eq!(config.freshness_key, "f");
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load(Path::new("/nonexistent/harvest.json")).unwrap_err();
        assert_eq!(err.code(), HarvestErrorCode::ConfigFailed);
    }

    #[test]
    fn test_invalid_json() {
        let err = EngineConfig::from_json("not json").unwrap_err();
        assert_eq!(err.code(), HarvestErrorCode::InvalidJson);
    }
}
