//! Engine configuration
//!
//! Loaded from TOML, JSON or YAML (by file extension). Every section is
//! optional and falls back to defaults.

use std::fs;
use std::path::{Path, PathBuf};

use infra_api::ApiConfig;
use serde::{Deserialize, Serialize};

use crate::retry::{RetryConfig, RetryPolicy};
use crate::{Error, Result};

/// Where persisted scope state lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub path: PathBuf,
    /// Scope name recorded in new state files
    pub scope: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".infra/state.toml"),
            scope: "default".to_string(),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub state: StateConfig,
}

impl EngineConfig {
    /// Load configuration, detecting the format from the extension
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let parse_error = |format: &str, message: String| Error::DocumentParse {
            path: path.to_path_buf(),
            format: format.into(),
            message,
        };

        let config: Self = match extension.as_str() {
            "toml" => toml::from_str(&content).map_err(|e| parse_error("TOML", e.to_string()))?,
            "json" => {
                serde_json::from_str(&content).map_err(|e| parse_error("JSON", e.to_string()))?
            }
            "yaml" | "yml" => {
                serde_yaml::from_str(&content).map_err(|e| parse_error("YAML", e.to_string()))?
            }
            _ => return Err(Error::UnsupportedFormat { extension }),
        };
        config.retry_policy()?;
        Ok(config)
    }

    /// Load from `path` when given and present, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            Some(path) => {
                tracing::debug!(?path, "Config file not found, using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        RetryPolicy::try_from(self.retry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn partial_toml_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("infra.toml");
        fs::write(
            &path,
            r#"
[api]
account_id = "acct-1"

[retry]
max_attempts = 3
"#,
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.api.account_id, "acct-1");
        assert_eq!(config.api.base_url, infra_api::config::DEFAULT_BASE_URL);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_delay_ms, 250);
        assert_eq!(config.state, StateConfig::default());

        let policy = config.retry_policy().unwrap();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(250));
    }

    #[test]
    fn yaml_and_json_are_supported() {
        let dir = tempdir().unwrap();
        let yaml = dir.path().join("infra.yaml");
        fs::write(&yaml, "state:\n  scope: ci\n").unwrap();
        assert_eq!(EngineConfig::load(&yaml).unwrap().state.scope, "ci");

        let json = dir.path().join("infra.json");
        fs::write(&json, r#"{"retry": {"multiplier": 1.5}}"#).unwrap();
        assert_eq!(EngineConfig::load(&json).unwrap().retry.multiplier, 1.5);
    }

    #[test]
    fn malformed_config_names_format_and_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("infra.toml");
        fs::write(&path, "[retry\nmax_attempts = ").unwrap();

        let error = EngineConfig::load(&path).unwrap_err();
        let message = error.to_string();
        assert!(message.contains("TOML"), "got: {}", message);
        assert!(message.contains("infra.toml"), "got: {}", message);
    }

    #[test]
    fn shrinking_multiplier_is_rejected_at_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("infra.toml");
        fs::write(&path, "[retry]\nmultiplier = -2.0\n").unwrap();

        let error = EngineConfig::load(&path).unwrap_err();
        assert!(matches!(error, Error::Config { .. }));
        assert!(error.to_string().contains("retry.multiplier"), "got: {}", error);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let config =
            EngineConfig::load_or_default(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
