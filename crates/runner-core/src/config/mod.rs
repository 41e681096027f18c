use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::logging::store::{LogStoreConfig, DEFAULT_TAIL_LINES};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 7860;
pub const DEFAULT_ADAPTER: &str = "main_agent";
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub agent: AgentConfig,
    pub log_store: LogStoreConfig,
    pub ui: UiConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Registered adapter name resolved at startup
    pub adapter: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub title: String,
    pub tail_lines: usize,
    /// Seconds between automatic log panel refreshes; 0 disables it
    pub auto_refresh_secs: u64,
    /// Seconds before an unused session is dropped; 0 keeps sessions until closed
    pub session_idle_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: Option<String>,
    /// Diagnostic level used when `LOG_LEVEL`/`RUST_LOG` are unset
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            adapter: DEFAULT_ADAPTER.to_string(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            title: "Universal Multi-Agent Runner".to_string(),
            tail_lines: DEFAULT_TAIL_LINES,
            auto_refresh_secs: 5,
            session_idle_secs: DEFAULT_SESSION_IDLE_SECS,
        }
    }
}

/// Result of [`Config::load`]
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    /// File the values came from; `None` when running on defaults
    pub source: Option<PathBuf>,
    /// Default config file that could not be used, with the reason
    pub ignored: Option<(PathBuf, ConfigError)>,
}

impl LoadedConfig {
    fn defaults() -> Self {
        Self {
            config: Config::default(),
            source: None,
            ignored: None,
        }
    }

    /// Report where the configuration came from. Call after tracing is set up.
    pub fn report(&self) {
        match (&self.source, &self.ignored) {
            (_, Some((path, e))) => warn!("Ignoring config at {}: {}", path.display(), e),
            (Some(path), None) => debug!("Loaded config from {}", path.display()),
            (None, None) => debug!("No config file found, using defaults"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// `<config dir>/agent-runner/config.json`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("agent-runner");
        path.push("config.json");
        path
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default location is used
    /// if present; a broken default file is replaced by defaults and the
    /// reason is kept in [`LoadedConfig::ignored`] so the caller can report it
    /// once diagnostics are running.
    pub fn load(config_path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
        Self::load_from(config_path, &Self::default_path())
    }

    pub fn load_from(
        config_path: Option<&Path>,
        default_path: &Path,
    ) -> Result<LoadedConfig, ConfigError> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Ok(LoadedConfig {
                config: Self::from_file(path)?,
                source: Some(path.to_path_buf()),
                ignored: None,
            });
        }

        if !default_path.exists() {
            return Ok(LoadedConfig::defaults());
        }

        match Self::from_file(default_path) {
            Ok(config) => Ok(LoadedConfig {
                config,
                source: Some(default_path.to_path_buf()),
                ignored: None,
            }),
            Err(e) => Ok(LoadedConfig {
                ignored: Some((default_path.to_path_buf(), e)),
                ..LoadedConfig::defaults()
            }),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&config_str)?)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::store::{LogLevel, DEFAULT_ROTATE_BYTES};
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_runner_contract() {
        let config = Config::default();
        assert_eq!(config.bind_address(), "0.0.0.0:7860");
        assert_eq!(config.agent.adapter, "main_agent");
        assert_eq!(config.log_store.path, PathBuf::from("spaces_app.log"));
        assert_eq!(config.log_store.rotate_bytes, DEFAULT_ROTATE_BYTES);
        assert_eq!(config.ui.tail_lines, 500);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = serde_json::from_str(r#"{"server": {"port": 8080}}"#).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.log_store.tail_window_bytes, 64 * 1024);
    }

    #[test]
    fn test_level_keys() {
        let config: Config = serde_json::from_str(
            r#"{"log_store": {"level": "ERROR"}, "logging": {"level": "debug"}}"#,
        )
        .unwrap();
        assert_eq!(config.log_store.level, LogLevel::Error);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(Config::default().logging.level, "info");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.json");

        let err = Config::load_from(Some(&missing), &dir.path().join("default.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(path) if path == missing));
    }

    #[test]
    fn test_broken_default_file_falls_back_with_reason() {
        let dir = tempdir().unwrap();
        let default_path = dir.path().join("config.json");
        fs::write(&default_path, "{ not json").unwrap();

        let loaded = Config::load_from(None, &default_path).unwrap();
        assert_eq!(loaded.config, Config::default());
        assert!(loaded.source.is_none());
        let (path, e) = loaded.ignored.as_ref().expect("fallback reason");
        assert_eq!(path, &default_path);
        assert!(matches!(e, ConfigError::Parse(_)));
        loaded.report();
    }

    #[test]
    fn test_default_file_is_used_when_valid() {
        let dir = tempdir().unwrap();
        let default_path = dir.path().join("config.json");
        fs::write(&default_path, r#"{"agent": {"adapter": "planner"}}"#).unwrap();

        let loaded = Config::load_from(None, &default_path).unwrap();
        assert_eq!(loaded.config.agent.adapter, "planner");
        assert_eq!(loaded.source.as_deref(), Some(default_path.as_path()));
        assert!(loaded.ignored.is_none());

        let absent = Config::load_from(None, &dir.path().join("absent.json")).unwrap();
        assert_eq!(absent.config, Config::default());
        assert!(absent.ignored.is_none());
    }
}
