//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::login::LoginPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub login: LoginConfig,

    #[serde(default)]
    pub bulk: BulkConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub url: String,

    /// Explicit WebSocket base for `/ws/logs`; derived from `url` when unset
    #[serde(default)]
    pub logs_ws_url: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            logs_ws_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Where the bearer token and cached user live between invocations
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_file")]
    pub file: String,
}

fn default_session_file() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("likebot").join("session.json").to_string_lossy().to_string())
        .unwrap_or_else(|| "./likebot_session.json".to_string())
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            file: default_session_file(),
        }
    }
}

/// Account login polling parameters
#[derive(Debug, Clone, Deserialize)]
pub struct LoginConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_login_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_poll_errors")]
    pub max_consecutive_errors: u32,
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_login_timeout() -> u64 {
    10 * 60
}

fn default_max_poll_errors() -> u32 {
    5
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            timeout_secs: default_login_timeout(),
            max_consecutive_errors: default_max_poll_errors(),
        }
    }
}

impl LoginConfig {
    pub fn policy(&self) -> LoginPolicy {
        LoginPolicy {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            timeout: Duration::from_secs(self.timeout_secs),
            max_consecutive_errors: self.max_consecutive_errors,
        }
    }
}

/// Bulk operation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BulkConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    6
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("likebot").join("config.toml")),
            Some(PathBuf::from("/etc/likebot/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("LIKEBOT_API_URL") {
            self.api.url = url;
        }
        if let Ok(url) = std::env::var("LIKEBOT_LOGS_WS_URL") {
            self.api.logs_ws_url = Some(url);
        }

        if let Ok(file) = std::env::var("LIKEBOT_SESSION_FILE") {
            self.session.file = file;
        }

        if let Ok(concurrency) = std::env::var("LIKEBOT_BULK_CONCURRENCY") {
            if let Ok(n) = concurrency.parse::<usize>() {
                self.bulk.concurrency = n.max(1);
            }
        }

        if let Ok(level) = std::env::var("LIKEBOT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LIKEBOT_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            session: SessionConfig::default(),
            login: LoginConfig::default(),
            bulk: BulkConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# LikeBot Admin Configuration
#
# Environment variables override these settings:
# - LIKEBOT_API_URL
# - LIKEBOT_LOGS_WS_URL
# - LIKEBOT_SESSION_FILE
# - LIKEBOT_BULK_CONCURRENCY
# - LIKEBOT_LOG_LEVEL
# - LIKEBOT_LOG_FORMAT

[api]
# LikeBot backend base URL
url = "http://localhost:8080"

# WebSocket base for the live log tail (default: derived from url)
# logs_ws_url = "ws://localhost:8080"

# Request timeout in seconds
request_timeout_secs = 30

[session]
# Where the bearer token is kept between runs
file = "~/.local/share/likebot/session.json"

[login]
# Account login status polling
poll_interval_ms = 1000
timeout_secs = 600
max_consecutive_errors = 5

[bulk]
# Parallel requests for bulk delete, auto-assign and CSV import
concurrency = 6

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log format: pretty or json
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.api.url, "http://localhost:8080");
        assert_eq!(config.login.poll_interval_ms, 1000);
        assert_eq!(config.login.timeout_secs, 600);
        assert_eq!(config.login.max_consecutive_errors, 5);
        assert_eq!(config.bulk.concurrency, 6);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::parse("[api]\nurl = \"https://bot.example.com\"\n").unwrap();
        assert_eq!(config.api.url, "https://bot.example.com");
        assert_eq!(config.api.request_timeout_secs, 30);
        assert!(config.api.logs_ws_url.is_none());
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_login_policy_from_config() {
        let policy = LoginConfig::default().policy();
        assert_eq!(policy.poll_interval, Duration::from_secs(1));
        assert_eq!(policy.timeout, Duration::from_secs(600));
        assert_eq!(policy.max_consecutive_errors, 5);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/likebot.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api\nurl = 1").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
