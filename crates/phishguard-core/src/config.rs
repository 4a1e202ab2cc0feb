//! Configuration management for phishguard
//!
//! Handles loading and validation of `phishguard.toml` configuration files.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name searched for in the user config directory.
pub const CONFIG_FILE_NAME: &str = "phishguard.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Navigation watcher settings
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Relay / analysis service settings
    #[serde(default)]
    pub relay: RelayConfig,

    /// Indicator rendering settings
    #[serde(default)]
    pub renderer: RendererConfig,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-friendly output
    #[default]
    Pretty,
    /// JSON lines
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "unknown log format: {s}. Expected one of: pretty, json"
            )),
        }
    }
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,

    /// Optional log file
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
            log_file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Navigation watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Quiet period before the unconditional initial scan
    #[serde(default = "default_initial_quiet_ms")]
    pub initial_quiet_ms: u64,

    /// Quiet period after an in-page navigation
    #[serde(default = "default_navigation_quiet_ms")]
    pub navigation_quiet_ms: u64,

    /// Poll interval for polling change sources
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            initial_quiet_ms: default_initial_quiet_ms(),
            navigation_quiet_ms: default_navigation_quiet_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl WatcherConfig {
    #[must_use]
    pub fn initial_quiet(&self) -> Duration {
        Duration::from_millis(self.initial_quiet_ms)
    }

    #[must_use]
    pub fn navigation_quiet(&self) -> Duration {
        Duration::from_millis(self.navigation_quiet_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_initial_quiet_ms() -> u64 {
    2000
}

fn default_navigation_quiet_ms() -> u64 {
    1500
}

fn default_poll_interval_ms() -> u64 {
    250
}

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Base URL of the analysis service
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Ceiling for a single relay round-trip
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Capacity of the relay request queue across the boundary
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_ms: default_timeout_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl RelayConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_queue_capacity() -> usize {
    16
}

/// Renderer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Brand prefix shown on every indicator
    #[serde(default = "default_brand")]
    pub brand: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            brand: default_brand(),
        }
    }
}

fn default_brand() -> String {
    "PhishGuard AI".to_string()
}

impl Config {
    /// Load configuration from an explicit path, the user config directory,
    /// or built-in defaults, in that order.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        if let Some(path) = path {
            return Self::load_from(path);
        }

        match Self::default_path() {
            Some(candidate) if candidate.exists() => Self::load_from(&candidate),
            _ => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let display = path.display().to_string();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(display).into());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(display.clone(), e.to_string()))?;
        let config = Self::from_toml(&raw)?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(raw: &str) -> crate::Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Default config location (`<config_dir>/phishguard/phishguard.toml`)
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("phishguard").join(CONFIG_FILE_NAME))
    }

    /// Check value ranges and endpoint syntax
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = url::Url::parse(&self.relay.endpoint).map_err(|e| {
            ConfigError::ValidationError(format!(
                "relay.endpoint {:?} is not a valid URL: {e}",
                self.relay.endpoint
            ))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::ValidationError(format!(
                "relay.endpoint must use http or https, got {}",
                endpoint.scheme()
            )));
        }
        if self.relay.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "relay.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.relay.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "relay.queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.watcher.initial_quiet_ms == 0 || self.watcher.navigation_quiet_ms == 0 {
            return Err(ConfigError::ValidationError(
                "watcher quiet periods must be greater than zero".to_string(),
            ));
        }
        if self.watcher.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "watcher.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
