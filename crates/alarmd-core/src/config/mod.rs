//! Configuration parsing and management.
//!
//! The daemon reads an optional TOML file with a `[dispatcher]` and a
//! `[log]` section. Every field has a default, so an empty file (or no file
//! at all) yields a working configuration; CLI flags override file values at
//! the binary boundary.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from configuration loading.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML was invalid.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Serialization back to TOML failed.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The file parsed but a value is unusable.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AlarmdConfig {
    /// Dispatcher configuration.
    #[serde(default)]
    pub dispatcher: DispatcherSection,

    /// Logging configuration.
    #[serde(default)]
    pub log: LogSection,
}

impl AlarmdConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or fails
    /// validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or the dispatcher poll
    /// interval is zero (the dispatcher would spin).
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        if config.dispatcher.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "dispatcher.poll_interval_ms must be nonzero".to_string(),
            ));
        }
        Ok(config)
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Dispatcher configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatcherSection {
    /// How long the dispatcher sleeps when a scan finds nothing to do, in
    /// milliseconds. The scan is a best-effort poll; this bounds how stale a
    /// pending registration or removal can get.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for DispatcherSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogSection {
    /// Log level filter (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}
