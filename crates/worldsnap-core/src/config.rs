//! Configuration loading and typed config structures for Worldsnap.
//!
//! The canonical configuration lives in `worldsnap-config.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure, and
//! provides a loader that reads and validates the file. Sections this crate
//! does not know about (such as the recorder's `recorder:` block) are
//! ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Environment variable that overrides `capture.saves_dir`.
pub const SAVES_DIR_ENV: &str = "WORLDSNAP_SAVES_DIR";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WorldsnapConfig {
    /// Capture session settings.
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WorldsnapConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `WORLDSNAP_SAVES_DIR` overrides `capture.saves_dir` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.capture.apply_env_overrides();
        Ok(config)
    }
}

/// Capture session settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CaptureConfig {
    /// Directory holding one sub-directory per captured level.
    #[serde(default = "default_saves_dir")]
    pub saves_dir: PathBuf,

    /// Level name used for a local session whose world has no name.
    #[serde(default = "default_local_fallback_name")]
    pub local_fallback_name: String,

    /// Minimum milliseconds between recomputations of the missing-container
    /// diagnostic.
    #[serde(default = "default_missing_container_refresh_ms")]
    pub missing_container_refresh_ms: u64,

    /// Milliseconds `stop()` waits for the storage pipeline to wind down
    /// before aborting it.
    #[serde(default = "default_pipeline_join_timeout_ms")]
    pub pipeline_join_timeout_ms: u64,

    /// Replace the local player's private container with a fresh one when
    /// the cache is cleared after a remote session.
    #[serde(default = "default_true")]
    pub reset_private_container_on_clear: bool,
}

impl CaptureConfig {
    /// Override settings with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(SAVES_DIR_ENV) {
            self.saves_dir = PathBuf::from(val);
        }
    }

    /// Debounce interval of the missing-container diagnostic.
    pub const fn missing_container_refresh(&self) -> Duration {
        Duration::from_millis(self.missing_container_refresh_ms)
    }

    /// How long to wait for the storage pipeline on stop.
    pub const fn pipeline_join_timeout(&self) -> Duration {
        Duration::from_millis(self.pipeline_join_timeout_ms)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            saves_dir: default_saves_dir(),
            local_fallback_name: default_local_fallback_name(),
            missing_container_refresh_ms: default_missing_container_refresh_ms(),
            pipeline_join_timeout_ms: default_pipeline_join_timeout_ms(),
            reset_private_container_on_clear: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON-formatted log lines instead of human-readable ones.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_saves_dir() -> PathBuf {
    PathBuf::from("saves")
}

fn default_local_fallback_name() -> String {
    String::from("SinglePlayer")
}

const fn default_missing_container_refresh_ms() -> u64 {
    100
}

const fn default_pipeline_join_timeout_ms() -> u64 {
    5000
}

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    String::from("info")
}
