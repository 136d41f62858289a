//! Settings for the simulated world, read from the `recorder:` section of
//! `worldsnap-config.yaml`.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::RecorderError;

/// Parameters of the simulated world and the capture run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecorderConfig {
    /// Ticks each producer runs for.
    #[serde(default = "default_ticks")]
    pub ticks: u64,

    /// Number of concurrent producer tasks.
    #[serde(default = "default_producers")]
    pub producers: usize,

    /// Milliseconds between producer ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Regions are drawn from `-world_radius..=world_radius` on both axes.
    #[serde(default = "default_world_radius")]
    pub world_radius: i32,

    /// Level name to capture under. The session default is used when unset.
    #[serde(default)]
    pub level_name: Option<String>,

    /// Simulate a remote session at this address instead of a local world.
    #[serde(default)]
    pub remote_address: Option<String>,

    /// Name of the simulated local world.
    #[serde(default = "default_local_world_name")]
    pub local_world_name: String,

    /// Answer to the overwrite prompt if the level already exists.
    #[serde(default = "default_true")]
    pub overwrite: bool,

    /// Write indented JSON.
    #[serde(default)]
    pub pretty_json: bool,

    /// Ticks between missing-container reports.
    #[serde(default = "default_report_every")]
    pub report_every_ticks: u64,
}

impl RecorderConfig {
    /// Interval between producer ticks.
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Interval between missing-container reports.
    pub const fn report_interval(&self) -> Duration {
        Duration::from_millis(
            self.tick_interval_ms
                .saturating_mul(self.report_every_ticks),
        )
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            ticks: default_ticks(),
            producers: default_producers(),
            tick_interval_ms: default_tick_interval_ms(),
            world_radius: default_world_radius(),
            level_name: None,
            remote_address: None,
            local_world_name: default_local_world_name(),
            overwrite: true,
            pretty_json: false,
            report_every_ticks: default_report_every(),
        }
    }
}

/// Load the `recorder:` section of the YAML file at `path`.
///
/// A missing file or a missing section yields the defaults.
pub fn load(path: &Path) -> Result<RecorderConfig, RecorderError> {
    if !path.exists() {
        return Ok(RecorderConfig::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| RecorderError::RecorderConfig {
        message: format!("failed to read config file: {e}"),
    })?;
    parse(&contents)
}

/// Parse the `recorder:` section out of a full config document.
pub fn parse(yaml: &str) -> Result<RecorderConfig, RecorderError> {
    // Parse the full YAML and extract just the "recorder" section.
    let raw: serde_yml::Value =
        serde_yml::from_str(yaml).map_err(|e| RecorderError::RecorderConfig {
            message: format!("failed to parse config YAML: {e}"),
        })?;

    let Some(section) = raw.get("recorder") else {
        return Ok(RecorderConfig::default());
    };
    let config: RecorderConfig =
        serde_yml::from_value(section.clone()).map_err(|e| RecorderError::RecorderConfig {
            message: format!("failed to parse recorder config: {e}"),
        })?;

    if config.producers == 0 {
        return Err(RecorderError::RecorderConfig {
            message: String::from("recorder.producers must be at least 1"),
        });
    }
    // tokio::time::interval panics on a zero period.
    if config.tick_interval_ms == 0 {
        return Err(RecorderError::RecorderConfig {
            message: String::from("recorder.tick_interval_ms must be at least 1"),
        });
    }
    if config.report_every_ticks == 0 {
        return Err(RecorderError::RecorderConfig {
            message: String::from("recorder.report_every_ticks must be at least 1"),
        });
    }
    if config.world_radius < 0 {
        return Err(RecorderError::RecorderConfig {
            message: String::from("recorder.world_radius must not be negative"),
        });
    }
    Ok(config)
}

const fn default_ticks() -> u64 {
    40
}

const fn default_producers() -> usize {
    4
}

const fn default_tick_interval_ms() -> u64 {
    50
}

const fn default_world_radius() -> i32 {
    6
}

fn default_local_world_name() -> String {
    String::from("Recorder World")
}

const fn default_true() -> bool {
    true
}

const fn default_report_every() -> u64 {
    10
}
