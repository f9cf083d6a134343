//! modelgrid.toml configuration parser.
//!
//! Every field is optional in the file; missing sections fall back to the
//! defaults below so an empty file (or no file at all) is a valid config.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelgridConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub drain: DrainConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port the REST API listens on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Data directory for the embedded database.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrainConfig {
    /// Seconds over which a drained deployment's traffic ramps to zero.
    #[serde(default = "default_ramp_secs")]
    pub ramp_secs: u64,
    /// Ramp used for rollbacks; shorter so bad versions leave fast.
    #[serde(default = "default_rollback_ramp_secs")]
    pub rollback_ramp_secs: u64,
    /// Interval between drain-ramp advancement ticks.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Interval between detection-rule evaluations.
    #[serde(default = "default_detect_interval_secs")]
    pub interval_secs: u64,
    /// Performance rule: alert when a model's accuracy snapshot falls below this.
    #[serde(default = "default_accuracy_floor")]
    pub accuracy_floor: f64,
    /// Drift rule: alert when the latest completed experiment accuracy
    /// diverges from the model snapshot by more than this many points.
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold: f64,
    /// System rule: alert when deployment CPU usage exceeds this percentage.
    #[serde(default = "default_cpu_high_watermark")]
    pub cpu_high_watermark: f64,
    /// System rule: alert when deployment memory usage exceeds this percentage.
    #[serde(default = "default_memory_high_watermark")]
    pub memory_high_watermark: f64,
}

fn default_port() -> u16 {
    8090
}

fn default_data_dir() -> String {
    "/var/lib/modelgrid".to_string()
}

fn default_ramp_secs() -> u64 {
    300
}

fn default_rollback_ramp_secs() -> u64 {
    30
}

fn default_tick_secs() -> u64 {
    5
}

fn default_detect_interval_secs() -> u64 {
    30
}

fn default_accuracy_floor() -> f64 {
    85.0
}

fn default_drift_threshold() -> f64 {
    5.0
}

fn default_cpu_high_watermark() -> f64 {
    90.0
}

fn default_memory_high_watermark() -> f64 {
    90.0
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            ramp_secs: default_ramp_secs(),
            rollback_ramp_secs: default_rollback_ramp_secs(),
            tick_secs: default_tick_secs(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_detect_interval_secs(),
            accuracy_floor: default_accuracy_floor(),
            drift_threshold: default_drift_threshold(),
            cpu_high_watermark: default_cpu_high_watermark(),
            memory_high_watermark: default_memory_high_watermark(),
        }
    }
}

impl ModelgridConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ModelgridConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
