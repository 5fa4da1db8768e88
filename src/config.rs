use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::route::RouteShape;

fn default_dry_threshold() -> f64 {
    30.0
}

fn default_station_power_multiplier() -> f64 {
    10.0
}

fn default_allowed_sensor_counts() -> Vec<u32> {
    vec![4, 9, 16, 25, 36, 49, 64, 81, 100]
}

fn default_two_opt_max_passes() -> u32 {
    200
}

fn default_seed() -> u64 {
    42
}

fn default_interval_secs() -> u64 {
    3
}

fn default_channel_capacity() -> usize {
    16
}

fn default_topic_prefix() -> String {
    "farm".to_string()
}

fn default_drift_down() -> f64 {
    5.0
}

fn default_drift_up() -> f64 {
    3.0
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_dry_threshold")]
    pub dry_threshold: f64,
    #[serde(default = "default_station_power_multiplier")]
    pub station_power_multiplier: f64,
    #[serde(default = "default_allowed_sensor_counts")]
    pub allowed_sensor_counts: Vec<u32>,
    #[serde(default = "default_two_opt_max_passes")]
    pub two_opt_max_passes: u32,
    #[serde(default)]
    pub route_shape: RouteShape,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dry_threshold: default_dry_threshold(),
            station_power_multiplier: default_station_power_multiplier(),
            allowed_sensor_counts: default_allowed_sensor_counts(),
            two_opt_max_passes: default_two_opt_max_passes(),
            route_shape: RouteShape::default(),
            seed: default_seed(),
            telemetry: TelemetryConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    /// Largest drop in moisture per publish tick.
    #[serde(default = "default_drift_down")]
    pub drift_down: f64,
    /// Largest rise in moisture per publish tick.
    #[serde(default = "default_drift_up")]
    pub drift_up: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            channel_capacity: default_channel_capacity(),
            topic_prefix: default_topic_prefix(),
            drift_down: default_drift_down(),
            drift_up: default_drift_up(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            (0.0..=100.0).contains(&self.dry_threshold),
            "dry_threshold must be within 0..=100, got {}",
            self.dry_threshold
        );
        anyhow::ensure!(
            self.station_power_multiplier.is_finite() && self.station_power_multiplier >= 1.0,
            "station_power_multiplier must be a finite number of at least 1, got {}",
            self.station_power_multiplier
        );
        anyhow::ensure!(
            !self.allowed_sensor_counts.is_empty(),
            "allowed_sensor_counts must list at least one value"
        );
        anyhow::ensure!(
            self.telemetry.channel_capacity > 0,
            "telemetry.channel_capacity must be greater than zero"
        );
        anyhow::ensure!(
            self.telemetry.drift_down >= 0.0 && self.telemetry.drift_up >= 0.0,
            "telemetry drift bounds must be non-negative"
        );
        Ok(())
    }
}

pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<SimulationConfig> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: SimulationConfig = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        log::info!("Loaded configuration file: {}", path.display());
        Ok(config)
    }
}
