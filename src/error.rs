use serde::Serialize;
use thiserror::Error;

/// Rejected simulation parameters. Raised before anything is generated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },
    #[error("center latitude {0} is outside -90..=90")]
    LatitudeOutOfRange(f64),
    #[error("center longitude {0} is outside -180..=180")]
    LongitudeOutOfRange(f64),
    #[error("{field} must be greater than zero, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("power demand out of range: total {total_power_mv} mV against {station_power_mv} mV per station")]
    PowerOutOfRange {
        total_power_mv: f64,
        station_power_mv: f64,
    },
    #[error("sensor count {count} is not one of the allowed values {allowed:?}")]
    SensorCountNotAllowed { count: u32, allowed: Vec<u32> },
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}

/// Non-fatal conditions under which the pipeline still produces a valid result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DegenerateInput {
    NoDrySensors,
    SingleDrySensor,
    SparseField { sensor_count: u32 },
}
