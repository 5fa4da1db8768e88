use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::geo::{Disc, GeoPoint};

/// Inputs of one simulation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    pub center_lat: f64,
    pub center_lon: f64,
    pub radius_km: f64,
    pub sensor_count: u32,
    pub tile_area_mm2: f64,
    pub power_per_sensor_mv: f64,
}

impl SimulationParameters {
    /// Checks every field against its domain, reporting the first problem found.
    pub fn validate(&self, allowed_sensor_counts: &[u32]) -> Result<(), ConfigurationError> {
        for (field, value) in [
            ("center_lat", self.center_lat),
            ("center_lon", self.center_lon),
            ("radius_km", self.radius_km),
            ("tile_area_mm2", self.tile_area_mm2),
            ("power_per_sensor_mv", self.power_per_sensor_mv),
        ] {
            if !value.is_finite() {
                return Err(ConfigurationError::NonFinite { field, value });
            }
        }

        if !(-90.0..=90.0).contains(&self.center_lat) {
            return Err(ConfigurationError::LatitudeOutOfRange(self.center_lat));
        }
        if !(-180.0..=180.0).contains(&self.center_lon) {
            return Err(ConfigurationError::LongitudeOutOfRange(self.center_lon));
        }

        for (field, value) in [
            ("radius_km", self.radius_km),
            ("tile_area_mm2", self.tile_area_mm2),
            ("power_per_sensor_mv", self.power_per_sensor_mv),
        ] {
            if value <= 0.0 {
                return Err(ConfigurationError::NotPositive { field, value });
            }
        }

        if !allowed_sensor_counts.contains(&self.sensor_count) {
            return Err(ConfigurationError::SensorCountNotAllowed {
                count: self.sensor_count,
                allowed: allowed_sensor_counts.to_vec(),
            });
        }

        Ok(())
    }

    pub fn disc(&self) -> Disc {
        Disc::new(GeoPoint::new(self.center_lat, self.center_lon), self.radius_km)
    }
}
