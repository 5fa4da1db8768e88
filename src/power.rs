use serde::Serialize;

use crate::error::ConfigurationError;

/// Ratios this close to a whole number are treated as that number before rounding up.
const WHOLE_STATION_EPS: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerSummary {
    pub total_power_mv: f64,
    pub optimized_power_mv: f64,
    pub station_power_mv: f64,
    pub stations_needed: u32,
    pub total_station_output_mv: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct PowerModel {
    station_power_multiplier: f64,
}

impl PowerModel {
    pub fn new(station_power_multiplier: f64) -> Self {
        Self {
            station_power_multiplier,
        }
    }

    /// Power accounting for a field of `sensor_count` sensors.
    ///
    /// The optimized figure scales total demand by how much 2-Opt shortened the service route;
    /// with no route to shorten it equals the total. Demand that overflows, or that would need
    /// more stations than there are sensors, is rejected.
    pub fn summarize(
        &self,
        power_per_sensor_mv: f64,
        sensor_count: u32,
        initial_length_km: f64,
        optimized_length_km: f64,
    ) -> Result<PowerSummary, ConfigurationError> {
        let total_power_mv = power_per_sensor_mv * f64::from(sensor_count);
        let station_power_mv = self.station_power(power_per_sensor_mv);
        let stations_needed = stations_for(total_power_mv, station_power_mv)
            .filter(|&count| count <= sensor_count.max(1))
            .ok_or(ConfigurationError::PowerOutOfRange {
                total_power_mv,
                station_power_mv,
            })?;
        let optimized_power_mv = if initial_length_km > 0.0 {
            total_power_mv * (optimized_length_km / initial_length_km)
        } else {
            total_power_mv
        };
        Ok(PowerSummary {
            total_power_mv,
            optimized_power_mv,
            station_power_mv,
            stations_needed,
            total_station_output_mv: f64::from(stations_needed) * station_power_mv,
        })
    }

    pub fn station_power(&self, power_per_sensor_mv: f64) -> f64 {
        self.station_power_multiplier * power_per_sensor_mv
    }
}

impl Default for PowerModel {
    fn default() -> Self {
        Self::new(10.0)
    }
}

fn stations_for(total_power_mv: f64, station_power_mv: f64) -> Option<u32> {
    if !total_power_mv.is_finite() || !station_power_mv.is_finite() || station_power_mv <= 0.0 {
        return None;
    }
    if total_power_mv <= 0.0 {
        return Some(0);
    }
    let ratio = total_power_mv / station_power_mv;
    let nearest = ratio.round();
    let stations = if (ratio - nearest).abs() < WHOLE_STATION_EPS {
        nearest
    } else {
        ratio.ceil()
    };
    if stations > f64::from(u32::MAX) {
        return None;
    }
    Some(stations as u32)
}

/// Total tile area of the field in square metres.
pub fn field_area_m2(tile_area_mm2: f64, sensor_count: u32) -> f64 {
    tile_area_mm2 * f64::from(sensor_count) / 1_000_000.0
}
