use std::fmt;

use rand::Rng;
use serde::{Serialize, Serializer};

use crate::geo::{Disc, GeoPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SensorId(u32);

impl SensorId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SENSOR_{}", self.0)
    }
}

impl Serialize for SensorId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sensor {
    pub id: SensorId,
    pub lat: f64,
    pub lon: f64,
    pub moisture: f64,
    pub is_dry: bool,
}

impl Sensor {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// Lays out `count` sensors over `disc`, numbered from 1 in generation order.
pub fn generate_field<R: Rng + ?Sized>(
    disc: &Disc,
    count: u32,
    dry_threshold: f64,
    rng: &mut R,
) -> Vec<Sensor> {
    (1..=count)
        .map(|raw| {
            let position = disc.sample(rng);
            let moisture = rng.gen_range(0.0..=100.0);
            Sensor {
                id: SensorId(raw),
                lat: position.lat,
                lon: position.lon,
                moisture,
                is_dry: moisture < dry_threshold,
            }
        })
        .collect()
}

/// Splits the field into `(dry, wet)`, each in generation order.
pub fn partition_dry(sensors: &[Sensor], dry_threshold: f64) -> (Vec<&Sensor>, Vec<&Sensor>) {
    sensors
        .iter()
        .partition(|sensor| sensor.moisture < dry_threshold)
}
