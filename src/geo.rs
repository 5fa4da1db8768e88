//! Geographic primitives shared by every stage of the pipeline.
//!
//! Distances are great-circle distances on a sphere of radius [`EARTH_RADIUS_KM`]. The sampler
//! and the station planner go through the same helpers so that "inside the disc" means the same
//! thing everywhere.

use std::f64::consts::PI;

use rand::Rng;
use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Below this `cos(lat)` an origin is treated as sitting on a pole, where every bearing points
/// along a meridian.
const POLE_COS_EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Haversine distance in kilometres.
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.clamp(0.0, 1.0).sqrt().asin()
}

/// Initial great-circle bearing from `from` to `to`, radians clockwise from north.
pub fn initial_bearing(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlon = (to.lon - from.lon).to_radians();
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    y.atan2(x).rem_euclid(2.0 * PI)
}

/// Point reached by travelling `distance_km` along the great circle leaving `origin` at `bearing`.
pub fn destination(origin: GeoPoint, bearing: f64, distance_km: f64) -> GeoPoint {
    let delta = distance_km / EARTH_RADIUS_KM;
    let lat1 = origin.lat.to_radians();
    let lon1 = origin.lon.to_radians();
    if lat1.cos() < POLE_COS_EPS {
        // The general formula divides out to 0/0 here. Bearing picks the meridian instead,
        // matching what `initial_bearing` reports from a pole.
        let (lat2, lon2) = if lat1 > 0.0 {
            (PI / 2.0 - delta, lon1 + PI - bearing)
        } else {
            (delta - PI / 2.0, lon1 + bearing)
        };
        return GeoPoint {
            lat: lat2.to_degrees(),
            lon: normalize_lon(lon2.to_degrees()),
        };
    }
    let sin_lat2 = lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * bearing.cos();
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();
    let lon2 = lon1
        + (bearing.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * sin_lat2);
    GeoPoint {
        lat: lat2.to_degrees(),
        lon: normalize_lon(lon2.to_degrees()),
    }
}

fn normalize_lon(lon: f64) -> f64 {
    (lon + 540.0).rem_euclid(360.0) - 180.0
}

/// Position in a local plane centred on some origin, kilometres east/north.
///
/// The projection is azimuthal-equidistant: `norm()` equals the great-circle distance from the
/// origin, so convex combinations of projected points stay within any disc around it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LocalOffset {
    pub east_km: f64,
    pub north_km: f64,
}

impl LocalOffset {
    pub fn norm(&self) -> f64 {
        self.east_km.hypot(self.north_km)
    }

    /// Bearing of the offset, radians clockwise from north in [0, 2π).
    pub fn bearing(&self) -> f64 {
        self.east_km.atan2(self.north_km).rem_euclid(2.0 * PI)
    }
}

pub fn to_local(origin: GeoPoint, point: GeoPoint) -> LocalOffset {
    let distance = distance_km(origin, point);
    if distance == 0.0 {
        return LocalOffset::default();
    }
    let bearing = initial_bearing(origin, point);
    LocalOffset {
        east_km: distance * bearing.sin(),
        north_km: distance * bearing.cos(),
    }
}

pub fn from_local(origin: GeoPoint, offset: LocalOffset) -> GeoPoint {
    let distance = offset.norm();
    if distance == 0.0 {
        return origin;
    }
    destination(origin, offset.bearing(), distance)
}

/// Circular sampling area on the Earth's surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Disc {
    pub center: GeoPoint,
    pub radius_km: f64,
}

impl Disc {
    pub fn new(center: GeoPoint, radius_km: f64) -> Self {
        Self { center, radius_km }
    }

    pub fn contains(&self, point: GeoPoint, tolerance_km: f64) -> bool {
        distance_km(self.center, point) <= self.radius_km + tolerance_km
    }

    /// Draws a point uniformly over the disc area.
    ///
    /// Radial distance uses `R * sqrt(u)` so density grows linearly with `r`; sampling `r`
    /// uniformly would crowd the centre.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> GeoPoint {
        let u: f64 = rng.gen();
        let r = self.radius_km * u.sqrt();
        let bearing = rng.gen_range(0.0..2.0 * PI);
        destination(self.center, bearing, r)
    }
}
