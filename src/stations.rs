//! Power station placement.
//!
//! The field is cut into equal angular sectors around the disc centre, clockwise from north, and
//! one station sits at the centroid of each sector's sensors. This is a coverage heuristic, not a
//! facility-location solve.

use std::f64::consts::PI;

use serde::Serialize;

use crate::geo::{distance_km, from_local, to_local, Disc, GeoPoint, LocalOffset};
use crate::sensor::Sensor;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    pub id: u32,
    pub lat: f64,
    pub lon: f64,
    pub served_sensors: u32,
    pub coverage_radius_km: f64,
}

#[derive(Debug, Clone, Default)]
pub struct StationPlanner;

impl StationPlanner {
    pub fn new() -> Self {
        Self
    }

    pub fn place(&self, disc: &Disc, sensors: &[Sensor], count: u32) -> Vec<Station> {
        if count == 0 {
            return Vec::new();
        }
        let sector_width = 2.0 * PI / f64::from(count);
        let mut sums = vec![(LocalOffset::default(), 0_u32); count as usize];
        for sensor in sensors {
            let offset = to_local(disc.center, sensor.position());
            let sector = ((offset.bearing() / sector_width) as usize).min(count as usize - 1);
            let (sum, members) = &mut sums[sector];
            sum.east_km += offset.east_km;
            sum.north_km += offset.north_km;
            *members += 1;
        }

        let mut stations: Vec<Station> = sums
            .iter()
            .enumerate()
            .map(|(index, (sum, members))| {
                let anchor = if *members > 0 {
                    LocalOffset {
                        east_km: sum.east_km / f64::from(*members),
                        north_km: sum.north_km / f64::from(*members),
                    }
                } else {
                    let bearing = (index as f64 + 0.5) * sector_width;
                    let reach = disc.radius_km / 2.0;
                    LocalOffset {
                        east_km: reach * bearing.sin(),
                        north_km: reach * bearing.cos(),
                    }
                };
                let position = from_local(disc.center, clamp_to_radius(anchor, disc.radius_km));
                Station {
                    id: index as u32 + 1,
                    lat: position.lat,
                    lon: position.lon,
                    served_sensors: 0,
                    coverage_radius_km: 0.0,
                }
            })
            .collect();

        assign_coverage(&mut stations, sensors);
        stations
    }
}

fn clamp_to_radius(offset: LocalOffset, radius_km: f64) -> LocalOffset {
    let norm = offset.norm();
    if norm <= radius_km {
        return offset;
    }
    let scale = radius_km / norm;
    LocalOffset {
        east_km: offset.east_km * scale,
        north_km: offset.north_km * scale,
    }
}

/// Hands each sensor to its nearest station; ties go to the lower station id.
fn assign_coverage(stations: &mut [Station], sensors: &[Sensor]) {
    for sensor in sensors {
        let nearest = stations
            .iter()
            .enumerate()
            .map(|(index, station)| {
                let position = GeoPoint::new(station.lat, station.lon);
                (index, distance_km(position, sensor.position()))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        if let Some((index, distance)) = nearest {
            let station = &mut stations[index];
            station.served_sensors += 1;
            station.coverage_radius_km = station.coverage_radius_km.max(distance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{generate_field, SensorId};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn disc() -> Disc {
        Disc::new(GeoPoint::new(12.9716, 77.5946), 2.0)
    }

    #[test]
    fn places_exactly_the_requested_number_inside_the_disc() {
        let disc = disc();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let field = generate_field(&disc, 49, 30.0, &mut rng);
        for count in [1, 2, 3, 5, 8] {
            let stations = StationPlanner::new().place(&disc, &field, count);
            assert_eq!(stations.len(), count as usize);
            for station in &stations {
                assert!(disc.contains(GeoPoint::new(station.lat, station.lon), 1e-9));
            }
            let served: u32 = stations.iter().map(|s| s.served_sensors).sum();
            assert_eq!(served, 49);
        }
    }

    #[test]
    fn every_sensor_is_within_its_station_coverage() {
        let disc = disc();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let field = generate_field(&disc, 36, 30.0, &mut rng);
        let stations = StationPlanner::new().place(&disc, &field, 4);
        for sensor in &field {
            let (nearest, best) = stations
                .iter()
                .map(|s| distance_km(GeoPoint::new(s.lat, s.lon), sensor.position()))
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .expect("stations exist");
            assert!(stations[nearest].coverage_radius_km >= best);
            assert!(best <= 2.0 * disc.radius_km);
        }
    }

    #[test]
    fn empty_sectors_still_get_a_station() {
        let disc = disc();
        // Single sensor due north; the other sectors are empty.
        let north = crate::geo::destination(disc.center, 0.1, 1.0);
        let field = vec![Sensor {
            id: SensorId::new(1),
            lat: north.lat,
            lon: north.lon,
            moisture: 50.0,
            is_dry: false,
        }];
        let stations = StationPlanner::new().place(&disc, &field, 3);
        assert_eq!(stations.len(), 3);
        let first = GeoPoint::new(stations[0].lat, stations[0].lon);
        assert!(distance_km(first, north) < 1e-6);
        assert_eq!(stations[0].served_sensors, 1);
        for station in &stations[1..] {
            let d = distance_km(disc.center, GeoPoint::new(station.lat, station.lon));
            assert!((d - 1.0).abs() < 1e-6);
            assert_eq!(station.served_sensors, 0);
            assert_eq!(station.coverage_radius_km, 0.0);
        }
    }

    #[test]
    fn zero_stations_for_an_unpowered_field() {
        assert!(StationPlanner::new().place(&disc(), &[], 0).is_empty());
    }
}
