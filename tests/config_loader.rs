use soilgrid::{config::ConfigLoader, engine::Engine, params::SimulationParameters};
use tempfile::tempdir;

#[test]
fn loader_reads_bundled_config() {
    let loader = ConfigLoader::new(env!("CARGO_MANIFEST_DIR"));
    let config = loader
        .load("config/soilgrid.yaml")
        .expect("bundled config parses");
    assert_eq!(config.dry_threshold, 30.0);
    assert_eq!(config.station_power_multiplier, 10.0);
    assert!(config.allowed_sensor_counts.contains(&16));
    assert_eq!(config.telemetry.topic_prefix, "farm");
}

#[test]
fn custom_menu_and_threshold_flow_into_the_engine() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("custom.yaml"),
        "dry_threshold: 100.5\nallowed_sensor_counts: [3]\n",
    )
    .unwrap();
    // Thresholds above 100 are rejected.
    assert!(ConfigLoader::new(dir.path()).load("custom.yaml").is_err());

    std::fs::write(
        dir.path().join("custom.yaml"),
        "dry_threshold: 100.0\nallowed_sensor_counts: [3]\nstation_power_multiplier: 2\n",
    )
    .unwrap();
    let config = ConfigLoader::new(dir.path()).load("custom.yaml").unwrap();
    let engine = Engine::new(config);
    let params = SimulationParameters {
        center_lat: -33.87,
        center_lon: 151.21,
        radius_km: 0.5,
        sensor_count: 3,
        tile_area_mm2: 100.0,
        power_per_sensor_mv: 1.0,
    };
    let result = engine.run(&params, 11).unwrap();
    // Every reading is below 100 unless it lands exactly on the upper bound.
    assert!(result.dry_sensors.len() >= 2);
    assert_eq!(result.power.station_power_mv, 2.0);
    assert_eq!(result.power.stations_needed, 2);

    let rejected = SimulationParameters {
        sensor_count: 16,
        ..params
    };
    assert!(engine.run(&rejected, 11).is_err());
}

#[test]
fn missing_file_reports_its_path() {
    let dir = tempdir().unwrap();
    let err = ConfigLoader::new(dir.path())
        .load("absent.yaml")
        .unwrap_err();
    assert!(format!("{err:#}").contains("absent.yaml"));
}

#[test]
fn tiny_station_multiplier_is_rejected_at_load() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("tiny.yaml"),
        "station_power_multiplier: 1.0e-300\n",
    )
    .unwrap();
    let err = ConfigLoader::new(dir.path()).load("tiny.yaml").unwrap_err();
    assert!(format!("{err:#}").contains("station_power_multiplier"));
}
