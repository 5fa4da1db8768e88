use std::time::Instant;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

use crate::config::SimulationConfig;
use crate::error::{DegenerateInput, SimulationError};
use crate::params::SimulationParameters;
use crate::power::{field_area_m2, PowerModel, PowerSummary};
use crate::rng::{RngManager, FIELD_STREAM};
use crate::route::{verify_plan, Route, RouteOptimizer};
use crate::sensor::{generate_field, partition_dry, Sensor, SensorId};
use crate::stations::{Station, StationPlanner};

#[derive(Clone, Debug, Serialize)]
pub struct StageReport {
    pub name: &'static str,
    pub duration_ms: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct FieldSummary {
    pub sensor_count: u32,
    pub dry_count: u32,
    pub total_area_m2: f64,
}

/// Everything a renderer needs to draw the field, route and station views.
#[derive(Clone, Debug, Serialize)]
pub struct SimulationResult {
    pub seed: Option<u64>,
    pub generated_at: DateTime<Utc>,
    pub parameters: SimulationParameters,
    pub sensors: Vec<Sensor>,
    pub dry_sensors: Vec<SensorId>,
    pub initial_route: Route,
    pub optimized_route: Route,
    pub two_opt_passes: u32,
    pub two_opt_moves: u32,
    pub field: FieldSummary,
    pub power: PowerSummary,
    pub stations: Vec<Station>,
    pub warnings: Vec<DegenerateInput>,
    pub stages: Vec<StageReport>,
}

/// Runs the generation, routing and power-planning pipeline.
///
/// An `Engine` only holds configuration, so one instance can serve concurrent requests; every
/// run builds its own sensors, routes and stations.
pub struct Engine {
    config: SimulationConfig,
    router: RouteOptimizer,
    power: PowerModel,
    planner: StationPlanner,
}

impl Engine {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            router: RouteOptimizer::new(config.route_shape, config.two_opt_max_passes),
            power: PowerModel::new(config.station_power_multiplier),
            planner: StationPlanner::new(),
            config,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn run(
        &self,
        params: &SimulationParameters,
        seed: u64,
    ) -> Result<SimulationResult, SimulationError> {
        let mut rng = RngManager::new(seed);
        let mut field_rng = rng.stream(FIELD_STREAM);
        let mut result = self.run_with_rng(params, &mut field_rng)?;
        result.seed = Some(seed);
        Ok(result)
    }

    pub fn run_with_rng<R: Rng + ?Sized>(
        &self,
        params: &SimulationParameters,
        rng: &mut R,
    ) -> Result<SimulationResult, SimulationError> {
        params.validate(&self.config.allowed_sensor_counts)?;
        // Reject power demand the station model cannot size before any sensor is drawn.
        self.power
            .summarize(params.power_per_sensor_mv, params.sensor_count, 0.0, 0.0)?;

        let mut stages = Vec::with_capacity(5);
        let mut warnings = Vec::new();
        let disc = params.disc();
        let threshold = self.config.dry_threshold;

        let sensors = timed(&mut stages, "sample", || {
            generate_field(&disc, params.sensor_count, threshold, rng)
        });
        if sensors.len() < 2 {
            warnings.push(DegenerateInput::SparseField {
                sensor_count: params.sensor_count,
            });
        }

        let (dry, _) = timed(&mut stages, "dry_filter", || {
            partition_dry(&sensors, threshold)
        });
        match dry.len() {
            0 => warnings.push(DegenerateInput::NoDrySensors),
            1 => warnings.push(DegenerateInput::SingleDrySensor),
            _ => {}
        }

        let plan = timed(&mut stages, "route", || self.router.plan(&dry));
        verify_plan(&plan, &dry)?;

        let power = timed(&mut stages, "power", || {
            self.power.summarize(
                params.power_per_sensor_mv,
                params.sensor_count,
                plan.initial.length_km,
                plan.optimized.length_km,
            )
        })?;

        let stations = timed(&mut stages, "stations", || {
            self.planner.place(&disc, &sensors, power.stations_needed)
        });

        for warning in &warnings {
            log::warn!("degenerate input: {warning:?}");
        }
        log::info!(
            "simulated {} sensors ({} dry): route {:.3} km -> {:.3} km, {} station(s)",
            sensors.len(),
            dry.len(),
            plan.initial.length_km,
            plan.optimized.length_km,
            stations.len()
        );

        let dry_sensors = dry.iter().map(|sensor| sensor.id).collect::<Vec<_>>();
        let field = FieldSummary {
            sensor_count: params.sensor_count,
            dry_count: dry_sensors.len() as u32,
            total_area_m2: field_area_m2(params.tile_area_mm2, params.sensor_count),
        };

        Ok(SimulationResult {
            seed: None,
            generated_at: Utc::now(),
            parameters: params.clone(),
            sensors,
            dry_sensors,
            initial_route: plan.initial,
            optimized_route: plan.optimized,
            two_opt_passes: plan.two_opt_passes,
            two_opt_moves: plan.two_opt_moves,
            field,
            power,
            stations,
            warnings,
            stages,
        })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

fn timed<T>(reports: &mut Vec<StageReport>, name: &'static str, stage: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let output = stage();
    reports.push(StageReport {
        name,
        duration_ms: start.elapsed().as_secs_f64() * 1_000.0,
    });
    output
}

/// Runs one simulation with the default configuration.
pub fn run_simulation(
    params: &SimulationParameters,
    seed: u64,
) -> Result<SimulationResult, SimulationError> {
    Engine::default().run(params, seed)
}
