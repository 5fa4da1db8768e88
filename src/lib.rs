pub mod config;
pub mod engine;
pub mod error;
pub mod geo;
pub mod params;
pub mod power;
pub mod rng;
pub mod route;
pub mod sensor;
pub mod stations;
pub mod telemetry;
pub mod web;

pub use config::SimulationConfig;
pub use engine::{run_simulation, Engine, SimulationResult};
pub use error::{ConfigurationError, DegenerateInput, SimulationError};
pub use params::SimulationParameters;
