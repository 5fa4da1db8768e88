use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use env_logger::Env;

use soilgrid::{
    config::{ConfigLoader, SimulationConfig},
    engine::Engine,
    params::SimulationParameters,
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Soil-moisture sensor field simulator")]
struct Cli {
    /// Path to a YAML configuration file (defaults are used when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one simulation and print the result as JSON
    Run(RunArgs),
    /// Serve the JSON API and telemetry stream
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Field centre latitude in degrees
    #[arg(long, default_value_t = 12.969, allow_negative_numbers = true)]
    lat: f64,

    /// Field centre longitude in degrees
    #[arg(long, default_value_t = 79.159, allow_negative_numbers = true)]
    lon: f64,

    /// Field radius in kilometres
    #[arg(long, default_value_t = 1.0)]
    radius_km: f64,

    /// Number of sensors (must be one of the configured counts)
    #[arg(long, default_value_t = 16)]
    sensors: u32,

    /// Tile area per sensor in mm²
    #[arg(long, default_value_t = 2_500.0)]
    tile_area_mm2: f64,

    /// Power draw per sensor in mV
    #[arg(long, default_value_t = 5.0)]
    power_mv: f64,

    /// Random seed (uses the configured seed when omitted)
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Args)]
struct ServeArgs {
    /// Override the configured listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the configured listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ConfigLoader::new(".").load(path)?,
        None => SimulationConfig::default(),
    };

    match cli.command {
        Command::Run(args) => {
            let seed = args.seed.unwrap_or(config.seed);
            let params = SimulationParameters {
                center_lat: args.lat,
                center_lon: args.lon,
                radius_km: args.radius_km,
                sensor_count: args.sensors,
                tile_area_mm2: args.tile_area_mm2,
                power_per_sensor_mv: args.power_mv,
            };
            let engine = Engine::new(config);
            let result = engine.run(&params, seed)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Serve(args) => {
            let host = args.host.unwrap_or_else(|| config.server.host.clone());
            let port = args.port.unwrap_or(config.server.port);
            web::run(WebServerConfig { config, host, port }).await?;
        }
    }
    Ok(())
}
