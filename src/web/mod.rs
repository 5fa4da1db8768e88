use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::{net::TcpListener, sync::broadcast};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};

use crate::{
    config::SimulationConfig,
    engine::{Engine, SimulationResult},
    error::SimulationError,
    params::SimulationParameters,
    rng::{RngManager, TELEMETRY_STREAM},
    telemetry::{self, BroadcastSink, LogSink, TelemetryHandle},
};

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
    latest: Arc<Mutex<Option<Arc<SimulationResult>>>>,
    telemetry: TelemetryHandle,
    broadcaster: broadcast::Sender<String>,
    next_seed: Arc<AtomicU64>,
}

pub struct WebServerConfig {
    pub config: SimulationConfig,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
struct SimulateRequest {
    #[serde(flatten)]
    parameters: SimulationParameters,
    #[serde(default)]
    seed: Option<u64>,
}

pub async fn run(server: WebServerConfig) -> Result<()> {
    let WebServerConfig { config, host, port } = server;

    let (tx, _) = broadcast::channel::<String>(512);
    let telemetry_rng = RngManager::new(config.seed).take_stream(TELEMETRY_STREAM);
    let (handle, publisher) = telemetry::channel(
        &config.telemetry,
        (LogSink, BroadcastSink::new(tx.clone())),
        telemetry_rng,
    );
    tokio::spawn(publisher.run());

    let state = Arc::new(AppState {
        next_seed: Arc::new(AtomicU64::new(config.seed)),
        engine: Arc::new(Engine::new(config)),
        latest: Arc::new(Mutex::new(None)),
        telemetry: handle,
        broadcaster: tx,
    });

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;

    log::info!("soilgrid API listening on http://{addr} (Ctrl+C to stop)");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/simulate", post(simulate))
        .route("/api/latest", get(latest))
        .route("/api/config", get(effective_config))
        .route("/api/telemetry", get(stream_telemetry))
        .with_state(state)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    log::info!("Shutting down API...");
}

async fn simulate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SimulateRequest>,
) -> Result<Response, ApiError> {
    let seed = request
        .seed
        .unwrap_or_else(|| state.next_seed.fetch_add(1, Ordering::SeqCst));
    let engine = state.engine.clone();
    let parameters = request.parameters;
    let result = tokio::task::spawn_blocking(move || engine.run(&parameters, seed))
        .await
        .context("simulation task failed")??;

    let result = Arc::new(result);
    *state.latest.lock().expect("latest result lock poisoned") = Some(result.clone());
    state.telemetry.offer(result.clone());
    Ok(Json(&*result).into_response())
}

async fn latest(State(state): State<Arc<AppState>>) -> Response {
    let latest = state
        .latest
        .lock()
        .expect("latest result lock poisoned")
        .clone();
    match latest {
        Some(result) => Json(&*result).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no simulation has run yet" })),
        )
            .into_response(),
    }
}

async fn effective_config(State(state): State<Arc<AppState>>) -> Json<SimulationConfig> {
    Json(state.engine.config().clone())
}

async fn stream_telemetry(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}

#[derive(Debug)]
enum ApiError {
    Simulation(SimulationError),
    Internal(anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Simulation(SimulationError::Configuration(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Simulation(SimulationError::InvariantViolation(_)) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<SimulationError> for ApiError {
    fn from(value: SimulationError) -> Self {
        ApiError::Simulation(value)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        ApiError::Internal(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Simulation(err) => err.to_string(),
            ApiError::Internal(err) => format!("{err:#}"),
        };
        if status.is_server_error() {
            log::error!("request failed: {message}");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
