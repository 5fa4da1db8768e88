//! Publish-only moisture telemetry.
//!
//! The engine hands finished results to a [`TelemetryHandle`], which never waits. A separate
//! [`TelemetryPublisher`] task owns its own copy of the readings, lets them drift each interval
//! and pushes them to a [`TelemetrySink`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

use crate::config::TelemetryConfig;
use crate::engine::SimulationResult;
use crate::sensor::SensorId;

#[derive(Clone, Debug, Serialize)]
pub struct TelemetryReading {
    pub topic: String,
    pub sensor: SensorId,
    pub moisture: f64,
    pub published_at: DateTime<Utc>,
}

pub trait TelemetrySink: Send {
    fn publish(&mut self, reading: &TelemetryReading) -> Result<()>;
}

/// Writes readings to the log.
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn publish(&mut self, reading: &TelemetryReading) -> Result<()> {
        log::info!(target: "telemetry", "{} {:.1}", reading.topic, reading.moisture);
        Ok(())
    }
}

/// Fans readings out as JSON to any number of subscribers.
pub struct BroadcastSink {
    tx: broadcast::Sender<String>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<String>) -> Self {
        Self { tx }
    }
}

impl TelemetrySink for BroadcastSink {
    fn publish(&mut self, reading: &TelemetryReading) -> Result<()> {
        let payload = serde_json::to_string(reading)?;
        // No subscribers is not an error.
        let _ = self.tx.send(payload);
        Ok(())
    }
}

/// Publishes to both sinks, reporting the first failure.
impl<A: TelemetrySink, B: TelemetrySink> TelemetrySink for (A, B) {
    fn publish(&mut self, reading: &TelemetryReading) -> Result<()> {
        let first = self.0.publish(reading);
        let second = self.1.publish(reading);
        first.and(second)
    }
}

#[derive(Clone)]
pub struct TelemetryHandle {
    tx: mpsc::Sender<Arc<SimulationResult>>,
}

impl TelemetryHandle {
    /// Queues a result for publishing. Returns `false` when the queue is full or the publisher
    /// has stopped; the caller is never blocked.
    pub fn offer(&self, result: Arc<SimulationResult>) -> bool {
        match self.tx.try_send(result) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("telemetry queue full, dropping result");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::debug!("telemetry publisher stopped, dropping result");
                false
            }
        }
    }
}

pub struct TelemetryPublisher<S> {
    rx: mpsc::Receiver<Arc<SimulationResult>>,
    sink: S,
    rng: ChaCha8Rng,
    readings: Vec<(SensorId, f64)>,
    topic_prefix: String,
    drift_down: f64,
    drift_up: f64,
    interval: Duration,
}

pub fn channel<S: TelemetrySink>(
    config: &TelemetryConfig,
    sink: S,
    rng: ChaCha8Rng,
) -> (TelemetryHandle, TelemetryPublisher<S>) {
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let publisher = TelemetryPublisher {
        rx,
        sink,
        rng,
        readings: Vec::new(),
        topic_prefix: config.topic_prefix.clone(),
        drift_down: config.drift_down,
        drift_up: config.drift_up,
        interval: Duration::from_secs(config.interval_secs.max(1)),
    };
    (TelemetryHandle { tx }, publisher)
}

impl<S: TelemetrySink> TelemetryPublisher<S> {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Replaces the published sensor set with the one from `result`.
    pub fn load(&mut self, result: &SimulationResult) {
        self.readings = result
            .sensors
            .iter()
            .map(|sensor| (sensor.id, sensor.moisture))
            .collect();
        log::debug!("telemetry now tracking {} sensors", self.readings.len());
    }

    /// Drifts every reading once and publishes it.
    pub fn tick(&mut self) -> Vec<TelemetryReading> {
        let now = Utc::now();
        let mut published = Vec::with_capacity(self.readings.len());
        for (id, moisture) in self.readings.iter_mut() {
            let drift = self.rng.gen_range(-self.drift_down..=self.drift_up);
            *moisture = (*moisture + drift).clamp(0.0, 100.0);
            let reading = TelemetryReading {
                topic: format!("{}/{}/moisture", self.topic_prefix, id),
                sensor: *id,
                moisture: *moisture,
                published_at: now,
            };
            if let Err(err) = self.sink.publish(&reading) {
                log::warn!("failed to publish {}: {err:#}", reading.topic);
            }
            published.push(reading);
        }
        published
    }

    /// Publishes until every [`TelemetryHandle`] has been dropped.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                biased;
                message = self.rx.recv() => match message {
                    Some(result) => self.load(&result),
                    None => break,
                },
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }
        log::info!("telemetry publisher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use rand::SeedableRng;

    use crate::engine::Engine;
    use crate::params::SimulationParameters;

    #[derive(Clone, Default)]
    struct CollectingSink {
        readings: Arc<Mutex<Vec<TelemetryReading>>>,
    }

    impl TelemetrySink for CollectingSink {
        fn publish(&mut self, reading: &TelemetryReading) -> Result<()> {
            self.readings.lock().unwrap().push(reading.clone());
            Ok(())
        }
    }

    fn result() -> Arc<SimulationResult> {
        let params = SimulationParameters {
            center_lat: 12.969,
            center_lon: 79.159,
            radius_km: 1.0,
            sensor_count: 9,
            tile_area_mm2: 2_500.0,
            power_per_sensor_mv: 5.0,
        };
        Arc::new(Engine::default().run(&params, 42).unwrap())
    }

    fn config(capacity: usize) -> TelemetryConfig {
        TelemetryConfig {
            channel_capacity: capacity,
            ..TelemetryConfig::default()
        }
    }

    #[test]
    fn drift_stays_within_bounds() {
        let sink = CollectingSink::default();
        let (_handle, mut publisher) =
            channel(&config(4), sink.clone(), ChaCha8Rng::seed_from_u64(1));
        let source = result();
        publisher.load(&source);
        for _ in 0..50 {
            let before: Vec<f64> = publisher.readings.iter().map(|(_, m)| *m).collect();
            let published = publisher.tick();
            assert_eq!(published.len(), 9);
            for (reading, previous) in published.iter().zip(before) {
                assert!((0.0..=100.0).contains(&reading.moisture));
                let change = reading.moisture - previous;
                assert!((-5.0 - 1e-9..=3.0 + 1e-9).contains(&change), "change {change}");
            }
        }
        assert_eq!(sink.readings.lock().unwrap().len(), 450);
        assert_eq!(
            sink.readings.lock().unwrap()[0].topic,
            "farm/SENSOR_1/moisture"
        );
    }

    #[test]
    fn publishing_never_touches_the_result() {
        let (_handle, mut publisher) =
            channel(&config(4), LogSink, ChaCha8Rng::seed_from_u64(2));
        let source = result();
        let snapshot: Vec<f64> = source.sensors.iter().map(|s| s.moisture).collect();
        publisher.load(&source);
        publisher.tick();
        let after: Vec<f64> = source.sensors.iter().map(|s| s.moisture).collect();
        assert_eq!(snapshot, after);
    }

    #[test]
    fn offer_does_not_wait_when_the_queue_is_full() {
        let (handle, publisher) = channel(&config(1), LogSink, ChaCha8Rng::seed_from_u64(3));
        let source = result();
        assert!(handle.offer(source.clone()));
        assert!(!handle.offer(source.clone()));
        drop(publisher);
        assert!(!handle.offer(source));
    }

    #[test]
    fn paired_sinks_both_receive_readings() {
        let left = CollectingSink::default();
        let right = CollectingSink::default();
        let (_handle, mut publisher) = channel(
            &config(4),
            (left.clone(), right.clone()),
            ChaCha8Rng::seed_from_u64(5),
        );
        publisher.load(&result());
        publisher.tick();
        assert_eq!(left.readings.lock().unwrap().len(), 9);
        assert_eq!(right.readings.lock().unwrap().len(), 9);
    }

    #[tokio::test]
    async fn publisher_runs_until_handles_are_dropped() {
        let sink = CollectingSink::default();
        let (handle, publisher) = channel(&config(4), sink.clone(), ChaCha8Rng::seed_from_u64(4));
        let task = tokio::spawn(publisher.with_interval(Duration::from_millis(10)).run());
        assert!(handle.offer(result()));
        tokio::time::sleep(Duration::from_millis(120)).await;
        drop(handle);
        task.await.unwrap();
        let readings = sink.readings.lock().unwrap();
        assert!(!readings.is_empty());
        assert!(readings.iter().all(|r| r.topic.starts_with("farm/SENSOR_")));
    }
}
