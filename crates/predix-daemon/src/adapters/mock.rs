//! Recording adapters for unit tests

use super::{AnomalyMonitor, Predictor, SensorGenerator, SensorLogRef, TicketJob};
use crate::error::{AdapterError, AdapterResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Records every call with the time elapsed since construction
pub(crate) struct RecordingAdapters {
    started: Instant,
    calls: Arc<Mutex<Vec<(&'static str, Duration)>>>,
    sensor_calls: AtomicUsize,
    completed: AtomicUsize,
    pub fail_sensor_on: Vec<usize>,
    pub sensor_delay: Duration,
    pub sensor_batch: usize,
}

impl RecordingAdapters {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            calls: Arc::new(Mutex::new(Vec::new())),
            sensor_calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            fail_sensor_on: Vec::new(),
            sensor_delay: Duration::ZERO,
            sensor_batch: 3,
        }
    }

    fn record(&self, what: &'static str) {
        self.calls
            .lock()
            .unwrap()
            .push((what, self.started.elapsed()));
    }

    pub fn calls_to(&self, what: &str) -> Vec<Duration> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| *name == what)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn order(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().iter().map(|(name, _)| *name).collect()
    }

    /// Sensor invocations that ran to completion
    pub fn completed_sensor_calls(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SensorGenerator for RecordingAdapters {
    async fn generate_all(&self) -> AdapterResult<Vec<SensorLogRef>> {
        self.record("sensor");
        let call = self.sensor_calls.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.sensor_delay.is_zero() {
            tokio::time::sleep(self.sensor_delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);

        if self.fail_sensor_on.contains(&call) {
            return Err(AdapterError::Failed(format!("sensor call {} failed", call)));
        }

        Ok((0..self.sensor_batch)
            .map(|i| SensorLogRef {
                id: format!("log-{}-{}", call, i),
                machine_id: format!("M-{}", i),
            })
            .collect())
    }
}

#[async_trait]
impl Predictor for RecordingAdapters {
    async fn predict_all(&self) -> AdapterResult<usize> {
        self.record("predict");
        Ok(2)
    }
}

#[async_trait]
impl AnomalyMonitor for RecordingAdapters {
    async fn scan_all(&self) -> AdapterResult<usize> {
        self.record("anomaly");
        Ok(0)
    }
}

/// Time the ticket loop spends finishing after shutdown is raised
pub(crate) const TICKET_DRAIN: Duration = Duration::from_millis(200);

#[async_trait]
impl TicketJob for RecordingAdapters {
    async fn register(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> AdapterResult<Option<JoinHandle<()>>> {
        self.record("tickets");

        let calls = self.calls.clone();
        let started = self.started;
        Ok(Some(tokio::spawn(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
            tokio::time::sleep(TICKET_DRAIN).await;
            calls
                .lock()
                .unwrap()
                .push(("tickets-stopped", started.elapsed()));
        })))
    }
}
