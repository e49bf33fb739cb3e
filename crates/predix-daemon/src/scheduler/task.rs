//! Task descriptors: one per scheduled adapter

use crate::adapters::{AnomalyMonitor, Predictor, SensorGenerator};
use crate::error::AdapterResult;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// The three recurring domain tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Sensor,
    Predict,
    Anomaly,
}

impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::Sensor => "sensor",
            TaskKind::Predict => "predict",
            TaskKind::Anomaly => "anomaly",
        }
    }

    fn error_tag(&self) -> &'static str {
        match self {
            TaskKind::Sensor => "[SENSOR ERROR]",
            TaskKind::Predict => "[AUTO-PREDICT ERROR]",
            TaskKind::Anomaly => "[AUTO-ANOMALY ERROR]",
        }
    }
}

/// Adapter invoked on every tick
#[derive(Clone)]
pub enum AdapterCall {
    Sensor(Arc<dyn SensorGenerator>),
    Predict(Arc<dyn Predictor>),
    Anomaly(Arc<dyn AnomalyMonitor>),
}

impl AdapterCall {
    pub fn kind(&self) -> TaskKind {
        match self {
            AdapterCall::Sensor(_) => TaskKind::Sensor,
            AdapterCall::Predict(_) => TaskKind::Predict,
            AdapterCall::Anomaly(_) => TaskKind::Anomaly,
        }
    }

    /// Run the adapter and reduce its output to an item count
    async fn invoke(&self) -> AdapterResult<usize> {
        match self {
            AdapterCall::Sensor(adapter) => adapter.generate_all().await.map(|logs| logs.len()),
            AdapterCall::Predict(adapter) => adapter.predict_all().await,
            AdapterCall::Anomaly(adapter) => adapter.scan_all().await,
        }
    }
}

/// Counters kept for one task. Transient, never persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskStats {
    pub runs: u64,
    pub failures: u64,
    pub skipped: u64,
    pub last_result: Option<usize>,
    pub last_error: Option<String>,
    pub last_run_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Status view of one task
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub name: &'static str,
    pub interval_ms: u64,
    pub in_flight: usize,
    #[serde(flatten)]
    pub stats: TaskStats,
}

/// One scheduled background task
pub struct TaskDescriptor {
    call: AdapterCall,
    interval: Duration,
    in_flight: Arc<AtomicUsize>,
    stats: RwLock<TaskStats>,
}

impl TaskDescriptor {
    pub fn new(call: AdapterCall, interval: Duration) -> Self {
        Self {
            call,
            interval,
            in_flight: Arc::new(AtomicUsize::new(0)),
            stats: RwLock::new(TaskStats::default()),
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.call.kind()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Mark an invocation as started. The returned guard ends it on drop,
    /// panics included.
    pub(crate) fn begin(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            counter: self.in_flight.clone(),
        }
    }

    /// Invoke the adapter once, log and record the outcome. Never fails.
    pub async fn run_once(&self) {
        let kind = self.kind();
        let result = self.call.invoke().await;

        match &result {
            Ok(count) => log_success(kind, *count),
            Err(e) => {
                tracing::error!(task = kind.name(), error = %e, "{} {}", kind.error_tag(), e)
            }
        }

        let mut stats = self.stats.write().await;
        stats.runs += 1;
        stats.last_run_at = Some(chrono::Utc::now());
        match result {
            Ok(count) => {
                stats.last_result = Some(count);
                stats.last_error = None;
            }
            Err(e) => {
                stats.failures += 1;
                stats.last_error = Some(e.to_string());
            }
        }
    }

    pub(crate) async fn record_skip(&self) {
        let mut stats = self.stats.write().await;
        stats.skipped += 1;
    }

    pub async fn status(&self) -> TaskStatus {
        TaskStatus {
            name: self.kind().name(),
            interval_ms: self.interval.as_millis() as u64,
            in_flight: self.in_flight(),
            stats: self.stats.read().await.clone(),
        }
    }
}

fn log_success(kind: TaskKind, count: usize) {
    match kind {
        TaskKind::Sensor => {
            tracing::info!(task = kind.name(), count, "[SENSOR] Inserted {} logs", count)
        }
        TaskKind::Predict if count > 0 => {
            tracing::info!(task = kind.name(), count, "[PREDICT] Processed {} machines", count)
        }
        TaskKind::Anomaly if count > 0 => {
            tracing::info!(task = kind.name(), count, "[ANOMALY] Scanned {} machines", count)
        }
        _ => {}
    }
}

pub(crate) struct InFlightGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}
