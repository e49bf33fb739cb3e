//! Background task scheduler
//!
//! The scheduler is responsible for:
//! - Running sensor generation, prediction and anomaly scanning on their own intervals
//! - Keeping each task's failures away from the other two
//! - Applying the configured overlap policy when a tick outlives its interval
//! - Draining in-flight invocations on shutdown

mod task;

pub use task::{AdapterCall, TaskDescriptor, TaskKind, TaskStats, TaskStatus};

use crate::adapters::Adapters;
use crate::config::{OverlapPolicy, SchedulerConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Scheduler state
pub struct Scheduler {
    tasks: Vec<Arc<TaskDescriptor>>,
    overlap: OverlapPolicy,
    started: AtomicBool,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new(config: SchedulerConfig, adapters: &Adapters) -> Arc<Self> {
        let tasks = vec![
            TaskDescriptor::new(
                AdapterCall::Sensor(adapters.sensor.clone()),
                config.sensor_interval,
            ),
            TaskDescriptor::new(
                AdapterCall::Predict(adapters.predictor.clone()),
                config.predict_interval,
            ),
            TaskDescriptor::new(
                AdapterCall::Anomaly(adapters.anomaly.clone()),
                config.anomaly_interval,
            ),
        ];

        Arc::new(Self {
            tasks: tasks.into_iter().map(Arc::new).collect(),
            overlap: config.overlap,
            started: AtomicBool::new(false),
        })
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Current status of every task
    pub async fn snapshot(&self) -> Vec<TaskStatus> {
        let mut statuses = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            statuses.push(task.status().await);
        }
        statuses
    }

    /// Run all task loops until `shutdown` flips to `true`.
    ///
    /// Returns once every loop has stopped and its in-flight invocations have
    /// finished. Only the first call does anything.
    pub async fn start(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("Scheduler already started");
            return;
        }

        let mut loops = JoinSet::new();
        for task in &self.tasks {
            tracing::info!(
                task = task.kind().name(),
                interval_ms = task.interval().as_millis() as u64,
                "{} worker active every {} ms",
                task.kind().name(),
                task.interval().as_millis()
            );
            loops.spawn(run_task(task.clone(), self.overlap, shutdown.clone()));
        }

        tracing::info!(overlap = ?self.overlap, "Scheduler started");

        while let Some(joined) = loops.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Task loop terminated abnormally");
            }
        }

        tracing::info!("Scheduler stopped");
    }
}

/// Tick loop for one task. The first tick fires one full interval after start.
async fn run_task(
    task: Arc<TaskDescriptor>,
    overlap: OverlapPolicy,
    mut shutdown: watch::Receiver<bool>,
) {
    let kind = task.kind();
    let period = task.interval();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight = JoinSet::new();

    if *shutdown.borrow_and_update() {
        return;
    }

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if overlap == OverlapPolicy::Skip && task.in_flight() > 0 {
                    tracing::debug!(task = kind.name(), "Previous run still in flight, skipping tick");
                    task.record_skip().await;
                    continue;
                }

                let guard = task.begin();
                let task = task.clone();
                in_flight.spawn(async move {
                    let _guard = guard;
                    task.run_once().await;
                });
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!(task = kind.name(), error = %e, "Task invocation panicked");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    if !in_flight.is_empty() {
        tracing::info!(
            task = kind.name(),
            pending = in_flight.len(),
            "Waiting for in-flight runs before stopping"
        );
    }
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            tracing::error!(task = kind.name(), error = %e, "Task invocation panicked");
        }
    }
}
