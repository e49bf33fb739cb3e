//! External task adapter contracts
//!
//! The daemon schedules these operations but never looks inside them. Each
//! call may fail; failures are logged by the caller and never escalate.

#[cfg(test)]
pub(crate) mod mock;

use crate::error::AdapterResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Reference to one inserted sensor log row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorLogRef {
    pub id: String,
    pub machine_id: String,
}

/// Generates one batch of sensor readings for every machine
#[async_trait]
pub trait SensorGenerator: Send + Sync {
    async fn generate_all(&self) -> AdapterResult<Vec<SensorLogRef>>;
}

/// Scores every machine; returns how many were processed
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict_all(&self) -> AdapterResult<usize>;
}

/// Scans every machine for anomalies; returns how many were scanned or flagged
#[async_trait]
pub trait AnomalyMonitor: Send + Sync {
    async fn scan_all(&self) -> AdapterResult<usize>;
}

/// Ticket creation job. Owns its own recurring schedule once registered and
/// stops it when `shutdown` flips to `true`.
///
/// A job that spawns its loop returns the task handle so shutdown can wait
/// for a run that is already under way.
#[async_trait]
pub trait TicketJob: Send + Sync {
    async fn register(
        &self,
        shutdown: watch::Receiver<bool>,
    ) -> AdapterResult<Option<JoinHandle<()>>>;
}

/// The four collaborators the daemon drives
#[derive(Clone)]
pub struct Adapters {
    pub sensor: Arc<dyn SensorGenerator>,
    pub predictor: Arc<dyn Predictor>,
    pub anomaly: Arc<dyn AnomalyMonitor>,
    pub tickets: Arc<dyn TicketJob>,
}

impl Adapters {
    /// Use one object for all four roles
    pub fn from_shared<T>(adapter: Arc<T>) -> Self
    where
        T: SensorGenerator + Predictor + AnomalyMonitor + TicketJob + 'static,
    {
        Self {
            sensor: adapter.clone(),
            predictor: adapter.clone(),
            anomaly: adapter.clone(),
            tickets: adapter,
        }
    }
}

