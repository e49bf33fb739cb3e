//! Health and status handlers

use crate::api::rest::state::AppState;
use crate::scheduler::TaskStatus;
use axum::{extract::State, Json};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
    })
}

/// Daemon status response
#[derive(Debug, Serialize)]
pub struct DaemonStatusResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub database: DatabaseStatus,
    pub connections: usize,
    pub scheduler_started: bool,
    pub tasks: Vec<TaskStatus>,
}

/// Persistence reachability
#[derive(Debug, Serialize)]
pub struct DatabaseStatus {
    pub backend: &'static str,
    pub reachable: bool,
}

/// Daemon status endpoint. Reports `degraded` while the database is unreachable.
pub async fn daemon_status(State(state): State<AppState>) -> Json<DaemonStatusResponse> {
    let reachable = match state.persistence.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "Status check could not reach database");
            false
        }
    };

    Json(DaemonStatusResponse {
        status: if reachable { "healthy" } else { "degraded" }.to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
        started_at: state.started_at,
        database: DatabaseStatus {
            backend: state.persistence.backend(),
            reachable,
        },
        connections: state.gateway.connection_count().await,
        scheduler_started: state.scheduler.is_started(),
        tasks: state.scheduler.snapshot().await,
    })
}
