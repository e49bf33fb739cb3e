//! Error types for predix-daemon

use crate::gateway::RejectReason;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error. The only error class that stops the process.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DaemonError {
    /// Whether this error must terminate the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DaemonError::Config(_))
    }
}

/// Storage-specific errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query error
    #[error("Query error: {0}")]
    Query(String),
}

/// Errors reported by external task adapters
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Adapter reported a failure of its own
    #[error("{0}")]
    Failed(String),

    /// Anything else bubbling out of an adapter
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Real-time handshake refused
    #[error("{0}")]
    Unauthorized(RejectReason),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Unauthorized(reason) => (StatusCode::UNAUTHORIZED, reason.code()),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for adapter calls
pub type AdapterResult<T> = Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(
            ApiError::Unauthorized(RejectReason::NoTokenProvided)
                .into_response()
                .status(),
            StatusCode::UNAUTHORIZED
        );

        assert_eq!(
            ApiError::Unauthorized(RejectReason::InvalidToken).to_string(),
            "INVALID_TOKEN"
        );
    }

    #[test]
    fn test_only_config_errors_are_fatal() {
        assert!(DaemonError::Config("PORT is not set".to_string()).is_fatal());
        assert!(!DaemonError::Server("bind failed".to_string()).is_fatal());
        assert!(!DaemonError::Storage(StorageError::Connection("refused".to_string())).is_fatal());
    }
}
