//! Predix daemon library
//!
//! This module provides the core components of the monitoring backend:
//! - Bootstrap sequencing and graceful shutdown
//! - The background task scheduler
//! - The authenticated real-time gateway
//! - Health/status endpoints and the CORS boundary

pub mod adapters;
pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod scheduler;
pub mod server;
pub mod simulation;
pub mod storage;

pub use adapters::Adapters;
pub use config::DaemonConfig;
pub use error::{AdapterError, ApiError, DaemonError, StorageError};
pub use gateway::{Admission, Claims, Gateway, RejectReason, TokenVerifier};
pub use scheduler::Scheduler;
pub use server::{RunningServer, Server, ShutdownHandle};
pub use storage::{InMemoryPersistence, Persistence, PostgresPersistence};
