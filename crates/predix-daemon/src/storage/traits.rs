//! Persistence trait definition

use crate::error::StorageResult;
use async_trait::async_trait;

/// Shared database handle.
///
/// Implementations are pools: cloning or sharing them across tasks is
/// expected and the core adds no locking of its own.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Short backend name for logs and status output
    fn backend(&self) -> &'static str;

    /// Lightweight liveness check
    async fn ping(&self) -> StorageResult<()>;
}
