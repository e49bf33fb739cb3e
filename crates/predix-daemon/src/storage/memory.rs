//! In-memory persistence for development and testing

use super::traits::Persistence;
use crate::error::StorageResult;
use async_trait::async_trait;

/// Persistence handle with nothing behind it. Always live.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPersistence;

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }
}
