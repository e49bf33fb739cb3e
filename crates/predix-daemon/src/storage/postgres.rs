//! PostgreSQL persistence handle

use super::traits::Persistence;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// PostgreSQL-backed pool
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Build a pool that connects on first use.
    ///
    /// Only a malformed URL fails here; an unreachable server shows up
    /// later through [`Persistence::ping`].
    pub fn new(url: &str, max_connections: u32) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_lazy(url)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl Persistence for PostgresPersistence {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> StorageResult<()> {
        sqlx::query("select 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| StorageError::Query(e.to_string()))
    }
}
