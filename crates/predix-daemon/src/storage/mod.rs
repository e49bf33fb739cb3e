//! Persistence handle for predix-daemon
//!
//! The core only needs to know whether the database answers. Query logic
//! belongs to the adapters and the REST layer that share the same pool.

mod memory;
mod postgres;
mod traits;

pub use memory::InMemoryPersistence;
pub use postgres::PostgresPersistence;
pub use traits::Persistence;

use crate::config::DaemonConfig;
use crate::error::StorageResult;
use std::sync::Arc;

/// Build the persistence handle selected by configuration
pub fn connect(config: &DaemonConfig) -> StorageResult<Arc<dyn Persistence>> {
    match &config.database_url {
        Some(url) => Ok(Arc::new(PostgresPersistence::new(
            url.expose(),
            config.database_max_connections,
        )?)),
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory persistence");
            Ok(Arc::new(InMemoryPersistence::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;

    #[tokio::test]
    async fn test_connect_without_url_is_in_memory() {
        let persistence = connect(&DaemonConfig::development(3000)).unwrap();
        assert_eq!(persistence.backend(), "memory");
        tokio_test::assert_ok!(persistence.ping().await);
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_url() {
        let config = DaemonConfig {
            database_url: Some(Secret::new("not a url")),
            ..DaemonConfig::development(3000)
        };
        assert!(connect(&config).is_err());
    }
}
