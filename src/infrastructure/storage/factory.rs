//! Storage factory for runtime storage selection

use std::sync::Arc;

use tracing::info;

use crate::domain::storage::{Storage, StorageEntity};
use crate::domain::DomainError;

use super::in_memory::InMemoryStorage;
use super::postgres::{validate_table_name, PostgresConfig, PostgresStorage};

/// Storage configuration
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// In-memory storage bounded to `max_entities`
    InMemory { max_entities: usize },
    /// PostgreSQL storage configuration
    Postgres(PostgresConfig),
}

impl StorageConfig {
    /// Creates an in-memory storage configuration with the default bound
    pub fn in_memory() -> Self {
        Self::InMemory {
            max_entities: super::in_memory::DEFAULT_MAX_ENTITIES,
        }
    }

    /// Creates a PostgreSQL configuration from a URL
    pub fn postgres_url(url: impl Into<String>) -> Self {
        Self::Postgres(PostgresConfig::new(url))
    }
}

/// Factory for creating storage instances
#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Creates a storage instance based on the configuration
    ///
    /// A PostgreSQL store connects and creates its table before it is
    /// returned, so a bad URL or missing permission fails here.
    pub async fn create<E>(
        config: &StorageConfig,
        table_name: &str,
    ) -> Result<Arc<dyn Storage<E>>, DomainError>
    where
        E: StorageEntity + 'static,
    {
        match config {
            StorageConfig::InMemory { max_entities } => {
                info!(table = table_name, max_entities, "Using in-memory storage");
                Ok(Arc::new(InMemoryStorage::<E>::with_max_entities(*max_entities)))
            }
            StorageConfig::Postgres(pg_config) => {
                let storage = Self::create_postgres::<E>(pg_config, table_name).await?;
                info!(table = table_name, "Using PostgreSQL storage");
                Ok(storage)
            }
        }
    }

    async fn create_postgres<E>(
        config: &PostgresConfig,
        table_name: &str,
    ) -> Result<Arc<PostgresStorage<E>>, DomainError>
    where
        E: StorageEntity + 'static,
    {
        validate_table_name(table_name)?;
        let storage = PostgresStorage::connect(config, table_name).await?;
        storage.ensure_table().await?;
        Ok(Arc::new(storage))
    }
}
