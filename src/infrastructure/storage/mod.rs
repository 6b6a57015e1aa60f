//! Storage infrastructure - Storage implementations

mod factory;
mod in_memory;
mod postgres;

pub use factory::{StorageConfig, StorageFactory};
pub use in_memory::{InMemoryStorage, DEFAULT_MAX_ENTITIES};
pub use postgres::{validate_table_name, PostgresConfig, PostgresStorage};
