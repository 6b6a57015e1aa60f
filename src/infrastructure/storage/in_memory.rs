//! In-memory storage implementation

use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::storage::{Storage, StorageEntity, StorageKey};
use crate::domain::DomainError;

/// Default number of entities kept before the oldest are evicted
pub const DEFAULT_MAX_ENTITIES: usize = 100_000;

#[derive(Debug)]
struct Entries<E> {
    by_key: HashMap<String, E>,
    order: VecDeque<String>,
}

impl<E> Default for Entries<E> {
    fn default() -> Self {
        Self {
            by_key: HashMap::new(),
            order: VecDeque::new(),
        }
    }
}

/// Thread-safe in-memory storage implementation
///
/// Keeps insertion order and evicts the oldest entities beyond
/// `max_entities`. Data is lost when the process terminates.
#[derive(Debug)]
pub struct InMemoryStorage<E>
where
    E: StorageEntity,
{
    entries: RwLock<Entries<E>>,
    max_entities: usize,
}

impl<E> Default for InMemoryStorage<E>
where
    E: StorageEntity,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> InMemoryStorage<E>
where
    E: StorageEntity,
{
    /// Creates a new empty in-memory storage
    pub fn new() -> Self {
        Self::with_max_entities(DEFAULT_MAX_ENTITIES)
    }

    /// Creates a storage that keeps at most `max_entities`
    pub fn with_max_entities(max_entities: usize) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            max_entities: max_entities.max(1),
        }
    }

    fn insert_new(entries: &mut Entries<E>, key: String, entity: E, max_entities: usize) {
        entries.order.push_back(key.clone());
        entries.by_key.insert(key, entity);

        while entries.by_key.len() > max_entities {
            match entries.order.pop_front() {
                Some(oldest) => {
                    entries.by_key.remove(&oldest);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl<E> Storage<E> for InMemoryStorage<E>
where
    E: StorageEntity + 'static,
{
    async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError> {
        let entries = self.entries.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(entries.by_key.get(key.as_str()).cloned())
    }

    async fn list(&self) -> Result<Vec<E>, DomainError> {
        let entries = self.entries.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(entries
            .order
            .iter()
            .filter_map(|key| entries.by_key.get(key).cloned())
            .collect())
    }

    async fn create(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().as_str().to_string();
        let mut entries = self.entries.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        if entries.by_key.contains_key(&key) {
            return Err(DomainError::conflict(format!(
                "Entity with key '{}' already exists",
                key
            )));
        }

        Self::insert_new(&mut entries, key, entity.clone(), self.max_entities);
        Ok(entity)
    }

    async fn update(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().as_str().to_string();
        let mut entries = self.entries.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        match entries.by_key.get_mut(&key) {
            Some(existing) => {
                *existing = entity.clone();
                Ok(entity)
            }
            None => Err(DomainError::not_found(format!(
                "Entity with key '{}' not found",
                key
            ))),
        }
    }

    async fn save(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().as_str().to_string();
        let mut entries = self.entries.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        if let Some(existing) = entries.by_key.get_mut(&key) {
            *existing = entity.clone();
        } else {
            Self::insert_new(&mut entries, key, entity.clone(), self.max_entities);
        }

        Ok(entity)
    }

    async fn exists(&self, key: &E::Key) -> Result<bool, DomainError> {
        let entries = self.entries.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(entries.by_key.contains_key(key.as_str()))
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let entries = self.entries.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(entries.by_key.len())
    }
}
