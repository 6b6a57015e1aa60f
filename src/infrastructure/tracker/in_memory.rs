//! Tracker that keeps exposure events in memory

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::experiment::{ExposureEvent, ExposureTracker};
use crate::domain::DomainError;

/// Collects every event it receives, for tests and simulations
#[derive(Debug, Default)]
pub struct InMemoryExposureTracker {
    events: Mutex<Vec<ExposureEvent>>,
}

impl InMemoryExposureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, in arrival order
    pub fn events(&self) -> Vec<ExposureEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of events received for `variation_index`
    pub fn count_for(&self, variation_index: usize) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.attributes.variation_index == variation_index)
            .count()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ExposureTracker for InMemoryExposureTracker {
    async fn log_exposure(&self, event: &ExposureEvent) -> Result<(), DomainError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}
