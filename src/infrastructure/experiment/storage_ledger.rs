//! Storage-backed exposure ledger

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::experiment::{Experiment, ExposureLedger, VariationCounts, VariationCountsId};
use crate::domain::storage::Storage;
use crate::domain::DomainError;
use crate::infrastructure::observability::{record_telemetry_failure, TelemetrySink};

/// Ledger that bumps the in-config counter and persists the new counts
///
/// Increment and write run under a per-variation lock, so writes land in
/// count order and a later count is never overwritten by an earlier one.
/// A failed write is logged and counted; the in-config count still stands
/// and the caller still gets it.
#[derive(Debug)]
pub struct StorageExposureLedger {
    storage: Arc<dyn Storage<VariationCounts>>,
    locks: Mutex<HashMap<VariationCountsId, Arc<tokio::sync::Mutex<()>>>>,
}

impl StorageExposureLedger {
    /// Create a new storage-backed ledger
    pub fn new(storage: Arc<dyn Storage<VariationCounts>>) -> Self {
        Self {
            storage,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, key: &VariationCountsId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.clone()).or_default())
    }
}

#[async_trait]
impl ExposureLedger for StorageExposureLedger {
    async fn increment(
        &self,
        experiment: &Experiment,
        variation_index: usize,
    ) -> Result<u64, DomainError> {
        let variation = experiment.variation(variation_index).ok_or_else(|| {
            DomainError::not_found(format!(
                "Variation {} not found in experiment '{}'",
                variation_index,
                experiment.id()
            ))
        })?;

        let key = VariationCountsId::new(experiment.id().as_str(), variation_index);
        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        let exposures = variation.config().increment_exposures();
        let counts = VariationCounts::new(
            experiment.id().as_str(),
            variation_index,
            exposures,
            variation.config().conversions(),
        );

        match self.storage.save(counts).await {
            Ok(_) => debug!(key = %key.as_str(), exposures, "Persisted exposure count"),
            Err(e) => {
                warn!(key = %key.as_str(), exposures, error = %e, "Failed to persist exposure count");
                record_telemetry_failure(experiment.id().as_str(), TelemetrySink::Ledger);
            }
        }

        Ok(exposures)
    }
}
