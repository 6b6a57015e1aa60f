//! In-memory exposure ledger: the variation config is the store

use async_trait::async_trait;

use crate::domain::experiment::{Experiment, ExposureLedger};
use crate::domain::DomainError;

/// Ledger that only bumps the atomic counter inside the variation config
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryExposureLedger;

impl InMemoryExposureLedger {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExposureLedger for InMemoryExposureLedger {
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

        Ok(variation.config().increment_exposures())
    }
}
