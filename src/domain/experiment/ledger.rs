//! Exposure ledger: the increment-and-persist step of a selection

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::entity::Experiment;
use crate::domain::storage::{StorageEntity, StorageKey};
use crate::domain::DomainError;

/// Records that a variation was shown
///
/// Increments must be atomic with respect to each other: N concurrent calls
/// on the same variation raise its count by exactly N.
#[async_trait]
pub trait ExposureLedger: Send + Sync + std::fmt::Debug {
    /// Increment the exposure count of `variation_index`, returning the new count
    async fn increment(
        &self,
        experiment: &Experiment,
        variation_index: usize,
    ) -> Result<u64, DomainError>;
}

/// Key of a persisted variation count: `{experiment_id}#{variation_index}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariationCountsId(String);

impl VariationCountsId {
    pub fn new(experiment_id: &str, variation_index: usize) -> Self {
        Self(format!("{}#{}", experiment_id, variation_index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl StorageKey for VariationCountsId {
    fn as_str(&self) -> &str {
        &self.0
    }
}

/// Persisted counts of one variation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationCounts {
    id: VariationCountsId,
    pub experiment_id: String,
    pub variation_index: usize,
    pub exposures: u64,
    pub conversions: u64,
}

impl VariationCounts {
    pub fn new(
        experiment_id: impl Into<String>,
        variation_index: usize,
        exposures: u64,
        conversions: u64,
    ) -> Self {
        let experiment_id = experiment_id.into();

        Self {
            id: VariationCountsId::new(&experiment_id, variation_index),
            experiment_id,
            variation_index,
            exposures,
            conversions,
        }
    }

    pub fn id(&self) -> &VariationCountsId {
        &self.id
    }
}

impl StorageEntity for VariationCounts {
    type Key = VariationCountsId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_key() {
        let counts = VariationCounts::new("exp-1", 2, 11, 3);

        assert_eq!(counts.key().as_str(), "exp-1#2");
        assert_eq!(counts.exposures, 11);
    }
}
