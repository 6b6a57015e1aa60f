//! Tracker that writes exposure events to the log

use async_trait::async_trait;
use tracing::info;

use crate::domain::experiment::{ExposureEvent, ExposureTracker};
use crate::domain::DomainError;

/// Emits one structured `info` record per exposure
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingExposureTracker;

impl LoggingExposureTracker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExposureTracker for LoggingExposureTracker {
    async fn log_exposure(&self, event: &ExposureEvent) -> Result<(), DomainError> {
        let variation = serde_json::to_string(&event.attributes.variation)
            .map_err(|e| DomainError::internal(format!("Failed to serialize variation: {}", e)))?;

        info!(
            target: "mab_recommender::exposure",
            event_type = %event.event_type,
            event_timestamp = event.event_timestamp,
            user_id = %event.attributes.user_id,
            experiment_id = %event.attributes.experiment.id,
            feature = %event.attributes.experiment.feature,
            variation_index = event.attributes.variation_index,
            variation = %variation,
            "Experiment exposure"
        );

        Ok(())
    }
}
