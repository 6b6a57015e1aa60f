//! Exposure tracker capability

use async_trait::async_trait;

use super::exposure::ExposureEvent;
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Receives exposure events for later join with conversion events
///
/// Retry and delivery policy belong to the implementation. The selector
/// treats any error as a telemetry failure and drops it.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExposureTracker: Send + Sync {
    /// Record one exposure
    async fn log_exposure(&self, event: &ExposureEvent) -> Result<(), DomainError>;
}
