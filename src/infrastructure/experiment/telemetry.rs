//! Best-effort telemetry for selections
//!
//! Snapshot writes and exposure events never fail a selection. Each write is
//! bounded by a timeout; errors and timeouts are logged, counted and dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::domain::experiment::{ExposureEvent, ExposureTracker, TelemetrySnapshot};
use crate::domain::storage::Storage;
use crate::infrastructure::observability::{record_telemetry_failure, TelemetrySink};

use super::sampler::ArmCounts;

/// Default bound on a snapshot write
pub const DEFAULT_SNAPSHOT_TIMEOUT: Duration = Duration::from_millis(250);
/// Default bound on an exposure event
pub const DEFAULT_TRACKER_TIMEOUT: Duration = Duration::from_millis(500);

/// Writes sampling snapshots and forwards exposure events
#[derive(Debug, Clone)]
pub struct TelemetryEmitter {
    snapshots: Option<Arc<dyn Storage<TelemetrySnapshot>>>,
    snapshot_timeout: Duration,
    tracker_timeout: Duration,
}

impl Default for TelemetryEmitter {
    fn default() -> Self {
        Self::disabled()
    }
}

impl TelemetryEmitter {
    /// Emitter writing snapshots to `snapshots`
    pub fn new(snapshots: Arc<dyn Storage<TelemetrySnapshot>>) -> Self {
        Self {
            snapshots: Some(snapshots),
            snapshot_timeout: DEFAULT_SNAPSHOT_TIMEOUT,
            tracker_timeout: DEFAULT_TRACKER_TIMEOUT,
        }
    }

    /// Emitter without a snapshot store; exposure events are still forwarded
    pub fn disabled() -> Self {
        Self {
            snapshots: None,
            snapshot_timeout: DEFAULT_SNAPSHOT_TIMEOUT,
            tracker_timeout: DEFAULT_TRACKER_TIMEOUT,
        }
    }

    pub fn with_snapshot_timeout(mut self, snapshot_timeout: Duration) -> Self {
        self.snapshot_timeout = snapshot_timeout;
        self
    }

    pub fn with_tracker_timeout(mut self, tracker_timeout: Duration) -> Self {
        self.tracker_timeout = tracker_timeout;
        self
    }

    /// Whether snapshots are written at all
    pub fn records_snapshots(&self) -> bool {
        self.snapshots.is_some()
    }

    /// Persist the counts and draws behind one decision
    pub async fn record_snapshot(&self, experiment_id: &str, counts: &[ArmCounts], theta: &[f64]) {
        let Some(storage) = &self.snapshots else {
            debug!(experiment_id, ?counts, ?theta, "Sampling snapshot (no store configured)");
            return;
        };

        let snapshot = TelemetrySnapshot::new(
            experiment_id,
            counts.iter().map(|c| c.exposures).collect(),
            counts.iter().map(|c| c.conversions).collect(),
            theta.to_vec(),
        );

        match timeout(self.snapshot_timeout, storage.create(snapshot)).await {
            Ok(Ok(saved)) => {
                debug!(experiment_id, key = %saved.id(), "Recorded sampling snapshot");
            }
            Ok(Err(e)) => {
                warn!(experiment_id, error = %e, "Failed to record sampling snapshot");
                record_telemetry_failure(experiment_id, TelemetrySink::Snapshot);
            }
            Err(_) => {
                warn!(
                    experiment_id,
                    timeout_ms = self.snapshot_timeout.as_millis() as u64,
                    "Timed out recording sampling snapshot"
                );
                record_telemetry_failure(experiment_id, TelemetrySink::Snapshot);
            }
        }
    }

    /// Hand an exposure event to the caller's tracker
    pub async fn emit_exposure(&self, tracker: &dyn ExposureTracker, event: &ExposureEvent) {
        let experiment_id = event.attributes.experiment.id.as_str();

        match timeout(self.tracker_timeout, tracker.log_exposure(event)).await {
            Ok(Ok(())) => {
                debug!(
                    experiment_id,
                    variation_index = event.attributes.variation_index,
                    "Logged exposure event"
                );
            }
            Ok(Err(e)) => {
                warn!(experiment_id, error = %e, "Failed to log exposure event");
                record_telemetry_failure(experiment_id, TelemetrySink::Tracker);
            }
            Err(_) => {
                warn!(
                    experiment_id,
                    timeout_ms = self.tracker_timeout.as_millis() as u64,
                    "Timed out logging exposure event"
                );
                record_telemetry_failure(experiment_id, TelemetrySink::Tracker);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::experiment::{
        Experiment, ExperimentId, ItemResolver, MockExposureTracker, MockItemResolver,
        VariationConfig,
    };
    use crate::domain::storage::mock::MockStorage;
    use crate::domain::DomainError;
    use crate::infrastructure::storage::InMemoryStorage;
    use async_trait::async_trait;
    use chrono::Utc;

    fn event() -> ExposureEvent {
        let resolver: Arc<dyn ItemResolver> = Arc::new(MockItemResolver::new());
        let experiment = Experiment::new(ExperimentId::new("exp-1").unwrap(), "feature", "name")
            .unwrap()
            .with_variation(VariationConfig::with_counts(3, 1), resolver);

        ExposureEvent::new(
            "u1",
            experiment.identity(),
            &experiment.variations()[0],
            Utc::now(),
        )
    }

    #[derive(Debug)]
    struct SlowTracker;

    #[async_trait]
    impl ExposureTracker for SlowTracker {
        async fn log_exposure(&self, _event: &ExposureEvent) -> Result<(), DomainError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_record_snapshot_writes_counts_and_theta() {
        let storage = Arc::new(InMemoryStorage::<TelemetrySnapshot>::new());
        let emitter = TelemetryEmitter::new(storage.clone());

        emitter
            .record_snapshot(
                "exp-1",
                &[ArmCounts::new(10, 9), ArmCounts::new(10, 1)],
                &[0.8, 0.2],
            )
            .await;

        let stored = storage.list().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].experiment_id, "exp-1");
        assert_eq!(stored[0].exposures, vec![10, 10]);
        assert_eq!(stored[0].conversions, vec![9, 1]);
        assert_eq!(stored[0].theta, vec![0.8, 0.2]);
    }

    #[tokio::test]
    async fn test_record_snapshot_swallows_storage_errors() {
        let storage = Arc::new(MockStorage::<TelemetrySnapshot>::new().with_error("table unavailable"));
        let emitter = TelemetryEmitter::new(storage.clone());

        emitter
            .record_snapshot("exp-1", &[ArmCounts::new(0, 0)], &[0.5])
            .await;

        assert_eq!(storage.write_attempts(), 1);
    }

    #[tokio::test]
    async fn test_disabled_emitter_skips_snapshots() {
        let emitter = TelemetryEmitter::disabled();

        assert!(!emitter.records_snapshots());
        emitter
            .record_snapshot("exp-1", &[ArmCounts::new(0, 0)], &[0.5])
            .await;
    }

    #[tokio::test]
    async fn test_emit_exposure_forwards_event() {
        let expected = event();
        let mut tracker = MockExposureTracker::new();
        let check = expected.clone();
        tracker
            .expect_log_exposure()
            .withf(move |e| *e == check)
            .times(1)
            .returning(|_| Ok(()));

        TelemetryEmitter::disabled()
            .emit_exposure(&tracker, &expected)
            .await;
    }

    #[tokio::test]
    async fn test_emit_exposure_swallows_tracker_errors() {
        let mut tracker = MockExposureTracker::new();
        tracker
            .expect_log_exposure()
            .times(1)
            .returning(|_| Err(DomainError::telemetry_write("endpoint down")));

        TelemetryEmitter::disabled()
            .emit_exposure(&tracker, &event())
            .await;
    }

    #[tokio::test]
    async fn test_emit_exposure_is_bounded_by_timeout() {
        let emitter = TelemetryEmitter::disabled().with_tracker_timeout(Duration::from_millis(50));
        let started = std::time::Instant::now();

        emitter.emit_exposure(&SlowTracker, &event()).await;

        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
