//! Raw sampling snapshots written for auditing the sampler

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::storage::{StorageEntity, StorageKey};

/// Key of a telemetry snapshot: experiment id, capture time and a random suffix
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TelemetrySnapshotId(String);

impl TelemetrySnapshotId {
    /// Generate a new unique key for a snapshot of `experiment_id` taken at `timestamp`
    pub fn generate(experiment_id: &str, timestamp: &str) -> Self {
        Self(format!(
            "{}#{}#{}",
            experiment_id,
            timestamp,
            uuid::Uuid::new_v4().simple()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TelemetrySnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StorageKey for TelemetrySnapshotId {
    fn as_str(&self) -> &str {
        &self.0
    }
}

/// Counts and posterior draws behind one selection decision
///
/// `exposures`, `conversions` and `theta` are index-aligned with the
/// experiment's variations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    id: TelemetrySnapshotId,
    pub experiment_id: String,
    /// UTC ISO-8601 capture time
    pub timestamp: String,
    pub exposures: Vec<u64>,
    pub conversions: Vec<u64>,
    pub theta: Vec<f64>,
}

impl TelemetrySnapshot {
    /// Capture a snapshot stamped with the current time
    pub fn new(
        experiment_id: impl Into<String>,
        exposures: Vec<u64>,
        conversions: Vec<u64>,
        theta: Vec<f64>,
    ) -> Self {
        Self::captured_at(experiment_id, Utc::now(), exposures, conversions, theta)
    }

    /// Capture a snapshot stamped with `at`
    pub fn captured_at(
        experiment_id: impl Into<String>,
        at: DateTime<Utc>,
        exposures: Vec<u64>,
        conversions: Vec<u64>,
        theta: Vec<f64>,
    ) -> Self {
        let experiment_id = experiment_id.into();
        let timestamp = at.to_rfc3339_opts(SecondsFormat::Micros, true);

        Self {
            id: TelemetrySnapshotId::generate(&experiment_id, &timestamp),
            experiment_id,
            timestamp,
            exposures,
            conversions,
            theta,
        }
    }

    pub fn id(&self) -> &TelemetrySnapshotId {
        &self.id
    }
}

impl StorageEntity for TelemetrySnapshot {
    type Key = TelemetrySnapshotId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}
