//! Exposure events handed to trackers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entity::{ExperimentIdentity, Variation};

/// Event type of every exposure event
pub const EXPOSURE_EVENT_TYPE: &str = "Experiment Exposure";

/// One user being shown one variation's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureEvent {
    pub event_type: String,
    /// Milliseconds since the Unix epoch, rounded to the nearest
    pub event_timestamp: i64,
    pub attributes: ExposureAttributes,
}

/// Payload of an exposure event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureAttributes {
    pub user_id: String,
    pub experiment: ExperimentIdentity,
    pub variation_index: usize,
    /// Variation config as it was when the event was built
    pub variation: Map<String, Value>,
}

impl ExposureEvent {
    /// Build the event for a user exposed to `variation`
    pub fn new(
        user_id: impl Into<String>,
        experiment: ExperimentIdentity,
        variation: &Variation,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: EXPOSURE_EVENT_TYPE.to_string(),
            event_timestamp: epoch_millis(timestamp),
            attributes: ExposureAttributes {
                user_id: user_id.into(),
                experiment,
                variation_index: variation.index(),
                variation: variation.config().snapshot(),
            },
        }
    }
}

fn epoch_millis(timestamp: DateTime<Utc>) -> i64 {
    (timestamp.timestamp_micros() + 500).div_euclid(1000)
}
