//! Experiment domain module for bandit-driven recommendations
//!
//! Types and capability traits for routing a recommendation request to one
//! of an experiment's variations and attributing the returned items to it.

mod correlation;
mod entity;
mod exposure;
mod item;
mod ledger;
mod request;
mod resolver;
mod snapshot;
mod tracker;
mod validation;

pub use correlation::CorrelationId;
pub use entity::{
    coerce_count, Experiment, ExperimentId, ExperimentIdentity, Variation, VariationConfig,
    CONVERSIONS_KEY, EXPOSURES_KEY, MAB_EXPERIMENT_TYPE,
};
pub use exposure::{ExposureAttributes, ExposureEvent, EXPOSURE_EVENT_TYPE};
pub use item::{Item, ItemExperimentStamp, EXPERIMENT_KEY};
pub use ledger::{ExposureLedger, VariationCounts, VariationCountsId};
pub use request::{GetItemsRequest, SelectionOutcome, DEFAULT_NUM_RESULTS};
pub use resolver::{ItemResolver, ResolveRequest};
pub use snapshot::{TelemetrySnapshot, TelemetrySnapshotId};
pub use tracker::ExposureTracker;
pub use validation::{validate_experiment_id, ExperimentValidationError};

#[cfg(test)]
pub use resolver::MockItemResolver;
#[cfg(test)]
pub use tracker::MockExposureTracker;
