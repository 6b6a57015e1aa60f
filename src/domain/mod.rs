//! Domain layer - Experiment entities, capabilities and errors

pub mod error;
pub mod experiment;
pub mod storage;

pub use error::DomainError;
pub use experiment::{
    CorrelationId, Experiment, ExperimentId, ExperimentIdentity, ExposureEvent, ExposureTracker,
    GetItemsRequest, Item, ItemExperimentStamp, ItemResolver, ResolveRequest, SelectionOutcome,
    TelemetrySnapshot, Variation, VariationConfig,
};
pub use storage::{Storage, StorageEntity, StorageKey};
