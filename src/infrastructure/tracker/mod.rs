//! Exposure tracker implementations

mod factory;
mod http;
mod in_memory;
mod logging;

pub use factory::{TrackerConfig, TrackerFactory, TrackerType};
pub use http::{HttpExposureTracker, SIGNATURE_HEADER};
pub use in_memory::InMemoryExposureTracker;
pub use logging::LoggingExposureTracker;
