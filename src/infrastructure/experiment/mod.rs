//! Infrastructure layer for bandit experiments
//!
//! Thompson sampler, exposure ledgers and best-effort telemetry.

mod in_memory_ledger;
mod sampler;
mod storage_ledger;
mod telemetry;

pub use in_memory_ledger::InMemoryExposureLedger;
pub use sampler::{argmax_first, ArmCounts, PosteriorDraw, PosteriorSampler};
pub use storage_ledger::StorageExposureLedger;
pub use telemetry::{TelemetryEmitter, DEFAULT_SNAPSHOT_TIMEOUT, DEFAULT_TRACKER_TIMEOUT};
