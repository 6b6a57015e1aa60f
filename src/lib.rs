//! MAB Recommender
//!
//! Multi-armed bandit experiments over recommendation resolvers:
//! - Thompson sampling over Beta-Bernoulli posteriors
//! - Atomic exposure counting, optionally persisted
//! - Correlation ids stamped on every returned item
//! - Best-effort sampling snapshots and exposure events

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use crate::config::AppConfig;
pub use crate::domain::{
    CorrelationId, DomainError, Experiment, ExperimentId, ExposureEvent, ExposureTracker,
    GetItemsRequest, Item, ItemResolver, ResolveRequest, SelectionOutcome, VariationConfig,
};
pub use crate::infrastructure::services::BanditSelector;

use std::sync::Arc;

use tracing::info;

use crate::config::{LedgerConfig, StoreBackend, TelemetryConfig};
use crate::domain::experiment::{ExposureLedger, TelemetrySnapshot, VariationCounts};
use crate::infrastructure::experiment::{
    InMemoryExposureLedger, PosteriorSampler, StorageExposureLedger, TelemetryEmitter,
};
use crate::infrastructure::storage::{StorageConfig, StorageFactory};
use crate::infrastructure::tracker::{TrackerConfig, TrackerFactory, TrackerType};

/// Create a selector for `experiment` wired from configuration
pub async fn create_selector(
    config: &AppConfig,
    experiment: Arc<Experiment>,
) -> anyhow::Result<BanditSelector> {
    let telemetry = create_telemetry(&config.telemetry).await?;
    let ledger = create_ledger(&config.ledger).await?;

    if let Some(seed) = config.sampler.seed {
        info!(seed, "Using seeded posterior sampler");
    }

    Ok(BanditSelector::new(experiment)
        .with_sampler(PosteriorSampler::from_seed(config.sampler.seed))
        .with_ledger(ledger)
        .with_telemetry(telemetry))
}

/// Create the snapshot side of telemetry
pub async fn create_telemetry(config: &TelemetryConfig) -> anyhow::Result<TelemetryEmitter> {
    let emitter = match storage_config(config.snapshot_store, config.postgres_url.as_deref())? {
        None => {
            info!("Sampling snapshots disabled");
            TelemetryEmitter::disabled()
        }
        Some(storage_config) => {
            let storage = StorageFactory::create::<TelemetrySnapshot>(
                &storage_config,
                &config.snapshot_table,
            )
            .await?;
            TelemetryEmitter::new(storage)
        }
    };

    Ok(emitter
        .with_snapshot_timeout(config.snapshot_timeout())
        .with_tracker_timeout(config.tracker_timeout()))
}

/// Create the exposure ledger
pub async fn create_ledger(config: &LedgerConfig) -> anyhow::Result<Arc<dyn ExposureLedger>> {
    match storage_config(config.store, config.postgres_url.as_deref())? {
        None => Ok(Arc::new(InMemoryExposureLedger::new())),
        Some(storage_config) => {
            let storage =
                StorageFactory::create::<VariationCounts>(&storage_config, &config.table).await?;
            Ok(Arc::new(StorageExposureLedger::new(storage)))
        }
    }
}

/// Create the configured exposure tracker, if any
pub fn create_tracker(config: &TelemetryConfig) -> anyhow::Result<Option<Arc<dyn ExposureTracker>>> {
    let tracker_type = TrackerType::from_str(&config.tracker)
        .ok_or_else(|| anyhow::anyhow!("Unknown exposure tracker '{}'", config.tracker))?;

    let mut tracker_config = TrackerConfig::new(tracker_type).with_timeout(config.tracker_timeout());
    if let Some(url) = &config.tracker_url {
        tracker_config = tracker_config.with_url(url.clone());
    }
    if let Some(secret) = &config.tracker_secret {
        tracker_config = tracker_config.with_secret(secret.clone());
    }

    Ok(TrackerFactory::create(&tracker_config)?)
}

fn storage_config(
    backend: StoreBackend,
    postgres_url: Option<&str>,
) -> anyhow::Result<Option<StorageConfig>> {
    match backend {
        StoreBackend::Disabled => Ok(None),
        StoreBackend::Memory => Ok(Some(StorageConfig::in_memory())),
        StoreBackend::Postgres => {
            let url = postgres_url
                .map(str::to_string)
                .or_else(|| std::env::var("DATABASE_URL").ok())
                .ok_or_else(|| {
                    anyhow::anyhow!("PostgreSQL store requires postgres_url or DATABASE_URL")
                })?;
            Ok(Some(StorageConfig::postgres_url(url)))
        }
    }
}
