use std::time::Duration;

use serde::Deserialize;

use crate::infrastructure::observability::MetricsConfig;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Posterior sampler settings
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SamplerConfig {
    /// Fixed RNG seed; entropy-seeded when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Backing store of snapshots or persisted counts
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
    Disabled,
}

/// Exposure count persistence
///
/// `disabled` keeps counts only in the variation configs.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_store")]
    pub store: StoreBackend,
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default = "default_ledger_table")]
    pub table: String,
}

/// Snapshot store and exposure tracker settings
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub snapshot_store: StoreBackend,
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default = "default_snapshot_table")]
    pub snapshot_table: String,
    #[serde(default = "default_snapshot_timeout_ms")]
    pub snapshot_timeout_ms: u64,
    /// `none`, `log` or `http`
    #[serde(default = "default_tracker")]
    pub tracker: String,
    #[serde(default)]
    pub tracker_url: Option<String>,
    #[serde(default)]
    pub tracker_secret: Option<String>,
    #[serde(default = "default_tracker_timeout_ms")]
    pub tracker_timeout_ms: u64,
}

impl TelemetryConfig {
    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot_timeout_ms)
    }

    pub fn tracker_timeout(&self) -> Duration {
        Duration::from_millis(self.tracker_timeout_ms)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ledger_store() -> StoreBackend {
    StoreBackend::Disabled
}

fn default_ledger_table() -> String {
    "variation_counts".to_string()
}

fn default_snapshot_table() -> String {
    "experiment_logs".to_string()
}

fn default_snapshot_timeout_ms() -> u64 {
    250
}

fn default_tracker() -> String {
    "none".to_string()
}

fn default_tracker_timeout_ms() -> u64 {
    500
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            store: default_ledger_store(),
            postgres_url: None,
            table: default_ledger_table(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            snapshot_store: StoreBackend::default(),
            postgres_url: None,
            snapshot_table: default_snapshot_table(),
            snapshot_timeout_ms: default_snapshot_timeout_ms(),
            tracker: default_tracker(),
            tracker_url: None,
            tracker_secret: None,
            tracker_timeout_ms: default_tracker_timeout_ms(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
