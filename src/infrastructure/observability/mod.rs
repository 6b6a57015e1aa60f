//! Observability infrastructure - Prometheus metrics

mod config;
mod metrics;

pub use self::config::MetricsConfig;
pub use self::metrics::{
    init_metrics, record_get_items_duration, record_selection, record_telemetry_failure,
    PrometheusMetrics, TelemetrySink, GET_ITEMS_DURATION_SECONDS, SELECTIONS_TOTAL,
    TELEMETRY_FAILURES_TOTAL,
};
