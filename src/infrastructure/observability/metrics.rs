//! Prometheus metrics for selections and telemetry

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use super::config::MetricsConfig;

/// Selections per experiment and chosen variation
pub const SELECTIONS_TOTAL: &str = "mab_selections_total";
/// End-to-end latency of a selection, resolver call included
pub const GET_ITEMS_DURATION_SECONDS: &str = "mab_get_items_duration_seconds";
/// Dropped telemetry writes per experiment and sink
pub const TELEMETRY_FAILURES_TOTAL: &str = "mab_telemetry_failures_total";

/// Prometheus metrics handle for rendering the exposition text
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    /// Get the metrics in Prometheus text format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}

/// Initialize Prometheus metrics
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            register_default_metrics();

            tracing::info!("Prometheus metrics initialized");

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

fn register_default_metrics() {
    gauge!("mab_recommender_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Telemetry destination that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetrySink {
    Snapshot,
    Tracker,
    Ledger,
}

impl TelemetrySink {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Tracker => "tracker",
            Self::Ledger => "ledger",
        }
    }
}

/// Record a completed selection
pub fn record_selection(experiment_id: &str, variation_index: usize) {
    let labels = [
        ("experiment", experiment_id.to_string()),
        ("variation", variation_index.to_string()),
    ];

    counter!(SELECTIONS_TOTAL, &labels).increment(1);
}

/// Record how long a selection took
pub fn record_get_items_duration(experiment_id: &str, duration: Duration) {
    let labels = [("experiment", experiment_id.to_string())];

    histogram!(GET_ITEMS_DURATION_SECONDS, &labels).record(duration.as_secs_f64());
}

/// Record a dropped telemetry write
pub fn record_telemetry_failure(experiment_id: &str, sink: TelemetrySink) {
    let labels = [
        ("experiment", experiment_id.to_string()),
        ("sink", sink.as_str().to_string()),
    ];

    counter!(TELEMETRY_FAILURES_TOTAL, &labels).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_with<F: FnOnce()>(f: F) -> String {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, f);
        handle.render()
    }

    #[test]
    fn test_record_selection() {
        let output = render_with(|| {
            record_selection("exp-1", 1);
            record_selection("exp-1", 1);
        });

        assert!(output.contains(SELECTIONS_TOTAL));
        assert!(output.contains(r#"experiment="exp-1""#));
        assert!(output.contains(r#"variation="1""#));
    }

    #[test]
    fn test_record_telemetry_failure_labels_sink() {
        let output = render_with(|| {
            record_telemetry_failure("exp-1", TelemetrySink::Snapshot);
            record_telemetry_failure("exp-1", TelemetrySink::Tracker);
            record_telemetry_failure("exp-1", TelemetrySink::Ledger);
        });

        assert!(output.contains(TELEMETRY_FAILURES_TOTAL));
        assert!(output.contains(r#"sink="snapshot""#));
        assert!(output.contains(r#"sink="tracker""#));
        assert!(output.contains(r#"sink="ledger""#));
    }

    #[test]
    fn test_record_duration() {
        let output = render_with(|| {
            record_get_items_duration("exp-1", Duration::from_millis(12));
        });

        assert!(output.contains(GET_ITEMS_DURATION_SECONDS));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_selection("exp-1", 0);
        record_telemetry_failure("exp-1", TelemetrySink::Tracker);
    }
}
