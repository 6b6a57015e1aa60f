//! Observability configuration

use serde::Deserialize;

/// Prometheus metrics configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Print the rendered metrics when a command finishes
    #[serde(default)]
    pub render_on_exit: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            render_on_exit: false,
        }
    }
}
