//! Tracker factory for runtime tracker selection

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::domain::experiment::ExposureTracker;
use crate::domain::DomainError;

use super::http::HttpExposureTracker;
use super::in_memory::InMemoryExposureTracker;
use super::logging::LoggingExposureTracker;

/// Supported tracker types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerType {
    /// No exposure events are emitted
    None,
    /// Structured log records
    Log,
    /// JSON POST to a collector
    Http,
    /// Kept in process memory
    InMemory,
}

impl TrackerType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "disabled" | "off" => Some(Self::None),
            "log" | "logging" => Some(Self::Log),
            "http" | "https" | "webhook" => Some(Self::Http),
            "memory" | "inmemory" | "in-memory" | "in_memory" => Some(Self::InMemory),
            _ => None,
        }
    }
}

/// Tracker configuration
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub tracker_type: TrackerType,
    pub url: Option<String>,
    pub secret: Option<String>,
    pub timeout: Duration,
}

impl TrackerConfig {
    pub fn new(tracker_type: TrackerType) -> Self {
        Self {
            tracker_type,
            url: None,
            secret: None,
            timeout: Duration::from_millis(500),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Factory for creating exposure trackers
#[derive(Debug)]
pub struct TrackerFactory;

impl TrackerFactory {
    /// Creates the configured tracker, or `None` when tracking is off
    pub fn create(config: &TrackerConfig) -> Result<Option<Arc<dyn ExposureTracker>>, DomainError> {
        let tracker: Arc<dyn ExposureTracker> = match config.tracker_type {
            TrackerType::None => return Ok(None),
            TrackerType::Log => Arc::new(LoggingExposureTracker::new()),
            TrackerType::InMemory => Arc::new(InMemoryExposureTracker::new()),
            TrackerType::Http => {
                let url = config.url.as_deref().ok_or_else(|| {
                    DomainError::configuration("HTTP tracker requires a URL")
                })?;
                let mut tracker = HttpExposureTracker::new(url, config.timeout)?;
                if let Some(secret) = &config.secret {
                    tracker = tracker.with_secret(secret.clone());
                }
                Arc::new(tracker)
            }
        };

        info!(tracker = ?config.tracker_type, "Exposure tracker configured");
        Ok(Some(tracker))
    }
}
