//! Tracker that posts exposure events to an HTTP collector

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use tracing::debug;

use crate::domain::experiment::{ExposureEvent, ExposureTracker};
use crate::domain::DomainError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature when a secret is configured
pub const SIGNATURE_HEADER: &str = "X-Exposure-Signature";

/// Posts each event as JSON to a collector endpoint
///
/// With a secret configured, the body is signed with HMAC-SHA256 and the
/// hex digest is sent as `X-Exposure-Signature: sha256=<hex>`.
pub struct HttpExposureTracker {
    url: String,
    secret: Option<String>,
    http_client: Client,
}

impl std::fmt::Debug for HttpExposureTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpExposureTracker")
            .field("url", &self.url)
            .field("signed", &self.secret.is_some())
            .finish()
    }
}

impl HttpExposureTracker {
    /// Create a tracker posting to `url` with a per-request timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DomainError> {
        let url = url.into();

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(DomainError::configuration(
                "Tracker URL must start with http:// or https://",
            ));
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url,
            secret: None,
            http_client,
        })
    }

    /// Sign request bodies with `secret`
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Generates HMAC-SHA256 signature for a payload
    fn generate_signature(secret: &str, payload: &str) -> Result<String, DomainError> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| DomainError::configuration(format!("Invalid tracker secret: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl ExposureTracker for HttpExposureTracker {
    async fn log_exposure(&self, event: &ExposureEvent) -> Result<(), DomainError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| DomainError::internal(format!("Failed to serialize event: {}", e)))?;

        let mut request = self
            .http_client
            .post(&self.url)
            .header("Content-Type", "application/json");

        if let Some(ref secret) = self.secret {
            let signature = Self::generate_signature(secret, &payload)?;
            request = request.header(SIGNATURE_HEADER, format!("sha256={}", signature));
        }

        let response = request.body(payload).send().await.map_err(|e| {
            if e.is_timeout() {
                DomainError::telemetry_write("Exposure request timed out")
            } else if e.is_connect() {
                DomainError::telemetry_write("Exposure collector unreachable")
            } else {
                DomainError::telemetry_write(format!("Exposure request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::telemetry_write(format!(
                "Exposure collector returned HTTP {}",
                status.as_u16()
            )));
        }

        debug!(
            url = %self.url,
            status = status.as_u16(),
            experiment_id = %event.attributes.experiment.id,
            "Exposure event delivered"
        );

        Ok(())
    }
}
