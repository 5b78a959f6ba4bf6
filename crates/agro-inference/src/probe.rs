//! Availability probing for the degraded-mode indicator.
//!
//! The probe is advisory only: analysis still runs when it reports the model
//! as missing, and simply comes back as a degraded result.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::provider::InferenceProvider;

/// Upper bound on a single probe, on top of any provider-level timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Snapshot of a probe for display
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub provider: String,
    pub available: bool,
    /// Where the provider looked
    pub location: Option<String>,
    pub checked_at: String,
}

/// Checks whether the configured provider is ready
#[derive(Clone)]
pub struct AvailabilityProber {
    provider: Arc<dyn InferenceProvider>,
    timeout: Duration,
}

impl AvailabilityProber {
    pub fn new(provider: Arc<dyn InferenceProvider>) -> Self {
        Self {
            provider,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `true` when the provider answered in time and is ready. Never fails.
    pub async fn is_model_available(&self) -> bool {
        match tokio::time::timeout(self.timeout, self.provider.is_available()).await {
            Ok(available) => {
                debug!("{} provider available: {}", self.provider.name(), available);
                available
            }
            Err(_) => {
                warn!(
                    "{} provider probe timed out after {:?}",
                    self.provider.name(),
                    self.timeout
                );
                false
            }
        }
    }

    pub async fn report(&self) -> ProbeReport {
        let available = self.is_model_available().await;
        ProbeReport {
            provider: self.provider.name().to_string(),
            available,
            location: self.provider.location(),
            checked_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}
