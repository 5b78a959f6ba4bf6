//! The entry point tying a provider and its prober together.

use std::sync::Arc;

use agro_core::{AppConfig, DiagnosisResult, Result, SensorSnapshot};
use agro_vision::ImagePayload;
use tracing::{error, info, warn};

use crate::probe::{AvailabilityProber, ProbeReport};
use crate::provider::{build_provider, InferenceProvider};

/// Diagnosis pipeline over the configured provider
#[derive(Clone)]
pub struct DiagnosisPipeline {
    provider: Arc<dyn InferenceProvider>,
    prober: AvailabilityProber,
}

impl DiagnosisPipeline {
    pub fn new(provider: Arc<dyn InferenceProvider>) -> Self {
        let prober = AvailabilityProber::new(Arc::clone(&provider));
        Self { provider, prober }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let provider = build_provider(config)?;
        let prober = AvailabilityProber::new(Arc::clone(&provider))
            .with_timeout(config.local.probe_timeout());
        Ok(Self { provider, prober })
    }

    pub fn provider(&self) -> &Arc<dyn InferenceProvider> {
        &self.provider
    }

    pub async fn probe(&self) -> ProbeReport {
        self.prober.report().await
    }

    /// Diagnose an image. Always returns a result.
    pub async fn analyze(&self, image: &ImagePayload, sensors: Option<&SensorSnapshot>) -> DiagnosisResult {
        info!(
            "Analysing {} image ({} bytes) with {} provider",
            image.mime_type(),
            image.len(),
            self.provider.name()
        );
        let result = self.provider.classify(image, sensors).await;
        if !result.is_diagnostic() {
            warn!(
                "{} provider returned no diagnosis: {}",
                self.provider.name(),
                result.disease_name
            );
        }
        result
    }

    /// Diagnose a data URI or image path. Unreadable input becomes an image error result.
    pub async fn analyze_input(&self, input: &str, sensors: Option<&SensorSnapshot>) -> DiagnosisResult {
        match ImagePayload::parse(input) {
            Ok(image) => self.analyze(&image, sensors).await,
            Err(e) => {
                error!("Could not read image input: {}", e);
                e.into_diagnosis()
            }
        }
    }
}
