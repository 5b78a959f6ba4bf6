//! The inference provider abstraction.

use std::sync::Arc;

use agro_core::{AppConfig, DiagnosisResult, FusionEngine, ProviderKind, Result, SensorSnapshot};
use agro_vision::ImagePayload;
use async_trait::async_trait;

use crate::local::LocalClassifierProvider;
use crate::remote::RemoteDiagnosisProvider;

/// Turns a leaf photo into a diagnosis.
///
/// Implementations never fail: every error is folded into a degraded
/// `Uncertain` result.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Short provider name for logs and reports
    fn name(&self) -> &'static str;

    /// Where the provider looks for its model or service, if anywhere
    fn location(&self) -> Option<String> {
        None
    }

    /// Cheap readiness check. Never fails.
    async fn is_available(&self) -> bool;

    /// Diagnose an image, optionally enriched with sensor readings
    async fn classify(&self, image: &ImagePayload, sensors: Option<&SensorSnapshot>) -> DiagnosisResult;
}

/// Build the provider selected by the configuration
pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn InferenceProvider>> {
    let fusion = FusionEngine::new(config.fusion);

    let provider: Arc<dyn InferenceProvider> = match config.provider {
        ProviderKind::Local => Arc::new(LocalClassifierProvider::from_config(config)?.with_fusion(fusion)),
        ProviderKind::Remote => Arc::new(RemoteDiagnosisProvider::from_config(&config.remote)?.with_fusion(fusion)),
    };

    tracing::debug!("Using {} inference provider", provider.name());
    Ok(provider)
}
