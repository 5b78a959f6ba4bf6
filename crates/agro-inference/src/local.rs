//! On-device leaf classifier provider.
//!
//! The model is loaded lazily on the first `classify`. Concurrent first
//! calls share a single fetch; a failed load leaves nothing cached, so the
//! next call tries again. The loaded model lives as long as the provider.

use std::sync::Arc;
use std::time::Duration;

use agro_core::{
    knowledge, AppConfig, DiagnosisResult, Error, FusionEngine, LocalModelConfig, Result, SensorSnapshot,
};
use agro_vision::{ImagePayload, ImagePreprocessor};
use async_trait::async_trait;
use image::DynamicImage;
use reqwest::Client;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::decoder::Decoder;
use crate::loader::{BurnModelLoader, ModelLoader};
use crate::location::{self, resolver_for, ModelLocation, PathResolver};
use crate::model::Classifier;
use crate::provider::InferenceProvider;

/// Runs the bundled CNN on the local machine
pub struct LocalClassifierProvider {
    descriptor: ModelLocation,
    loader: Arc<dyn ModelLoader>,
    model: OnceCell<Arc<dyn Classifier>>,
    preprocessor: ImagePreprocessor,
    decoder: Decoder,
    fusion: FusionEngine,
    client: Client,
    probe_timeout: Duration,
    load_timeout: Duration,
    inference_timeout: Duration,
}

impl LocalClassifierProvider {
    /// Create a provider for the descriptor at `descriptor`
    pub fn new(descriptor: ModelLocation, loader: Arc<dyn ModelLoader>) -> Self {
        let defaults = LocalModelConfig::default();
        Self {
            descriptor,
            loader,
            model: OnceCell::new(),
            preprocessor: ImagePreprocessor::default(),
            decoder: Decoder,
            fusion: FusionEngine::default(),
            client: Client::new(),
            probe_timeout: defaults.probe_timeout(),
            load_timeout: defaults.load_timeout(),
            inference_timeout: defaults.inference_timeout(),
        }
    }

    /// Resolve `descriptor_path` through `resolver` and create a provider for it
    pub fn with_resolver(
        resolver: &dyn PathResolver,
        descriptor_path: &str,
        loader: Arc<dyn ModelLoader>,
    ) -> Result<Self> {
        let descriptor = resolver.resolve(descriptor_path)?;
        Ok(Self::new(descriptor, loader))
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let local = &config.local;
        let resolver = resolver_for(&local.base_url)?;
        let loader = Arc::new(BurnModelLoader::new(local.load_timeout())?);

        Ok(Self::with_resolver(resolver.as_ref(), &local.descriptor_path, loader)?
            .with_preprocessor(ImagePreprocessor::new(config.preprocess))
            .with_timeouts(local.probe_timeout(), local.load_timeout(), local.inference_timeout()))
    }

    pub fn with_fusion(mut self, fusion: FusionEngine) -> Self {
        self.fusion = fusion;
        self
    }

    pub fn with_preprocessor(mut self, preprocessor: ImagePreprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn with_timeouts(mut self, probe: Duration, load: Duration, inference: Duration) -> Self {
        self.probe_timeout = probe;
        self.load_timeout = load;
        self.inference_timeout = inference;
        self
    }

    /// Resolved descriptor location
    pub fn descriptor(&self) -> &ModelLocation {
        &self.descriptor
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Get the classifier, loading it on first use.
    ///
    /// Returns `None` when loading fails; the failure is logged and not cached.
    pub async fn load(&self) -> Option<Arc<dyn Classifier>> {
        let result = self
            .model
            .get_or_try_init(|| async {
                info!("Loading leaf classifier from {}", self.descriptor);
                match tokio::time::timeout(self.load_timeout, self.loader.load(&self.descriptor)).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::ModelUnavailable(format!(
                        "loading timed out after {:?}",
                        self.load_timeout
                    ))),
                }
            })
            .await;

        match result {
            Ok(model) => Some(Arc::clone(model)),
            Err(e) => {
                error!("Error loading model from {}: {}", self.descriptor, e);
                None
            }
        }
    }

    /// Run CPU-bound work off the async runtime, bounded by the inference timeout
    async fn run_blocking<T, F>(&self, stage: &str, task: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        match tokio::time::timeout(self.inference_timeout, tokio::task::spawn_blocking(task)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(Error::Inference(format!("{stage} task failed: {e}"))),
            Err(_) => Err(Error::Inference(format!(
                "{stage} timed out after {:?}",
                self.inference_timeout
            ))),
        }
    }

    async fn decode(&self, image: &ImagePayload) -> Result<DynamicImage> {
        let preprocessor = self.preprocessor;
        let image = image.clone();
        self.run_blocking("decoding", move || preprocessor.decode(&image)).await
    }

    /// The configured preprocessor, resized to the edge length the model was built for
    fn preprocessor_for(&self, model: &dyn Classifier) -> Result<ImagePreprocessor> {
        let size = u32::try_from(model.input_size())
            .map_err(|_| Error::Inference(format!("model input size {} is too large", model.input_size())))?;
        if size == self.preprocessor.image_size() {
            return Ok(self.preprocessor);
        }
        debug!(
            "Model expects {}x{} input, overriding configured {}x{}",
            size,
            size,
            self.preprocessor.image_size(),
            self.preprocessor.image_size()
        );
        Ok(ImagePreprocessor::with_size(size))
    }

    async fn predict(&self, model: Arc<dyn Classifier>, image: DynamicImage) -> Result<Vec<f32>> {
        let preprocessor = self.preprocessor_for(model.as_ref())?;
        self.run_blocking("inference", move || {
            let tensor = preprocessor.preprocess_image(&image)?;
            model.predict(&tensor)
        })
        .await
    }

    /// Full pipeline with errors surfaced
    pub async fn try_classify(
        &self,
        image: &ImagePayload,
        sensors: Option<&SensorSnapshot>,
    ) -> Result<DiagnosisResult> {
        // Decode before loading so a bad photo never triggers a model fetch
        let decoded = self.decode(image).await?;

        let model = self.load().await.ok_or_else(|| {
            Error::ModelUnavailable(format!("could not load model from {}", self.descriptor))
        })?;

        let probabilities = self.predict(model, decoded).await?;
        let prediction = self.decoder.decode(&probabilities)?;

        if !prediction.is_known() {
            warn!(
                "Unknown class index {} (p = {:.3}), no knowledge base entry",
                prediction.record.index, prediction.probability
            );
        }
        debug!(
            "Top-1: {} [{}] ({}%)",
            prediction.record.name,
            knowledge::class_label(prediction.record.index).unwrap_or("?"),
            prediction.confidence
        );

        let record = prediction.record;
        let recommendations = self.fusion.fuse(&record.recommendations, sensors);

        Ok(DiagnosisResult::new(
            record.status,
            record.name,
            prediction.confidence,
            record.description,
            recommendations,
        ))
    }
}

#[async_trait]
impl InferenceProvider for LocalClassifierProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    fn location(&self) -> Option<String> {
        Some(self.descriptor.to_string())
    }

    async fn is_available(&self) -> bool {
        location::exists(&self.client, &self.descriptor, self.probe_timeout).await
    }

    async fn classify(&self, image: &ImagePayload, sensors: Option<&SensorSnapshot>) -> DiagnosisResult {
        match self.try_classify(image, sensors).await {
            Ok(result) => result,
            Err(e) => {
                error!("Local classification failed: {}", e);
                e.into_diagnosis()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{tiny_descriptor, tiny_weights};
    use agro_core::HealthStatus;
    use agro_vision::ImageTensor;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Classifier that always returns the same probabilities
    struct StubClassifier {
        probabilities: Vec<f32>,
    }

    impl Classifier for StubClassifier {
        fn input_size(&self) -> usize {
            224
        }

        fn num_classes(&self) -> usize {
            self.probabilities.len()
        }

        fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>> {
            assert_eq!(input.shape(), [1, 224, 224, 3]);
            Ok(self.probabilities.clone())
        }
    }

    /// Loader that counts calls and optionally fails
    struct CountingLoader {
        loads: AtomicUsize,
        classifier: Option<Arc<dyn Classifier>>,
        delay: Duration,
    }

    impl CountingLoader {
        fn serving(probabilities: Vec<f32>) -> Arc<Self> {
            Arc::new(Self {
                loads: AtomicUsize::new(0),
                classifier: Some(Arc::new(StubClassifier { probabilities })),
                delay: Duration::from_millis(50),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                loads: AtomicUsize::new(0),
                classifier: None,
                delay: Duration::ZERO,
            })
        }

        fn count(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelLoader for CountingLoader {
        async fn load(&self, descriptor: &ModelLocation) -> Result<Arc<dyn Classifier>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.classifier
                .clone()
                .ok_or_else(|| Error::ModelUnavailable(format!("404 for {descriptor}")))
        }
    }

    fn one_hot(index: usize, len: usize, p: f32) -> Vec<f32> {
        let rest = (1.0 - p) / (len - 1) as f32;
        let mut probabilities = vec![rest; len];
        probabilities[index] = p;
        probabilities
    }

    fn leaf_png() -> ImagePayload {
        let img = RgbImage::from_pixel(64, 48, Rgb([60, 140, 50]));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        ImagePayload::from_bytes(buffer.into_inner())
    }

    fn provider(loader: Arc<CountingLoader>) -> LocalClassifierProvider {
        LocalClassifierProvider::new(ModelLocation::Path("/srv/model/model.json".into()), loader)
    }

    #[tokio::test]
    async fn test_classify_late_blight() {
        let loader = CountingLoader::serving(one_hot(30, 38, 0.9));
        let provider = provider(loader.clone());

        let result = provider.classify(&leaf_png(), None).await;
        let expected = knowledge::decode(30);

        assert_eq!(result.status, HealthStatus::Diseased);
        assert_eq!(result.disease_name, expected.name);
        assert_eq!(result.description, expected.description);
        assert_eq!(result.recommendations, expected.recommendations);
        assert_eq!(result.confidence, 90);
        assert!(provider.is_loaded());
    }

    #[tokio::test]
    async fn test_classify_fuses_sensors() {
        let provider = provider(CountingLoader::serving(one_hot(37, 38, 0.8)));
        let sensors = SensorSnapshot::new(24.0, 85.0, 40.0, 600.0);

        let result = provider.classify(&leaf_png(), Some(&sensors)).await;
        assert_eq!(result.status, HealthStatus::Healthy);
        assert_eq!(result.recommendations.len(), 2);
        assert!(result.recommendations[0].contains("fungal"));
        assert_eq!(result.recommendations[1], "Fertigation");
    }

    #[tokio::test]
    async fn test_model_loaded_once() {
        let loader = CountingLoader::serving(one_hot(3, 38, 0.7));
        let provider = provider(loader.clone());

        let (a, b) = tokio::join!(provider.load(), provider.load());
        assert!(a.is_some() && b.is_some());
        assert_eq!(loader.count(), 1);

        let image = leaf_png();
        provider.classify(&image, None).await;
        provider.classify(&image, None).await;
        assert_eq!(loader.count(), 1);
    }

    #[tokio::test]
    async fn test_missing_model_is_reported_and_retried() {
        let loader = CountingLoader::failing();
        let provider = provider(loader.clone());

        assert!(provider.load().await.is_none());
        assert!(!provider.is_loaded());

        let result = provider.classify(&leaf_png(), None).await;
        assert_eq!(result.status, HealthStatus::Uncertain);
        assert_eq!(result.disease_name, "Model Unavailable");
        assert_eq!(result.confidence, 0);
        assert_eq!(loader.count(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_image_is_image_error() {
        let loader = CountingLoader::serving(one_hot(0, 38, 0.9));
        let provider = provider(loader.clone());

        let result = provider
            .classify(&ImagePayload::from_bytes(b"definitely not a jpeg".to_vec()), None)
            .await;
        assert_eq!(result.status, HealthStatus::Uncertain);
        assert_eq!(result.disease_name, "Image Error");
        assert_eq!(loader.count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_class_index() {
        let provider = provider(CountingLoader::serving(one_hot(39, 40, 0.6)));

        let result = provider.classify(&leaf_png(), None).await;
        assert_eq!(result.status, HealthStatus::Uncertain);
        assert_eq!(result.disease_name, "Unknown class (39)");
        assert_eq!(result.confidence, 60);
        assert!(result.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_is_available_checks_descriptor_file() {
        let dir = TempDir::new().unwrap();
        let resolver = crate::location::DirectoryResolver::new(dir.path());
        let provider =
            LocalClassifierProvider::with_resolver(&resolver, "model/model.json", CountingLoader::failing()).unwrap();

        assert!(!provider.is_available().await);

        std::fs::create_dir_all(dir.path().join("model")).unwrap();
        std::fs::write(dir.path().join("model/model.json"), b"{}").unwrap();
        assert!(provider.is_available().await);
    }

    #[tokio::test]
    async fn test_end_to_end_with_burn_model() {
        let dir = TempDir::new().unwrap();
        let descriptor = tiny_descriptor(vec!["weights.mpk".to_string()]);
        std::fs::write(dir.path().join("weights.mpk"), tiny_weights(&descriptor)).unwrap();
        std::fs::write(dir.path().join("model.json"), serde_json::to_vec(&descriptor).unwrap()).unwrap();

        let loader = Arc::new(BurnModelLoader::new(Duration::from_secs(5)).unwrap());
        let provider = LocalClassifierProvider::new(ModelLocation::Path(dir.path().join("model.json")), loader);

        assert!(provider.is_available().await);

        let result = provider.classify(&leaf_png(), None).await;
        assert_ne!(result.disease_name, "Model Unavailable");
        assert_ne!(result.disease_name, "Model Error");
        assert!(result.confidence <= 100);
        // Five output classes map onto the first five knowledge base entries
        assert!((0..5).any(|i| knowledge::decode(i).name == result.disease_name));
    }

    #[tokio::test]
    async fn test_from_config_follows_descriptor_input_size() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("model")).unwrap();
        let descriptor = tiny_descriptor(vec!["weights.mpk".to_string()]);
        assert_ne!(descriptor.input_size, 224);
        std::fs::write(dir.path().join("model/weights.mpk"), tiny_weights(&descriptor)).unwrap();
        std::fs::write(dir.path().join("model/model.json"), serde_json::to_vec(&descriptor).unwrap()).unwrap();

        let mut config = AppConfig::default();
        config.local.base_url = dir.path().display().to_string();
        let provider = LocalClassifierProvider::from_config(&config).unwrap();

        let result = provider.classify(&leaf_png(), None).await;
        assert_ne!(result.disease_name, "Model Error");
        assert_ne!(result.disease_name, "Model Unavailable");
        assert!((0..5).any(|i| knowledge::decode(i).name == result.disease_name));

        let model = provider.load().await.unwrap();
        assert_eq!(model.input_size(), 16);
        assert_eq!(provider.preprocessor_for(model.as_ref()).unwrap().image_size(), 16);
    }

    #[tokio::test]
    async fn test_configured_size_kept_when_model_agrees() {
        let provider = provider(CountingLoader::serving(one_hot(0, 38, 0.9)))
            .with_preprocessor(ImagePreprocessor::with_size(224));
        let model = provider.load().await.unwrap();
        assert_eq!(provider.preprocessor_for(model.as_ref()).unwrap().image_size(), 224);
    }
}
