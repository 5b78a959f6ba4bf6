//! Fetching a deployed model and turning it into a [`Classifier`].

use std::sync::Arc;
use std::time::Duration;

use agro_core::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::backend::{default_device, InferenceBackend};
use crate::location::{fetch_bytes, ModelLocation};
use crate::model::{BurnClassifier, Classifier, ModelDescriptor};

/// Loads a classifier from its descriptor location
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, descriptor: &ModelLocation) -> Result<Arc<dyn Classifier>>;
}

/// Loads `model.json` plus its weight shards into a Burn classifier
#[derive(Debug, Clone)]
pub struct BurnModelLoader {
    client: Client,
}

impl BurnModelLoader {
    /// Create a loader whose downloads are bounded by `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Fetch and validate the descriptor
    pub async fn fetch_descriptor(&self, location: &ModelLocation) -> Result<ModelDescriptor> {
        let bytes = fetch_bytes(&self.client, location).await?;
        let descriptor: ModelDescriptor = serde_json::from_slice(&bytes)
            .map_err(|e| Error::ModelUnavailable(format!("invalid model descriptor {location}: {e}")))?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Fetch every shard listed in the descriptor, concatenated in order
    pub async fn fetch_weights(&self, location: &ModelLocation, descriptor: &ModelDescriptor) -> Result<Vec<u8>> {
        let mut weights = Vec::new();
        for shard in &descriptor.weights {
            let shard_location = location.sibling(shard)?;
            let bytes = fetch_bytes(&self.client, &shard_location).await?;
            debug!("Fetched {} ({} bytes)", shard_location, bytes.len());
            weights.extend_from_slice(&bytes);
        }
        Ok(weights)
    }
}

#[async_trait]
impl ModelLoader for BurnModelLoader {
    async fn load(&self, location: &ModelLocation) -> Result<Arc<dyn Classifier>> {
        let descriptor = self.fetch_descriptor(location).await?;
        let weights = self.fetch_weights(location, &descriptor).await?;
        let weight_bytes = weights.len();

        let classifier = {
            let descriptor = descriptor.clone();
            tokio::task::spawn_blocking(move || {
                BurnClassifier::<InferenceBackend>::from_bytes(&descriptor, weights, &default_device())
            })
            .await
            .map_err(|e| Error::ModelUnavailable(format!("model build task failed: {e}")))??
        };

        info!(
            "Loaded leaf classifier from {} ({} classes, {}x{} input, {} weight bytes)",
            location, descriptor.num_classes, descriptor.input_size, descriptor.input_size, weight_bytes
        );

        Ok(Arc::new(classifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{tiny_descriptor, tiny_weights};
    use agro_vision::ImageTensor;
    use std::path::Path;
    use tempfile::TempDir;

    /// Write a descriptor with its weights split across two shards
    fn deploy(dir: &Path) -> ModelLocation {
        let descriptor = tiny_descriptor(vec!["shard1.bin".to_string(), "shard2.bin".to_string()]);
        let weights = tiny_weights(&descriptor);
        let (first, second) = weights.split_at(weights.len() / 2);

        std::fs::write(dir.join("shard1.bin"), first).unwrap();
        std::fs::write(dir.join("shard2.bin"), second).unwrap();
        std::fs::write(dir.join("model.json"), serde_json::to_vec(&descriptor).unwrap()).unwrap();

        ModelLocation::Path(dir.join("model.json"))
    }

    fn loader() -> BurnModelLoader {
        BurnModelLoader::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_load_sharded_model() {
        let dir = TempDir::new().unwrap();
        let location = deploy(dir.path());

        let classifier = loader().load(&location).await.unwrap();
        assert_eq!(classifier.num_classes(), 5);
        assert_eq!(classifier.input_size(), 16);

        let input = ImageTensor::new(vec![0.25; 16 * 16 * 3], [1, 16, 16, 3]).unwrap();
        let probabilities = classifier.predict(&input).unwrap();
        assert_eq!(probabilities.len(), 5);
    }

    #[tokio::test]
    async fn test_missing_descriptor() {
        let dir = TempDir::new().unwrap();
        let location = ModelLocation::Path(dir.path().join("model.json"));

        let result = loader().load(&location).await;
        assert!(matches!(result, Err(Error::ModelUnavailable(_))));
    }

    #[tokio::test]
    async fn test_missing_shard() {
        let dir = TempDir::new().unwrap();
        let location = deploy(dir.path());
        std::fs::remove_file(dir.path().join("shard2.bin")).unwrap();

        let result = loader().load(&location).await;
        assert!(matches!(result, Err(Error::ModelUnavailable(_))));
    }

    #[tokio::test]
    async fn test_invalid_descriptor() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");

        std::fs::write(&path, b"{\"modelTopology\": {}}").unwrap();
        let result = loader().load(&ModelLocation::Path(path.clone())).await;
        assert!(matches!(result, Err(Error::ModelUnavailable(_))));

        std::fs::write(&path, br#"{"format": "tfjs-layers", "weights": ["w.bin"]}"#).unwrap();
        let result = loader().fetch_descriptor(&ModelLocation::Path(path)).await;
        assert!(matches!(result, Err(Error::ModelUnavailable(_))));
    }
}
