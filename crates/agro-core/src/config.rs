//! Configuration structures for the diagnosis pipeline.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::load_toml_config;
use crate::fusion::FusionThresholds;
use crate::{Error, Result};

/// Which inference provider handles `classify`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// On-device CNN classifier
    #[default]
    Local,
    /// Remote generative diagnosis service
    Remote,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Local => write!(f, "local"),
            ProviderKind::Remote => write!(f, "remote"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(ProviderKind::Local),
            "remote" | "cloud" | "gemini" => Ok(ProviderKind::Remote),
            other => Err(Error::Config(format!("Unknown provider: {other}"))),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Selected inference provider
    pub provider: ProviderKind,
    /// Local classifier settings
    pub local: LocalModelConfig,
    /// Remote service settings
    pub remote: RemoteServiceConfig,
    /// Sensor fusion thresholds
    pub fusion: FusionThresholds,
    /// Image preprocessing settings
    pub preprocess: PreprocessSettings,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = load_toml_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(provider) = std::env::var("AGROVISION_PROVIDER") {
            self.provider = provider.parse()?;
        }
        if let Ok(base) = std::env::var("AGROVISION_MODEL_BASE") {
            self.local.base_url = base;
        }
        if let Ok(model) = std::env::var("AGROVISION_REMOTE_MODEL") {
            self.remote.model = model;
        }
        if self.remote.api_key.is_none() {
            self.remote.api_key = std::env::var("GEMINI_API_KEY")
                .or_else(|_| std::env::var("API_KEY"))
                .ok()
                .filter(|key| !key.trim().is_empty());
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.preprocess.image_size == 0 {
            return Err(Error::Config("preprocess.image_size must be > 0".to_string()));
        }
        self.local.validate()?;
        self.remote.validate()?;
        self.fusion.validate().map_err(Error::Config)?;
        Ok(())
    }
}

/// Local classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalModelConfig {
    /// Deployment root: an http(s) URL or a directory
    pub base_url: String,
    /// Descriptor path relative to the deployment root
    pub descriptor_path: String,
    /// Timeout for the availability probe (seconds)
    pub probe_timeout_secs: u64,
    /// Timeout for fetching the descriptor and weights (seconds)
    pub load_timeout_secs: u64,
    /// Timeout for a single forward pass (seconds)
    pub inference_timeout_secs: u64,
}

impl Default for LocalModelConfig {
    fn default() -> Self {
        Self {
            base_url: "./public".to_string(),
            descriptor_path: "model/model.json".to_string(),
            probe_timeout_secs: 5,
            load_timeout_secs: 60,
            inference_timeout_secs: 30,
        }
    }
}

impl LocalModelConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.descriptor_path.trim().is_empty() {
            return Err(Error::Config("local.descriptor_path must not be empty".to_string()));
        }
        if self.probe_timeout_secs == 0 || self.load_timeout_secs == 0 || self.inference_timeout_secs == 0 {
            return Err(Error::Config("local timeouts must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Remote diagnosis service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteServiceConfig {
    /// API root, without the model path
    pub endpoint: String,
    /// Model identifier
    pub model: String,
    /// API key; usually supplied via `GEMINI_API_KEY`
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Request timeout (seconds)
    pub timeout_secs: u64,
}

impl Default for RemoteServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

impl RemoteServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(Error::Config("remote.timeout_secs must be > 0".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(Error::Config("remote.model must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Image preprocessing settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PreprocessSettings {
    /// Square edge length fed to the classifier
    pub image_size: u32,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self { image_size: 224 }
    }
}
