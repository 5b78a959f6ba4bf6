//! Inference for AgroVision leaf diagnosis.
//!
//! Two interchangeable providers sit behind [`InferenceProvider`]:
//!
//! - [`LocalClassifierProvider`]: a Burn CNN loaded lazily from a deployed
//!   `model.json` plus weight shards, run on the CPU.
//! - [`RemoteDiagnosisProvider`]: a hosted multimodal model answering with a
//!   structured JSON diagnosis.
//!
//! Both always return a [`DiagnosisResult`](agro_core::DiagnosisResult);
//! failures come back as degraded `Uncertain` results.

pub mod backend;
pub mod decoder;
pub mod loader;
pub mod local;
pub mod location;
pub mod model;
pub mod pipeline;
pub mod probe;
pub mod provider;
pub mod remote;

pub use decoder::{arg_max, Decoder, Prediction};
pub use loader::{BurnModelLoader, ModelLoader};
pub use local::LocalClassifierProvider;
pub use location::{BaseUrlResolver, DirectoryResolver, ModelLocation, PathResolver};
pub use model::{Classifier, LeafClassifier, LeafClassifierConfig, ModelDescriptor};
pub use pipeline::DiagnosisPipeline;
pub use probe::{AvailabilityProber, ProbeReport};
pub use provider::{build_provider, InferenceProvider};
pub use remote::{RawDiagnosis, RemoteDiagnosisProvider};
