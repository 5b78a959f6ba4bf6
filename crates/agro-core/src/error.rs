//! Error types for the leaf diagnosis pipeline.
//!
//! None of these cross the provider boundary: every variant can be turned
//! into a degraded [`DiagnosisResult`] with [`Error::into_diagnosis`].

use thiserror::Error;

use crate::types::{DiagnosisResult, HealthStatus};

/// Main error type for the diagnosis pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// The payload could not be decoded as an image
    #[error("Image decode error: {0}")]
    ImageDecode(String),

    /// The classifier could not be probed or loaded
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// The model failed while running a prediction
    #[error("Inference error: {0}")]
    Inference(String),

    /// The remote diagnosis service failed or answered with garbage
    #[error("Service error: {0}")]
    Service(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::ImageDecode(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Service(format!("malformed JSON: {err}"))
    }
}

impl Error {
    /// Short tag used as the disease name of a degraded diagnosis
    pub fn tag(&self) -> &'static str {
        match self {
            Error::ImageDecode(_) => "Image Error",
            Error::ModelUnavailable(_) => "Model Unavailable",
            Error::Inference(_) => "Model Error",
            Error::Service(_) => "Analysis Error",
            Error::Config(_) | Error::Io(_) => "Critical Error",
        }
    }

    /// Convert the error into an `Uncertain` diagnosis with zero confidence.
    pub fn into_diagnosis(self) -> DiagnosisResult {
        let (description, recommendations): (String, &[&str]) = match &self {
            Error::ImageDecode(cause) => (
                format!("The image could not be processed ({cause})."),
                &[
                    "Retake the photo with the leaf centred and in focus",
                    "Use a JPEG or PNG image",
                ],
            ),
            Error::ModelUnavailable(cause) => (
                format!("The local classifier is not available ({cause})."),
                &[
                    "Check your connection",
                    "Verify that model.json and its weight files are deployed",
                    "Retry the analysis",
                ],
            ),
            Error::Inference(cause) => (
                format!("Local inference failed ({cause})."),
                &["Retry the analysis"],
            ),
            Error::Service(cause) => (
                format!("The AI service could not analyse the image ({cause})."),
                &["Try the analysis again", "Check your internet connection"],
            ),
            Error::Config(cause) => (
                format!("An unexpected error occurred ({cause})."),
                &["Retry the analysis"],
            ),
            Error::Io(cause) => (
                format!("An unexpected error occurred ({cause})."),
                &["Retry the analysis"],
            ),
        };

        DiagnosisResult::new(
            HealthStatus::Uncertain,
            self.tag(),
            0,
            description,
            recommendations.iter().map(|r| r.to_string()).collect(),
        )
    }
}

/// Specialized Result type for diagnosis operations.
pub type Result<T> = std::result::Result<T, Error>;
