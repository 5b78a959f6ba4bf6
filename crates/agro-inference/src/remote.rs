//! Remote diagnosis through the Gemini `generateContent` REST API.
//!
//! One request per analysis. The model is asked for a JSON document that
//! matches [`response_schema`]; whatever comes back is parsed leniently into
//! [`RawDiagnosis`] and defaulted field by field.

use std::time::Duration;

use agro_core::types::percent_from_score;
use agro_core::{
    DiagnosisResult, Error, FusionEngine, HealthStatus, RemoteServiceConfig, Result, SensorSnapshot,
};
use agro_vision::ImagePayload;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::provider::InferenceProvider;

const API_KEY_HEADER: &str = "x-goog-api-key";

const INSTRUCTION: &str = "Analyse this image of an agricultural plant. \
Decide whether it is healthy ('Healthy') or diseased ('Diseased'). \
If you cannot identify a plant with certainty or the image is irrelevant, answer 'Uncertain'. \
Give the disease name (if any), an estimated confidence percentage from 0 to 100, \
a detailed description and practical recommendations.";

/// JSON schema the service is asked to answer with
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "status": {
                "type": "STRING",
                "enum": ["Healthy", "Diseased", "Uncertain"],
                "description": "Health status of the plant"
            },
            "diseaseName": {
                "type": "STRING",
                "description": "Name of the disease, or 'None' when healthy"
            },
            "confidence": {
                "type": "NUMBER",
                "description": "Confidence percentage from 0 to 100"
            },
            "description": {
                "type": "STRING",
                "description": "Short description of the findings"
            },
            "recommendations": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "List of actionable treatments or care tips"
            }
        },
        "required": ["status", "diseaseName", "confidence", "description", "recommendations"]
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content.parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Diagnosis as returned by the service; every field may be missing
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDiagnosis {
    pub status: Option<String>,
    pub disease_name: Option<String>,
    pub confidence: Option<f64>,
    pub description: Option<String>,
    pub recommendations: Option<Vec<String>>,
}

impl RawDiagnosis {
    /// Fill in defaults for whatever the service left out
    pub fn into_result(self) -> DiagnosisResult {
        let non_empty = |s: Option<String>| s.filter(|s| !s.trim().is_empty());

        let status = self
            .status
            .as_deref()
            .map(HealthStatus::from_label)
            .unwrap_or(HealthStatus::Uncertain);

        DiagnosisResult::new(
            status,
            non_empty(self.disease_name).unwrap_or_else(|| "Unknown".to_string()),
            self.confidence.map(percent_from_score).unwrap_or(0),
            non_empty(self.description).unwrap_or_else(|| "No description available".to_string()),
            self.recommendations.unwrap_or_default(),
        )
    }
}

/// Sends the photo to a hosted multimodal model
pub struct RemoteDiagnosisProvider {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    fusion: FusionEngine,
}

impl RemoteDiagnosisProvider {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            fusion: FusionEngine::default(),
        })
    }

    pub fn from_config(config: &RemoteServiceConfig) -> Result<Self> {
        Self::new(&config.endpoint, &config.model, config.api_key.clone(), config.timeout())
    }

    pub fn with_fusion(mut self, fusion: FusionEngine) -> Self {
        self.fusion = fusion;
        self
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn build_request(image: &ImagePayload, sensors: Option<&SensorSnapshot>) -> GenerateContentRequest {
        let mut instruction = INSTRUCTION.to_string();
        if let Some(sensors) = sensors {
            instruction.push(' ');
            instruction.push_str(&sensors.describe());
        }

        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part {
                        inline_data: Some(InlineData {
                            mime_type: image.mime_type().to_string(),
                            data: image.to_base64(),
                        }),
                        text: None,
                    },
                    Part {
                        inline_data: None,
                        text: Some(instruction),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
            },
        }
    }

    /// Full round trip with errors surfaced
    pub async fn try_classify(
        &self,
        image: &ImagePayload,
        sensors: Option<&SensorSnapshot>,
    ) -> Result<DiagnosisResult> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Service("no API key configured".to_string()))?;

        if image.is_empty() {
            return Err(Error::ImageDecode("empty image payload".to_string()));
        }
        if !image.has_image_mime() {
            return Err(Error::ImageDecode(format!(
                "unsupported MIME type {:?}",
                image.mime_type()
            )));
        }

        let request = Self::build_request(image, sensors);
        debug!("POST {} ({} image bytes)", self.url(), image.len());

        let response = self
            .client
            .post(self.url())
            .header(API_KEY_HEADER, api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Service(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(Error::Service(format!("HTTP {status}: {snippet}")));
        }

        let envelope: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::Service(format!("invalid response body: {e}")))?;

        let text = envelope
            .text()
            .ok_or_else(|| Error::Service("empty response from service".to_string()))?;

        let raw: RawDiagnosis = serde_json::from_str(&text)?;
        let mut result = raw.into_result();
        result.recommendations = self.fusion.fuse(&result.recommendations, sensors);

        Ok(result)
    }
}

#[async_trait]
impl InferenceProvider for RemoteDiagnosisProvider {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn location(&self) -> Option<String> {
        Some(format!("{}/models/{}", self.endpoint, self.model))
    }

    async fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn classify(&self, image: &ImagePayload, sensors: Option<&SensorSnapshot>) -> DiagnosisResult {
        match self.try_classify(image, sensors).await {
            Ok(result) => result,
            Err(e) => {
                error!("Remote analysis failed: {}", e);
                e.into_diagnosis()
            }
        }
    }
}
