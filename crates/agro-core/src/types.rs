//! Core type definitions shared by every inference provider.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Health status of the analysed plant
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum HealthStatus {
    /// No pathogen detected
    Healthy,
    /// A disease was identified
    Diseased,
    /// No trustworthy diagnosis could be made
    Uncertain,
}

impl HealthStatus {
    /// Parse a status label in any casing; anything unrecognised is `Uncertain`
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "healthy" => HealthStatus::Healthy,
            "diseased" => HealthStatus::Diseased,
            _ => HealthStatus::Uncertain,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "Healthy"),
            HealthStatus::Diseased => write!(f, "Diseased"),
            HealthStatus::Uncertain => write!(f, "Uncertain"),
        }
    }
}

/// Environmental readings captured alongside the photo
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SensorSnapshot {
    /// Air temperature in °C
    pub temperature: f32,
    /// Relative humidity in percent (0-100)
    pub humidity: f32,
    /// Soil moisture in percent (0-100)
    pub soil_moisture: f32,
    /// Light level in lux
    pub light_level: f32,
}

impl SensorSnapshot {
    /// Creates a new sensor snapshot
    pub fn new(temperature: f32, humidity: f32, soil_moisture: f32, light_level: f32) -> Self {
        Self {
            temperature,
            humidity,
            soil_moisture,
            light_level,
        }
    }

    /// Render the readings as context for a natural-language prompt
    pub fn describe(&self) -> String {
        format!(
            "Field sensor readings at capture time: temperature {:.1} °C, \
             relative humidity {:.0}%, soil moisture {:.0}%, light level {:.0} lux.",
            self.temperature, self.humidity, self.soil_moisture, self.light_level
        )
    }
}

/// Final diagnosis handed back to the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResult {
    pub status: HealthStatus,
    pub disease_name: String,
    /// Integer percentage in 0..=100
    pub confidence: u8,
    pub description: String,
    pub recommendations: Vec<String>,
    /// ISO-8601 UTC timestamp of when the diagnosis was produced
    pub timestamp: String,
}

impl DiagnosisResult {
    /// Create a diagnosis stamped with the current time.
    ///
    /// Confidence values above 100 are clamped.
    pub fn new(
        status: HealthStatus,
        disease_name: impl Into<String>,
        confidence: u8,
        description: impl Into<String>,
        recommendations: Vec<String>,
    ) -> Self {
        Self {
            status,
            disease_name: disease_name.into(),
            confidence: confidence.min(100),
            description: description.into(),
            recommendations,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Whether the result carries an actual diagnosis
    pub fn is_diagnostic(&self) -> bool {
        self.status != HealthStatus::Uncertain
    }
}

impl std::fmt::Display for DiagnosisResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Status: {} ({}% confidence)", self.status, self.confidence)?;
        writeln!(f, "Diagnosis: {}", self.disease_name)?;
        writeln!(f, "{}", self.description)?;
        for rec in &self.recommendations {
            writeln!(f, "  - {}", rec)?;
        }
        Ok(())
    }
}

/// Convert a probability into an integer percentage in 0..=100.
///
/// Non-finite input maps to 0.
pub fn confidence_percent(probability: f32) -> u8 {
    percent_from_score(probability as f64 * 100.0)
}

/// Round and clamp an already-scaled 0-100 score.
pub fn percent_from_score(score: f64) -> u8 {
    if !score.is_finite() {
        return 0;
    }
    score.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_label() {
        assert_eq!(HealthStatus::from_label("Healthy"), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_label(" DISEASED "), HealthStatus::Diseased);
        assert_eq!(HealthStatus::from_label("uncertain"), HealthStatus::Uncertain);
        assert_eq!(HealthStatus::from_label("wilting"), HealthStatus::Uncertain);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(HealthStatus::Healthy.to_string(), "Healthy");
        assert_eq!(HealthStatus::Uncertain.to_string(), "Uncertain");
    }

    #[test]
    fn test_sensor_snapshot_camel_case() {
        let snapshot = SensorSnapshot::new(24.0, 60.0, 40.0, 750.0);
        let json = serde_json::to_value(snapshot).unwrap();
        assert_eq!(json["soilMoisture"], 40.0);
        assert_eq!(json["lightLevel"], 750.0);
    }

    #[test]
    fn test_sensor_describe() {
        let text = SensorSnapshot::new(24.5, 61.0, 40.0, 750.0).describe();
        assert!(text.contains("24.5 °C"));
        assert!(text.contains("humidity 61%"));
    }

    #[test]
    fn test_diagnosis_clamps_confidence() {
        let result = DiagnosisResult::new(HealthStatus::Healthy, "Tomato", 250, "ok", vec![]);
        assert_eq!(result.confidence, 100);
        assert!(result.is_diagnostic());
    }

    #[test]
    fn test_diagnosis_timestamp_is_iso8601() {
        let result = DiagnosisResult::new(HealthStatus::Uncertain, "x", 0, "y", vec![]);
        assert!(chrono::DateTime::parse_from_rfc3339(&result.timestamp).is_ok());
        assert!(result.timestamp.ends_with('Z'));
    }

    #[test]
    fn test_diagnosis_serializes_camel_case() {
        let result = DiagnosisResult::new(HealthStatus::Diseased, "Rust", 87, "d", vec![]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["diseaseName"], "Rust");
        assert_eq!(json["status"], "Diseased");
        assert_eq!(json["confidence"], 87);
    }

    #[test]
    fn test_confidence_percent() {
        assert_eq!(confidence_percent(0.0), 0);
        assert_eq!(confidence_percent(0.874), 87);
        assert_eq!(confidence_percent(0.875), 88);
        assert_eq!(confidence_percent(1.0), 100);
        assert_eq!(confidence_percent(1.7), 100);
        assert_eq!(confidence_percent(-0.2), 0);
        assert_eq!(confidence_percent(f32::NAN), 0);
    }
}
