//! Sensor fusion.
//!
//! Combines the vision diagnosis with environmental readings by adding
//! alert strings to the recommendation list. Rules are independent and every
//! matching rule fires. The resulting order is always:
//!
//! ```text
//! [DrySoil, FungalRisk, ..original recommendations.., HeatStress]
//! ```

use serde::{Deserialize, Serialize};

use crate::types::SensorSnapshot;

/// Threshold values for the fusion rules. All comparisons are strict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FusionThresholds {
    /// Humidity (%) above which fungal spread is likely
    pub humidity_max: f32,
    /// Soil moisture (%) below which irrigation is urgent
    pub soil_moisture_min: f32,
    /// Temperature (°C) above which thermal stress is likely
    pub temperature_max: f32,
}

impl Default for FusionThresholds {
    fn default() -> Self {
        Self {
            humidity_max: 80.0,
            soil_moisture_min: 25.0,
            temperature_max: 32.0,
        }
    }
}

impl FusionThresholds {
    /// Check that every threshold is a finite number
    pub fn validate(&self) -> Result<(), String> {
        let values = [self.humidity_max, self.soil_moisture_min, self.temperature_max];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(format!("Fusion thresholds must be finite, got {:?}", self));
        }
        Ok(())
    }
}

/// Where an alert is inserted into the recommendation list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Prepend,
    Append,
}

/// An alert raised by a sensor rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorAlert {
    /// Soil moisture below the irrigation threshold
    DrySoil,
    /// Humidity above the fungal-risk threshold
    FungalRisk,
    /// Temperature above the thermal-stress threshold
    HeatStress,
}

impl SensorAlert {
    pub fn placement(&self) -> Placement {
        match self {
            SensorAlert::DrySoil | SensorAlert::FungalRisk => Placement::Prepend,
            SensorAlert::HeatStress => Placement::Append,
        }
    }

    /// Human-readable alert text for the given thresholds
    pub fn message(&self, thresholds: &FusionThresholds) -> String {
        match self {
            SensorAlert::DrySoil => format!(
                "⚠️ SENSOR ALERT: Soil moisture below {:.0}%. Urgent irrigation required.",
                thresholds.soil_moisture_min
            ),
            SensorAlert::FungalRisk => format!(
                "⚠️ SENSOR ALERT: Humidity above {:.0}% detected. High risk of fungal spread.",
                thresholds.humidity_max
            ),
            SensorAlert::HeatStress => format!(
                "⚠️ SENSOR ALERT: Critical temperature (>{:.0}°C). Possible heat stress.",
                thresholds.temperature_max
            ),
        }
    }
}

/// Rule-based fusion of sensor readings into recommendations
#[derive(Debug, Clone, Copy, Default)]
pub struct FusionEngine {
    thresholds: FusionThresholds,
}

impl FusionEngine {
    pub fn new(thresholds: FusionThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &FusionThresholds {
        &self.thresholds
    }

    /// Alerts raised by a snapshot, in output order
    pub fn alerts(&self, sensors: &SensorSnapshot) -> Vec<SensorAlert> {
        let mut alerts = Vec::new();

        if sensors.soil_moisture < self.thresholds.soil_moisture_min {
            alerts.push(SensorAlert::DrySoil);
        }
        if sensors.humidity > self.thresholds.humidity_max {
            alerts.push(SensorAlert::FungalRisk);
        }
        if sensors.temperature > self.thresholds.temperature_max {
            alerts.push(SensorAlert::HeatStress);
        }

        alerts
    }

    /// Return a new recommendation list enriched with sensor alerts.
    ///
    /// Without a snapshot the input is returned unchanged.
    pub fn fuse(&self, recommendations: &[String], sensors: Option<&SensorSnapshot>) -> Vec<String> {
        let Some(sensors) = sensors else {
            return recommendations.to_vec();
        };

        let alerts = self.alerts(sensors);
        let mut fused = Vec::with_capacity(recommendations.len() + alerts.len());

        fused.extend(
            alerts
                .iter()
                .filter(|a| a.placement() == Placement::Prepend)
                .map(|a| a.message(&self.thresholds)),
        );
        fused.extend_from_slice(recommendations);
        fused.extend(
            alerts
                .iter()
                .filter(|a| a.placement() == Placement::Append)
                .map(|a| a.message(&self.thresholds)),
        );

        if !alerts.is_empty() {
            tracing::debug!("Sensor fusion raised {} alert(s): {:?}", alerts.len(), alerts);
        }

        fused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recs() -> Vec<String> {
        vec!["Prune lower leaves".to_string(), "Mulching".to_string()]
    }

    fn calm() -> SensorSnapshot {
        SensorSnapshot::new(24.0, 60.0, 45.0, 700.0)
    }

    #[test]
    fn test_no_snapshot_is_identity() {
        let engine = FusionEngine::default();
        assert_eq!(engine.fuse(&recs(), None), recs());
        assert!(engine.fuse(&[], None).is_empty());
    }

    #[test]
    fn test_calm_snapshot_adds_nothing() {
        let engine = FusionEngine::default();
        assert_eq!(engine.fuse(&recs(), Some(&calm())), recs());
    }

    #[test]
    fn test_high_humidity_prepends_one_warning() {
        let engine = FusionEngine::default();
        let sensors = SensorSnapshot { humidity: 85.0, ..calm() };
        let fused = engine.fuse(&recs(), Some(&sensors));

        assert_eq!(fused.len(), 3);
        assert!(fused[0].contains("fungal"));
        assert_eq!(&fused[1..], recs().as_slice());
    }

    #[test]
    fn test_dry_soil_prepends_one_warning() {
        let engine = FusionEngine::default();
        let sensors = SensorSnapshot { soil_moisture: 10.0, ..calm() };
        let fused = engine.fuse(&recs(), Some(&sensors));

        assert_eq!(fused.len(), 3);
        assert!(fused[0].contains("irrigation"));
        assert_eq!(&fused[1..], recs().as_slice());
    }

    #[test]
    fn test_both_prepends_are_ordered() {
        let engine = FusionEngine::default();
        let sensors = SensorSnapshot { humidity: 85.0, soil_moisture: 10.0, ..calm() };
        let fused = engine.fuse(&recs(), Some(&sensors));

        assert_eq!(fused.len(), 4);
        assert!(fused[0].contains("irrigation"));
        assert!(fused[1].contains("fungal"));
        assert_eq!(&fused[2..], recs().as_slice());
    }

    #[test]
    fn test_heat_appends_one_warning() {
        let engine = FusionEngine::default();
        let sensors = SensorSnapshot { temperature: 35.0, ..calm() };
        let fused = engine.fuse(&recs(), Some(&sensors));

        assert_eq!(fused.len(), 3);
        assert_eq!(&fused[..2], recs().as_slice());
        assert!(fused[2].contains("heat stress"));
    }

    #[test]
    fn test_all_rules_fire() {
        let engine = FusionEngine::default();
        let sensors = SensorSnapshot::new(40.0, 95.0, 5.0, 100.0);
        assert_eq!(
            engine.alerts(&sensors),
            vec![SensorAlert::DrySoil, SensorAlert::FungalRisk, SensorAlert::HeatStress]
        );
        assert_eq!(engine.fuse(&recs(), Some(&sensors)).len(), 5);
    }

    #[test]
    fn test_thresholds_are_strict() {
        let engine = FusionEngine::default();
        let sensors = SensorSnapshot::new(32.0, 80.0, 25.0, 500.0);
        assert!(engine.alerts(&sensors).is_empty());
    }

    #[test]
    fn test_input_is_not_mutated() {
        let engine = FusionEngine::default();
        let original = recs();
        let sensors = SensorSnapshot::new(40.0, 95.0, 5.0, 100.0);
        let _ = engine.fuse(&original, Some(&sensors));
        assert_eq!(original, recs());
    }

    #[test]
    fn test_custom_thresholds() {
        let engine = FusionEngine::new(FusionThresholds {
            humidity_max: 80.0,
            soil_moisture_min: 20.0,
            temperature_max: 30.0,
        });
        let sensors = SensorSnapshot::new(31.0, 60.0, 22.0, 500.0);
        assert_eq!(engine.alerts(&sensors), vec![SensorAlert::HeatStress]);
        assert!(engine.fuse(&[], Some(&sensors))[0].contains(">30°C"));
    }

    #[test]
    fn test_threshold_validation() {
        assert!(FusionThresholds::default().validate().is_ok());
        let bad = FusionThresholds { humidity_max: f32::NAN, ..Default::default() };
        assert!(bad.validate().is_err());
    }
}
