//! Top-1 decoding of classifier output.

use agro_core::knowledge::{self, ClassRecord};
use agro_core::types::confidence_percent;
use agro_core::{Error, Result};
use serde::Serialize;

/// Decoded top-1 prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub record: ClassRecord,
    /// Raw probability of the winning class
    pub probability: f32,
    /// Probability as an integer percentage
    pub confidence: u8,
}

impl Prediction {
    /// Whether the winning index has a knowledge base entry
    pub fn is_known(&self) -> bool {
        knowledge::lookup(self.record.index).is_some()
    }
}

/// Index and value of the largest entry.
///
/// Ties go to the lowest index. `NaN` entries are skipped; `None` when
/// nothing comparable is left.
pub fn arg_max(probabilities: &[f32]) -> Option<(usize, f32)> {
    probabilities
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, p)| !p.is_nan())
        .fold(None, |best, (index, p)| match best {
            Some((_, best_p)) if p <= best_p => best,
            _ => Some((index, p)),
        })
}

/// Maps a probability vector onto the knowledge base
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder;

impl Decoder {
    pub fn decode(&self, probabilities: &[f32]) -> Result<Prediction> {
        let (index, probability) = arg_max(probabilities).ok_or_else(|| {
            Error::Inference(format!(
                "classifier returned no usable probabilities ({} values)",
                probabilities.len()
            ))
        })?;

        Ok(Prediction {
            record: knowledge::decode(index),
            probability,
            confidence: confidence_percent(probability),
        })
    }
}
