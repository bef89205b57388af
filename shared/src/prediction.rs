use serde::{Deserialize, Serialize};

use crate::ClassLabel;

/// Which path produced a prediction. Fallback results are low-trust and
/// must be presented as such.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionSource {
    Remote,
    Fallback,
}

impl PredictionSource {
    pub fn is_remote(&self) -> bool {
        matches!(self, PredictionSource::Remote)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("confidence {0} is outside 0..=100")]
pub struct InvalidPrediction(pub f64);

/// A classification with its confidence as a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPrediction")]
pub struct PredictionResult {
    label: ClassLabel,
    confidence: f64,
    source: PredictionSource,
}

#[derive(Deserialize)]
struct RawPrediction {
    label: ClassLabel,
    confidence: f64,
    source: PredictionSource,
}

impl TryFrom<RawPrediction> for PredictionResult {
    type Error = InvalidPrediction;

    fn try_from(raw: RawPrediction) -> Result<Self, Self::Error> {
        PredictionResult::new(raw.label, raw.confidence, raw.source)
    }
}

impl PredictionResult {
    pub fn new(
        label: ClassLabel,
        confidence: f64,
        source: PredictionSource,
    ) -> Result<Self, InvalidPrediction> {
        if !confidence.is_finite() || !(0.0..=100.0).contains(&confidence) {
            return Err(InvalidPrediction(confidence));
        }
        Ok(Self {
            label,
            confidence,
            source,
        })
    }

    /// Builds a result that is valid by construction: out-of-range values are
    /// clamped and NaN becomes 0.
    pub fn clamped(label: ClassLabel, confidence: f64, source: PredictionSource) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 100.0)
        };
        Self {
            label,
            confidence,
            source,
        }
    }

    pub fn label(&self) -> ClassLabel {
        self.label
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn source(&self) -> PredictionSource {
        self.source
    }

    pub fn passes_gate(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyVerdict {
    pub valid: bool,
    pub reason: String,
}

impl AnomalyVerdict {
    pub fn valid(reason: impl Into<String>) -> Self {
        Self {
            valid: true,
            reason: reason.into(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: reason.into(),
        }
    }
}
