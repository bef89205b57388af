use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{AnomalyVerdict, ClassLabel};

/// Body of `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub message: String,
    pub status: String,
}

/// Body of `POST /predict`, and the per-image part of a batch item.
///
/// The service sends one of three shapes: `{anomaly, reason}`,
/// `{class_name, confidence}` or `{error}`. They are kept in one flat
/// struct so a batch item can flatten it next to `image_index`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub anomaly: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub image_index: usize,
    #[serde(flatten)]
    pub body: PredictResponse,
}

/// Body of `POST /predict-multiple`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchPredictResponse {
    pub results: Vec<BatchItem>,
}

/// A well-formed prediction body, interpreted.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictOutcome {
    Anomaly(AnomalyVerdict),
    Classification { label: ClassLabel, confidence: f64 },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WireError {
    #[error("service reported an error: {0}")]
    Remote(String),
    #[error("unknown class name: {0}")]
    UnknownLabel(String),
    #[error("confidence {0} is outside 0..=100")]
    InvalidConfidence(f64),
    #[error("response has neither an anomaly verdict nor a classification")]
    Incomplete,
}

impl PredictResponse {
    pub fn anomaly(reason: impl Into<String>) -> Self {
        Self {
            anomaly: true,
            reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn classification(label: ClassLabel, confidence: f64) -> Self {
        Self {
            class_name: Some(label.to_string()),
            confidence: Some(confidence),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn interpret(&self) -> Result<PredictOutcome, WireError> {
        if let Some(error) = &self.error {
            return Err(WireError::Remote(error.clone()));
        }
        if self.anomaly {
            let reason = self
                .reason
                .clone()
                .unwrap_or_else(|| "Anomaly detected".to_string());
            return Ok(PredictOutcome::Anomaly(AnomalyVerdict::invalid(reason)));
        }
        match (&self.class_name, self.confidence) {
            (Some(name), Some(confidence)) => {
                let label = ClassLabel::from_str(name)
                    .map_err(|_| WireError::UnknownLabel(name.clone()))?;
                if !confidence.is_finite() || !(0.0..=100.0).contains(&confidence) {
                    return Err(WireError::InvalidConfidence(confidence));
                }
                Ok(PredictOutcome::Classification { label, confidence })
            }
            _ => Err(WireError::Incomplete),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_classification_body() {
        let body: PredictResponse = serde_json::from_str(
            r#"{"class_name":"Cassava Mosaic Disease (CMD)","confidence":87.25}"#,
        )
        .unwrap();
        assert_eq!(
            body.interpret().unwrap(),
            PredictOutcome::Classification {
                label: ClassLabel::Mosaic,
                confidence: 87.25
            }
        );
    }

    #[test]
    fn parses_anomaly_body() {
        let body: PredictResponse =
            serde_json::from_str(r#"{"anomaly":true,"reason":"Insufficient vegetation detected"}"#)
                .unwrap();
        match body.interpret().unwrap() {
            PredictOutcome::Anomaly(verdict) => {
                assert!(!verdict.valid);
                assert_eq!(verdict.reason, "Insufficient vegetation detected");
            }
            other => panic!("expected anomaly, got {other:?}"),
        }
    }

    #[test]
    fn rejects_labels_outside_the_enumeration() {
        let body = PredictResponse {
            class_name: Some("Cassava Green Mottle (CGM)".into()),
            confidence: Some(90.0),
            ..Default::default()
        };
        assert!(matches!(body.interpret(), Err(WireError::UnknownLabel(_))));
    }

    #[test]
    fn rejects_out_of_range_confidence_and_missing_fields() {
        let body = PredictResponse {
            class_name: Some(ClassLabel::Healthy.to_string()),
            confidence: Some(250.0),
            ..Default::default()
        };
        assert_eq!(body.interpret(), Err(WireError::InvalidConfidence(250.0)));
        assert_eq!(PredictResponse::default().interpret(), Err(WireError::Incomplete));
    }

    #[test]
    fn batch_items_flatten_their_body() {
        let json = r#"{"results":[
            {"image_index":0,"class_name":"Healthy Cassava Leaf","confidence":91.0},
            {"image_index":1,"error":"cannot identify image file"}
        ]}"#;
        let batch: BatchPredictResponse = serde_json::from_str(json).unwrap();
        assert_eq!(batch.results.len(), 2);
        assert_eq!(batch.results[1].image_index, 1);
        assert!(matches!(batch.results[1].body.interpret(), Err(WireError::Remote(_))));

        let encoded = serde_json::to_value(&batch.results[0]).unwrap();
        assert_eq!(encoded["image_index"], 0);
        assert!(encoded.get("anomaly").is_none());
    }
}
