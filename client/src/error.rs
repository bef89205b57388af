use std::time::Duration;

use shared::PredictionSource;

/// Failures of a call to the inference service. These never reach the user
/// on their own: the orchestrator recovers from them through the fallback.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RemoteError {
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),
    #[error("Request timed out after {0:?}")]
    TimeoutExceeded(Duration),
    #[error("Server error: HTTP {0}")]
    ServerError(u16),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Service could not process the image: {0}")]
    ImageFailed(String),
}

impl RemoteError {
    /// Worth another attempt after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RemoteError::NetworkUnavailable(_) | RemoteError::TimeoutExceeded(_)
        )
    }
}

/// The persistent medium behind the history could not be used.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HistoryError {
    #[error("storage error: medium unavailable: {0}")]
    Unavailable(String),
    #[error("storage error: history record is corrupt: {0}")]
    Corrupt(String),
}

/// Outcomes of an analysis the caller has to tell the user about.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Image rejected: {reason}")]
    AnomalyRejected { reason: String },
    #[error("Prediction confidence {confidence:.1}% is below the threshold")]
    LowConfidence {
        confidence: f64,
        origin: PredictionSource,
    },
    #[error("No images to analyze")]
    EmptyBatch,
}

impl AnalysisError {
    /// True when the low-confidence result came from the offline fallback.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            AnalysisError::LowConfidence {
                origin: PredictionSource::Fallback,
                ..
            }
        )
    }
}
