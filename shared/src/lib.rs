//! Types shared by the cassava client and the inference server.
//!
//! The class enumeration, validated prediction results and the JSON bodies
//! exchanged over `/`, `/predict` and `/predict-multiple` all live here so
//! both ends agree on the wire format.

mod label;
mod prediction;
mod wire;

pub use label::{ClassLabel, DiseaseInfo, Severity};
pub use prediction::{AnomalyVerdict, InvalidPrediction, PredictionResult, PredictionSource};
pub use wire::{
    BatchItem, BatchPredictResponse, HealthResponse, PredictOutcome, PredictResponse, WireError,
};

/// Minimum confidence (percent) for a single-image result to be kept.
pub const CONFIDENCE_THRESHOLD: f64 = 60.0;
