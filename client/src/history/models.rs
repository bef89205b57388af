use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::PredictionResult;
use uuid::Uuid;

/// One persisted analysis, single image or batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnalysisEntry {
    Single(SingleEntry),
    Batch(BatchEntry),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub image_ref: PathBuf,
    pub result: PredictionResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub image_refs: Vec<PathBuf>,
    pub results: Vec<SlotOutcome>,
    pub source_summary: SourceSummary,
}

/// Per-image result inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum SlotOutcome {
    Prediction(PredictionResult),
    Anomaly { reason: String },
    Failed { error: String },
}

/// Which path served the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSummary {
    Remote,
    Fallback,
}

impl SingleEntry {
    pub fn new(image_ref: &Path, result: PredictionResult) -> Self {
        Self {
            id: Uuid::now_v7(),
            created_at: Utc::now(),
            image_ref: image_ref.to_path_buf(),
            result,
        }
    }
}

impl BatchEntry {
    pub fn new(image_refs: Vec<PathBuf>, results: Vec<SlotOutcome>, source_summary: SourceSummary) -> Self {
        Self {
            id: Uuid::now_v7(),
            created_at: Utc::now(),
            image_refs,
            results,
            source_summary,
        }
    }

    pub fn total(&self) -> usize {
        self.image_refs.len()
    }

    pub fn successful(&self) -> usize {
        self.results
            .iter()
            .filter(|slot| matches!(slot, SlotOutcome::Prediction(_)))
            .count()
    }

    pub fn used_remote(&self) -> bool {
        self.source_summary == SourceSummary::Remote
    }
}

impl SlotOutcome {
    pub fn prediction(&self) -> Option<&PredictionResult> {
        match self {
            SlotOutcome::Prediction(result) => Some(result),
            _ => None,
        }
    }
}

impl AnalysisEntry {
    pub fn id(&self) -> Uuid {
        match self {
            AnalysisEntry::Single(entry) => entry.id,
            AnalysisEntry::Batch(entry) => entry.id,
        }
    }
}

impl From<SingleEntry> for AnalysisEntry {
    fn from(entry: SingleEntry) -> Self {
        AnalysisEntry::Single(entry)
    }
}

impl From<BatchEntry> for AnalysisEntry {
    fn from(entry: BatchEntry) -> Self {
        AnalysisEntry::Batch(entry)
    }
}
