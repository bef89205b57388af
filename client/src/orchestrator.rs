//! Decides between the remote and fallback paths, applies the confidence
//! gate and records what happened.

use std::path::{Path, PathBuf};

use shared::{AnomalyVerdict, CONFIDENCE_THRESHOLD, PredictionResult};

use crate::anomaly::{CheckedImage, LocalPrecheck};
use crate::error::{AnalysisError, HistoryError, RemoteError};
use crate::fallback::FallbackStrategy;
use crate::history::{
    AnalysisEntry, BatchEntry, HistoryStore, SingleEntry, SlotOutcome, SourceSummary,
    StorageMedium,
};
use crate::remote::{Availability, InferenceApi, RemoteOutcome, SlotResult};
use crate::upload::ImageUpload;

/// A finished analysis. `storage_error` is set when the entry could not be
/// written to history; the entry itself is still valid.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis<T> {
    pub entry: T,
    pub storage_error: Option<HistoryError>,
}

impl<T> Analysis<T> {
    pub fn is_persisted(&self) -> bool {
        self.storage_error.is_none()
    }
}

pub struct Orchestrator<A, F, M> {
    api: A,
    fallback: F,
    precheck: LocalPrecheck,
    history: HistoryStore<M>,
}

impl<A, F, M> Orchestrator<A, F, M>
where
    A: InferenceApi,
    F: FallbackStrategy,
    M: StorageMedium,
{
    pub fn new(api: A, fallback: F, history: HistoryStore<M>) -> Self {
        Self {
            api,
            fallback,
            precheck: LocalPrecheck::new(),
            history,
        }
    }

    pub fn history(&self) -> &HistoryStore<M> {
        &self.history
    }

    /// A missing or undecodable file is rejected up front. The local pixel
    /// verdict is only used when the service gives no answer.
    pub async fn analyze_one(&self, image: &Path) -> Result<Analysis<SingleEntry>, AnalysisError> {
        let checked = self
            .precheck
            .load(image)
            .await
            .map_err(|verdict| AnalysisError::AnomalyRejected {
                reason: verdict.reason,
            })?;

        let result = match self.api.check_health().await {
            Availability::Available => {
                if !checked.verdict.valid {
                    log::info!(
                        "Sending {} despite local verdict ({}), the service decides",
                        image.display(),
                        checked.verdict.reason
                    );
                }
                self.remote_or_fallback(&checked).await
            }
            Availability::Unavailable => {
                log::info!("Service unavailable, analysing {} offline", image.display());
                self.offline(&checked.upload, &checked.verdict)
            }
        }
        .map_err(|reason| AnalysisError::AnomalyRejected { reason })?;

        if !result.passes_gate(CONFIDENCE_THRESHOLD) {
            log::info!(
                "{:?} result for {} below threshold ({:.1}%)",
                result.source(),
                image.display(),
                result.confidence()
            );
            return Err(AnalysisError::LowConfidence {
                confidence: result.confidence(),
                origin: result.source(),
            });
        }

        let entry = SingleEntry::new(image, result);
        let storage_error = self.persist(entry.clone().into()).await;
        Ok(Analysis {
            entry,
            storage_error,
        })
    }

    /// `Err` carries the rejection reason.
    async fn remote_or_fallback(&self, checked: &CheckedImage) -> Result<PredictionResult, String> {
        let path = checked.upload.path();
        match self.api.predict_one(&checked.upload).await {
            Ok(RemoteOutcome::Prediction(result)) => Ok(result),
            Ok(RemoteOutcome::Anomaly(verdict)) => {
                log::warn!(
                    "Service flagged {} as anomalous ({}), using fallback",
                    path.display(),
                    verdict.reason
                );
                Ok(self.fallback.predict(path))
            }
            Err(e) => {
                log::warn!("Remote prediction for {} failed ({}), using fallback", path.display(), e);
                self.offline(&checked.upload, &checked.verdict)
            }
        }
    }

    /// Fallback guarded by the local verdict.
    fn offline(&self, upload: &ImageUpload, verdict: &AnomalyVerdict) -> Result<PredictionResult, String> {
        if verdict.valid {
            Ok(self.fallback.predict(upload.path()))
        } else {
            Err(verdict.reason.clone())
        }
    }

    /// Per-image outcomes come back in input order. Confidence is not gated
    /// here; each slot keeps its own value.
    pub async fn analyze_many(&self, images: &[PathBuf]) -> Result<Analysis<BatchEntry>, AnalysisError> {
        if images.is_empty() {
            return Err(AnalysisError::EmptyBatch);
        }

        let mut slots: Vec<Option<SlotOutcome>> = vec![None; images.len()];
        let mut positions = Vec::new();
        let mut uploads = Vec::new();
        let mut verdicts = Vec::new();
        for (index, path) in images.iter().enumerate() {
            match self.precheck.load(path).await {
                Ok(CheckedImage { upload, verdict }) => {
                    positions.push(index);
                    uploads.push(upload);
                    verdicts.push(verdict);
                }
                Err(verdict) => {
                    slots[index] = Some(SlotOutcome::Anomaly {
                        reason: verdict.reason,
                    })
                }
            }
        }

        let mut summary = SourceSummary::Fallback;
        if !uploads.is_empty() {
            match self.remote_batch(&uploads).await {
                Some(results) => {
                    summary = SourceSummary::Remote;
                    for (&index, result) in positions.iter().zip(results) {
                        slots[index] = Some(slot_from_remote(result));
                    }
                }
                None => {
                    for ((&index, upload), verdict) in positions.iter().zip(&uploads).zip(&verdicts) {
                        slots[index] = Some(match self.offline(upload, verdict) {
                            Ok(result) => SlotOutcome::Prediction(result),
                            Err(reason) => SlotOutcome::Anomaly { reason },
                        });
                    }
                }
            }
        }

        let results: Vec<SlotOutcome> = slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| SlotOutcome::Failed {
                    error: "no result for image".to_string(),
                })
            })
            .collect();

        let entry = BatchEntry::new(images.to_vec(), results, summary);
        log::info!(
            "Batch analysis finished: {}/{} successful via {:?}",
            entry.successful(),
            entry.total(),
            summary
        );
        let storage_error = self.persist(entry.clone().into()).await;
        Ok(Analysis {
            entry,
            storage_error,
        })
    }

    /// `None` means the fallback has to take the whole batch.
    async fn remote_batch(&self, uploads: &[ImageUpload]) -> Option<Vec<SlotResult>> {
        if self.api.check_health().await == Availability::Unavailable {
            log::info!("Service unavailable, analysing {} images offline", uploads.len());
            return None;
        }
        match self.api.predict_many(uploads).await {
            Ok(results) if results.len() == uploads.len() => Some(results),
            Ok(results) => {
                log::warn!(
                    "Batch answer had {} slots for {} images, using fallback",
                    results.len(),
                    uploads.len()
                );
                None
            }
            Err(e) => {
                log::warn!("Batch prediction failed ({}), using fallback", e);
                None
            }
        }
    }

    async fn persist(&self, entry: AnalysisEntry) -> Option<HistoryError> {
        match self.history.append(entry).await {
            Ok(()) => None,
            Err(e) => {
                log::error!("Analysis could not be saved: {}", e);
                Some(e)
            }
        }
    }
}

fn slot_from_remote(result: SlotResult) -> SlotOutcome {
    match result {
        Ok(RemoteOutcome::Prediction(prediction)) => SlotOutcome::Prediction(prediction),
        Ok(RemoteOutcome::Anomaly(verdict)) => SlotOutcome::Anomaly {
            reason: verdict.reason,
        },
        Err(RemoteError::ImageFailed(message)) => SlotOutcome::Failed { error: message },
        Err(e) => SlotOutcome::Failed {
            error: e.to_string(),
        },
    }
}
