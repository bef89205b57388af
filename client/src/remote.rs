//! HTTP client for the cassava inference service.
//!
//! `GET /` is the liveness check, `POST /predict` takes one multipart
//! `image` field and `POST /predict-multiple` takes repeated `images` fields.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::multipart::{Form, Part};
use shared::{
    AnomalyVerdict, BatchPredictResponse, PredictOutcome, PredictResponse, PredictionResult,
    PredictionSource, WireError,
};

use crate::config::ClientConfig;
use crate::error::RemoteError;
use crate::upload::ImageUpload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable,
}

/// What the service said about one image.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOutcome {
    Prediction(PredictionResult),
    Anomaly(AnomalyVerdict),
}

pub type SlotResult = Result<RemoteOutcome, RemoteError>;

/// The operations the orchestrator needs from an inference backend.
pub trait InferenceApi: Send + Sync {
    fn check_health(&self) -> impl Future<Output = Availability> + Send;

    fn predict_one(
        &self,
        image: &ImageUpload,
    ) -> impl Future<Output = Result<RemoteOutcome, RemoteError>> + Send;

    /// One request for all images. The outer error is a failure of the whole
    /// call; otherwise there is exactly one slot per image, in input order.
    fn predict_many(
        &self,
        images: &[ImageUpload],
    ) -> impl Future<Output = Result<Vec<SlotResult>, RemoteError>> + Send;
}

impl<T: InferenceApi> InferenceApi for Arc<T> {
    async fn check_health(&self) -> Availability {
        (**self).check_health().await
    }

    async fn predict_one(&self, image: &ImageUpload) -> Result<RemoteOutcome, RemoteError> {
        (**self).predict_one(image).await
    }

    async fn predict_many(&self, images: &[ImageUpload]) -> Result<Vec<SlotResult>, RemoteError> {
        (**self).predict_many(images).await
    }
}

#[derive(Debug, Clone)]
pub struct RemoteClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    retry_budget: Duration,
}

impl RemoteClient {
    pub fn new(config: &ClientConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| RemoteError::NetworkUnavailable(format!("Cannot build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            client,
            timeout: config.timeout,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
            retry_budget: config.retry_budget,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_base_url(&mut self, url: &str) {
        self.base_url = url.trim_end_matches('/').to_string();
    }

    /// Raw liveness body. Any 2xx answer carrying JSON counts as healthy.
    pub async fn health(&self) -> Result<serde_json::Value, RemoteError> {
        let url = format!("{}/", self.base_url);
        self.with_deadline(self.timeout, async {
            let response = self
                .client
                .get(&url)
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| classify(e, self.timeout))?;
            read_json(response, self.timeout).await
        })
        .await
    }

    async fn with_deadline<T, F>(&self, deadline: Duration, request: F) -> Result<T, RemoteError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        // Expiry drops the request future, which aborts the connection.
        match tokio::time::timeout(deadline, request).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::TimeoutExceeded(deadline)),
        }
    }

    /// Retries transient failures with exponential backoff, all within
    /// `retry_budget`. `attempt` gets the deadline for that try.
    async fn with_retries<T, F, Fut>(&self, what: &str, mut attempt: F) -> Result<T, RemoteError>
    where
        F: FnMut(Duration) -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let started = Instant::now();
        let mut tries = 0;
        loop {
            let remaining = self.retry_budget.saturating_sub(started.elapsed());
            match attempt(self.timeout.min(remaining)).await {
                Err(e) if e.is_transient() && tries < self.max_retries => {
                    let delay = self.retry_delay.saturating_mul(2u32.saturating_pow(tries));
                    if started.elapsed() + delay >= self.retry_budget {
                        log::warn!("{} failed ({}), retry budget of {:?} spent", what, e, self.retry_budget);
                        return Err(e);
                    }
                    tries += 1;
                    log::warn!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        what,
                        e,
                        tries,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    async fn send_predict(&self, image: &ImageUpload, deadline: Duration) -> Result<RemoteOutcome, RemoteError> {
        let url = format!("{}/predict", self.base_url);
        let form = Form::new().part("image", image_part(image, None)?);
        log::debug!("POST {} ({} bytes)", url, image.bytes().len());

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| classify(e, deadline))?;
        let body: PredictResponse = read_json(response, deadline).await?;
        to_outcome(&body)
    }

    async fn send_predict_many(
        &self,
        images: &[ImageUpload],
        deadline: Duration,
    ) -> Result<Vec<SlotResult>, RemoteError> {
        let url = format!("{}/predict-multiple", self.base_url);
        let mut form = Form::new();
        for (index, image) in images.iter().enumerate() {
            form = form.part("images", image_part(image, Some(index))?);
        }
        log::debug!("POST {} ({} images)", url, images.len());

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| classify(e, deadline))?;
        let body: BatchPredictResponse = read_json(response, deadline).await?;

        if body.results.len() != images.len() {
            return Err(RemoteError::MalformedResponse(format!(
                "expected {} results, got {}",
                images.len(),
                body.results.len()
            )));
        }

        let mut slots: Vec<Option<SlotResult>> = (0..images.len()).map(|_| None).collect();
        for item in body.results {
            let slot = slots.get_mut(item.image_index).ok_or_else(|| {
                RemoteError::MalformedResponse(format!("image_index {} out of range", item.image_index))
            })?;
            if slot.is_some() {
                return Err(RemoteError::MalformedResponse(format!(
                    "duplicate image_index {}",
                    item.image_index
                )));
            }
            *slot = Some(to_outcome(&item.body));
        }

        slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| RemoteError::MalformedResponse("missing batch result".to_string()))
    }
}

impl InferenceApi for RemoteClient {
    async fn check_health(&self) -> Availability {
        match self.health().await {
            Ok(_) => Availability::Available,
            Err(e) => {
                log::warn!("Inference service at {} unavailable: {}", self.base_url, e);
                Availability::Unavailable
            }
        }
    }

    async fn predict_one(&self, image: &ImageUpload) -> Result<RemoteOutcome, RemoteError> {
        self.with_retries("Prediction", |deadline| {
            self.with_deadline(deadline, self.send_predict(image, deadline))
        })
        .await
    }

    async fn predict_many(&self, images: &[ImageUpload]) -> Result<Vec<SlotResult>, RemoteError> {
        if images.is_empty() {
            return Ok(Vec::new());
        }
        self.with_retries("Batch prediction", |deadline| {
            self.with_deadline(deadline, self.send_predict_many(images, deadline))
        })
        .await
    }
}

fn image_part(image: &ImageUpload, batch_position: Option<usize>) -> Result<Part, RemoteError> {
    Part::bytes(image.bytes().to_vec())
        .file_name(image.file_name(batch_position))
        .mime_str(image.mime_type())
        .map_err(|e| RemoteError::NetworkUnavailable(format!("Cannot build upload: {e}")))
}

fn classify(err: reqwest::Error, budget: Duration) -> RemoteError {
    if err.is_timeout() {
        RemoteError::TimeoutExceeded(budget)
    } else if err.is_decode() {
        RemoteError::MalformedResponse(err.to_string())
    } else if let Some(status) = err.status() {
        RemoteError::ServerError(status.as_u16())
    } else {
        RemoteError::NetworkUnavailable(err.to_string())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    budget: Duration,
) -> Result<T, RemoteError> {
    let status = response.status();
    if !status.is_success() {
        return Err(RemoteError::ServerError(status.as_u16()));
    }
    let text = response.text().await.map_err(|e| classify(e, budget))?;
    serde_json::from_str(&text).map_err(|e| RemoteError::MalformedResponse(e.to_string()))
}

fn to_outcome(body: &PredictResponse) -> Result<RemoteOutcome, RemoteError> {
    match body.interpret() {
        Ok(PredictOutcome::Anomaly(verdict)) => Ok(RemoteOutcome::Anomaly(verdict)),
        Ok(PredictOutcome::Classification { label, confidence }) => {
            PredictionResult::new(label, confidence, PredictionSource::Remote)
                .map(RemoteOutcome::Prediction)
                .map_err(|e| RemoteError::MalformedResponse(e.to_string()))
        }
        Err(WireError::Remote(message)) => Err(RemoteError::ImageFailed(message)),
        Err(e) => Err(RemoteError::MalformedResponse(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ClassLabel;

    #[test]
    fn classification_body_becomes_remote_prediction() {
        let body = PredictResponse::classification(ClassLabel::BrownStreak, 77.0);
        match to_outcome(&body).unwrap() {
            RemoteOutcome::Prediction(p) => {
                assert_eq!(p.label(), ClassLabel::BrownStreak);
                assert_eq!(p.source(), PredictionSource::Remote);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn error_body_is_an_image_failure_and_bad_label_is_malformed() {
        assert_eq!(
            to_outcome(&PredictResponse::error("cannot identify image file")),
            Err(RemoteError::ImageFailed("cannot identify image file".into()))
        );
        let bad = PredictResponse {
            class_name: Some("Cassava Green Mottle (CGM)".into()),
            confidence: Some(80.0),
            ..Default::default()
        };
        assert!(matches!(to_outcome(&bad), Err(RemoteError::MalformedResponse(_))));
    }

    #[test]
    fn base_url_is_normalised() {
        let mut client = RemoteClient::new(&ClientConfig::default()).unwrap();
        client.set_base_url("https://afsod-cassava-backend-api.hf.space/");
        assert_eq!(client.base_url(), "https://afsod-cassava-backend-api.hf.space");
    }
}
