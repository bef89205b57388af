use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use log::{info, warn};
use shared::{BatchItem, BatchPredictResponse, HealthResponse, PredictResponse};

use crate::model::PlaceholderModel;
use crate::vegetation;

pub const MAX_BATCH_IMAGES: usize = 15;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(health)))
        .service(web::resource("/predict").route(web::post().to(predict)))
        .service(web::resource("/predict-multiple").route(web::post().to(predict_multiple)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        message: "Cassava disease detection API".to_string(),
        status: "healthy".to_string(),
    })
}

/// Collects the non-empty file fields named `field_name`, in upload order.
async fn read_images(mut payload: Multipart, field_name: &str) -> Result<Vec<Vec<u8>>, Error> {
    let mut images = Vec::new();
    while let Some(mut field) = payload.try_next().await? {
        let matches = field.name() == Some(field_name);
        let mut image_data = Vec::new();
        while let Some(chunk) = field.next().await {
            image_data.extend_from_slice(&chunk?);
        }
        if matches && !image_data.is_empty() {
            images.push(image_data);
        }
    }
    Ok(images)
}

fn analyse(model: &PlaceholderModel, image_data: &[u8]) -> PredictResponse {
    let img = match model.decode(image_data) {
        Ok(img) => img,
        Err(e) => {
            warn!("Rejected upload of {} bytes: {}", image_data.len(), e);
            return PredictResponse::error(e.to_string());
        }
    };

    let verdict = vegetation::detect_anomaly(&img);
    if !verdict.valid {
        return PredictResponse::anomaly(verdict.reason);
    }

    let scores = model.inference(image_data);
    let (label, confidence) = model.calculate_result(&scores);
    info!("Classified upload as {} ({:.1}%)", label, confidence);
    PredictResponse::classification(label, confidence)
}

async fn predict(model: web::Data<PlaceholderModel>, payload: Multipart) -> Result<HttpResponse, Error> {
    let images = read_images(payload, "image").await?;
    let Some(image_data) = images.first() else {
        return Ok(HttpResponse::BadRequest().json(PredictResponse::error("No image provided")));
    };

    let body = analyse(&model, image_data);
    if body.error.is_some() {
        Ok(HttpResponse::BadRequest().json(body))
    } else {
        Ok(HttpResponse::Ok().json(body))
    }
}

async fn predict_multiple(
    model: web::Data<PlaceholderModel>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    let images = read_images(payload, "images").await?;
    if images.is_empty() {
        return Ok(HttpResponse::BadRequest().json(PredictResponse::error("No images provided")));
    }
    if images.len() > MAX_BATCH_IMAGES {
        return Ok(HttpResponse::BadRequest().json(PredictResponse::error(format!(
            "Maximum {} images allowed",
            MAX_BATCH_IMAGES
        ))));
    }

    let results = images
        .iter()
        .enumerate()
        .map(|(image_index, image_data)| BatchItem {
            image_index,
            body: analyse(&model, image_data),
        })
        .collect();
    Ok(HttpResponse::Ok().json(BatchPredictResponse { results }))
}
