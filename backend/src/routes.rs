use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use log::{error, info, warn};
use sha2::{Digest, Sha256};
use shared::{ClassLabel, HealthResponse};
use uuid::Uuid;

use crate::error::{PipelineError, ValidationError};
use crate::gate::{GateEngine, GateOverrides};

const IMAGE_FIELD: &str = "image";

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(home)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/predict").route(web::post().to(predict)));
}

async fn home() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body("<h1>Poultry feces classifier</h1>POST a photo to /predict")
}

async fn health(engine: web::Data<GateEngine>) -> HttpResponse {
    let engine = engine.into_inner();
    match web::block(move || engine.health()).await {
        Ok(status) if status.ready => HttpResponse::Ok().json(HealthResponse {
            status: "OK".into(),
            ready: true,
            model: Some(status.model),
            classes: Some(status.classes),
        }),
        Ok(_) => not_ready(),
        Err(e) => {
            error!("Health check worker failed: {}", e);
            not_ready()
        }
    }
}

fn not_ready() -> HttpResponse {
    HttpResponse::InternalServerError().json(HealthResponse {
        status: "ERROR".into(),
        ready: false,
        model: None,
        classes: None,
    })
}

/// Pulls the bytes of the `image` field out of the upload, skipping other fields.
async fn read_image_field(payload: &mut Multipart) -> Result<Vec<u8>, ValidationError> {
    let mut image = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ValidationError::Malformed(e.to_string()))?
    {
        let is_image = image.is_none() && field.name() == Some(IMAGE_FIELD);
        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ValidationError::Malformed(e.to_string()))?;
            if is_image {
                data.extend_from_slice(&chunk);
            }
        }
        if is_image {
            image = Some(data);
        }
    }

    match image {
        None => Err(ValidationError::MissingField),
        Some(data) if data.is_empty() => Err(ValidationError::Empty),
        Some(data) => Ok(data),
    }
}

async fn predict(
    engine: web::Data<GateEngine>,
    query: web::Query<Vec<(String, String)>>,
    mut payload: Multipart,
) -> Result<HttpResponse, PipelineError> {
    let request_id = Uuid::new_v4();

    let image = match read_image_field(&mut payload).await {
        Ok(image) => image,
        Err(e) => {
            info!("[{}] Rejected upload: {}", request_id, e);
            return Err(e.into());
        }
    };
    log::debug!(
        "[{}] Received {} bytes, sha256 {}",
        request_id,
        image.len(),
        hex::encode(Sha256::digest(&image))
    );

    let engine = engine.into_inner();
    let overrides = GateOverrides::from_pairs(query.into_inner());
    let result = web::block(move || engine.decide(&image, &overrides))
        .await
        .map_err(|e| PipelineError::Internal(e.to_string()))
        .and_then(|r| r);

    match result {
        Ok(verdict) => {
            let response = verdict.to_response();
            info!(
                "[{}] {} label={:?} healthy={:?} confidence={:?} like_score={}",
                request_id,
                verdict.kind(),
                response.label,
                response.label.map(ClassLabel::is_healthy),
                response.confidence,
                response.like_score
            );
            Ok(HttpResponse::Ok().json(response))
        }
        Err(e) if e.is_validation() => {
            warn!("[{}] Invalid image: {}", request_id, e);
            Err(e)
        }
        Err(e) => {
            error!("[{}] Prediction failed: {}", request_id, e);
            Err(e)
        }
    }
}
