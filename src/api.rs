// API routes and handlers
use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::{get, http::StatusCode, post, web, HttpResponse, Responder, ResponseError};
use futures_util::StreamExt;
use serde::Serialize;
use thiserror::Error;

use crate::state::AppState;

pub const HEALTH_MESSAGE: &str =
    "API is running. Send a POST request to /predict to classify an image.";

/// Name of the multipart field carrying the image.
pub const FILE_FIELD: &str = "file";

#[derive(Serialize)]
struct MessageResponse<'a> {
    status: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
struct ReadinessResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct PredictResponse {
    status: &'static str,
    prediction: SpeciesPrediction,
}

#[derive(Serialize)]
struct SpeciesPrediction {
    species: String,
    confidence: String,
}

/// Every way a request can fail. The display text is the message sent to
/// the client, so it must never carry internal detail.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    #[error("Model not loaded")]
    ModelNotLoaded,
    #[error("No file part in the request")]
    NoFilePart,
    #[error("No file selected")]
    NoFileSelected,
    #[error("File too large")]
    FileTooLarge,
    #[error("Failed to process image")]
    ProcessingFailed,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
            Self::NoFilePart | Self::NoFileSelected => StatusCode::BAD_REQUEST,
            Self::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::ProcessingFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(MessageResponse {
            status: "error",
            message: &self.to_string(),
        })
    }
}

struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

/// Finds the first `file` part that carries a filename and buffers its body.
async fn read_upload(mut payload: Multipart, limit: usize) -> Result<Upload, ApiError> {
    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| {
            log::warn!("Rejected multipart body: {}", e);
            ApiError::NoFilePart
        })?;
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let Some(filename) = field
            .content_disposition()
            .and_then(|disposition| disposition.get_filename())
            .map(str::to_string)
        else {
            continue;
        };

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| {
                log::warn!("Upload of {:?} interrupted: {}", filename, e);
                ApiError::NoFilePart
            })?;
            if bytes.len() + chunk.len() > limit {
                log::warn!("Upload of {:?} exceeds {} bytes", filename, limit);
                return Err(ApiError::FileTooLarge);
            }
            bytes.extend_from_slice(&chunk);
        }
        return Ok(Upload { filename, bytes });
    }
    Err(ApiError::NoFilePart)
}

/// GET / - always reports success, whether or not the model loaded
#[get("/")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(MessageResponse {
        status: "success",
        message: HEALTH_MESSAGE,
    })
}

/// GET /ready - reports whether predictions can be served
#[get("/ready")]
pub async fn readiness(state: web::Data<AppState>) -> impl Responder {
    if state.is_ready() {
        HttpResponse::Ok().json(ReadinessResponse { status: "ready" })
    } else {
        HttpResponse::ServiceUnavailable().json(ReadinessResponse {
            status: "unavailable",
        })
    }
}

#[post("/predict")]
pub async fn predict(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let Some(service) = state.predictor.clone() else {
        return Err(ApiError::ModelNotLoaded);
    };

    let Upload { filename, bytes } = read_upload(payload, state.max_upload_bytes).await?;
    if filename.is_empty() {
        return Err(ApiError::NoFileSelected);
    }

    let prediction = web::block(move || service.predict(&bytes))
        .await
        .map_err(|e| {
            log::error!("Prediction Error: {}", e);
            ApiError::ProcessingFailed
        })?
        .map_err(|e| {
            log::error!("Prediction Error for {:?}: {}", filename, e);
            ApiError::ProcessingFailed
        })?;
    log::debug!(
        "Classified {:?} as {} ({:.2}%)",
        filename,
        prediction.label,
        prediction.confidence
    );

    Ok(HttpResponse::Ok().json(PredictResponse {
        status: "success",
        prediction: SpeciesPrediction {
            species: prediction.label,
            confidence: format!("{:.2}", prediction.confidence),
        },
    }))
}

/// Cross-origin requests are accepted from anywhere.
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        .service(readiness)
        .service(predict);
}
