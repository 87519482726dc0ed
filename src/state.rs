// Shared state built once at startup and handed to every request
use std::sync::Arc;

use crate::prediction::PredictionService;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// `predictor` is `None` when the model failed to load and the server was
/// started in degraded mode.
#[derive(Clone)]
pub struct AppState {
    pub predictor: Option<Arc<PredictionService>>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn ready(service: PredictionService) -> Self {
        Self {
            predictor: Some(Arc::new(service)),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            predictor: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.predictor.is_some()
    }
}
