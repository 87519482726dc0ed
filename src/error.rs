// Error types for model startup and per-request prediction
use std::path::PathBuf;

use thiserror::Error;

/// Failures while loading the resources the service cannot run without.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("could not read class names file at '{path}': {source}")]
    Labels {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("class names file at '{path}' contains no labels")]
    EmptyLabels { path: PathBuf },

    #[error("expected {expected} classes but the class names file lists {found}")]
    ClassCountMismatch { expected: usize, found: usize },

    #[error("model file not found at '{path}'")]
    WeightsNotFound { path: PathBuf },

    #[error("an error occurred while loading the model from '{path}': {source}")]
    Weights {
        path: PathBuf,
        #[source]
        source: candle::Error,
    },

    #[error("could not fetch '{file}' from the hub: {source}")]
    Hub {
        file: String,
        #[source]
        source: hf_hub::api::sync::ApiError,
    },
}

/// Failures while turning an uploaded image into a prediction.
#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("inference failed: {0}")]
    Inference(#[from] candle::Error),

    #[error("model produced {outputs} scores for {labels} labels")]
    OutputMismatch { outputs: usize, labels: usize },
}
