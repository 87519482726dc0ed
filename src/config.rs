// Command line and environment configuration
use std::path::{Path, PathBuf};

use clap::{Args, Parser};
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};

use crate::error::StartupError;

/// Where the classifier weights and class names come from.
#[derive(Args, Debug, Clone)]
pub struct ModelConfig {
    /// Classifier weights (.safetensors, or a PyTorch .pth state dict)
    #[arg(long, env = "SPECIES_WEIGHTS", default_value = "models/house_plant_classifier_v1.pth")]
    pub weights: PathBuf,

    /// Newline-delimited class names, in the order of the model outputs
    #[arg(long, env = "SPECIES_LABELS", default_value = "class_names.txt")]
    pub labels: PathBuf,

    /// Expected number of classes; startup fails if the label file disagrees
    #[arg(long, env = "SPECIES_NUM_CLASSES")]
    pub num_classes: Option<usize>,

    /// Fetch `weights` and `labels` from this Hugging Face Hub model repo
    #[arg(long, env = "SPECIES_HUB_REPO")]
    pub hub_repo: Option<String>,

    /// Revision used with `--hub-repo`
    #[arg(long, env = "SPECIES_HUB_REVISION", default_value = "main")]
    pub hub_revision: String,
}

impl ModelConfig {
    pub fn local(weights: impl Into<PathBuf>, labels: impl Into<PathBuf>) -> Self {
        Self {
            weights: weights.into(),
            labels: labels.into(),
            num_classes: None,
            hub_repo: None,
            hub_revision: "main".to_string(),
        }
    }

    /// Returns local `(weights, labels)` paths, downloading them first when a
    /// hub repo is configured.
    pub fn resolve_paths(&self) -> Result<(PathBuf, PathBuf), StartupError> {
        let Some(repo_id) = &self.hub_repo else {
            return Ok((self.weights.clone(), self.labels.clone()));
        };

        let repo = Repo::with_revision(repo_id.clone(), RepoType::Model, self.hub_revision.clone());
        let api = Api::new()
            .map_err(|source| StartupError::Hub {
                file: repo_id.clone(),
                source,
            })?
            .repo(repo);
        let fetch = |path: &Path| {
            let file = path.to_string_lossy();
            log::info!("Fetching {} from {}@{}", file, repo_id, self.hub_revision);
            api.get(&file).map_err(|source| StartupError::Hub {
                file: file.to_string(),
                source,
            })
        };

        Ok((fetch(&self.weights)?, fetch(&self.labels)?))
    }
}

/// Species classification HTTP server
#[derive(Parser, Debug, Clone)]
#[command(name = "species_classifier", version)]
pub struct ServerConfig {
    /// Host to bind to
    #[arg(long, env = "SPECIES_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "SPECIES_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Number of HTTP worker threads (defaults to the number of CPUs)
    #[arg(long, env = "SPECIES_WORKERS")]
    pub workers: Option<usize>,

    /// Largest accepted upload, in bytes
    #[arg(long, env = "SPECIES_MAX_UPLOAD_BYTES", default_value_t = 16 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Keep serving when the model fails to load; /predict then answers 503
    #[arg(long, env = "SPECIES_ALLOW_DEGRADED_START")]
    pub allow_degraded_start: bool,

    #[command(flatten)]
    pub model: ModelConfig,
}
