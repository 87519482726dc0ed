use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use species_classifier::config::ModelConfig;
use species_classifier::prediction::{Prediction, PredictionService};

/// Classify local image files with the species model
#[derive(Parser, Debug)]
#[command(name = "classify", version)]
struct Cli {
    #[command(flatten)]
    model: ModelConfig,

    /// Number of classes to print per image
    #[arg(short = 'k', long, default_value_t = 3)]
    top_k: usize,

    /// Image files to classify
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let service = PredictionService::initialize(&cli.model).context("failed to load model")?;
    log::info!("Loaded model with {} classes", service.labels().len());

    // Classify in parallel, report in argument order
    let results: Vec<(&PathBuf, Result<Vec<Prediction>>)> = cli
        .images
        .par_iter()
        .map(|path| {
            let ranked = std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))
                .and_then(|bytes| {
                    let probabilities = service.probabilities(&bytes)?;
                    Ok(service.top_k(&probabilities, cli.top_k))
                });
            (path, ranked)
        })
        .collect();

    let mut failures = 0;
    for (path, ranked) in results {
        match ranked {
            Ok(ranked) => {
                println!("{}", path.display());
                for prediction in ranked {
                    println!("  {:>6.2}%  {}", prediction.confidence, prediction.label);
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("{}: {:#}", path.display(), e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} images could not be classified", failures, cli.images.len());
    }
    Ok(())
}
