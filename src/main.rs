// Web server entry point
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use species_classifier::api;
use species_classifier::config::ServerConfig;
use species_classifier::prediction::PredictionService;
use species_classifier::state::AppState;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = ServerConfig::parse();

    log::info!(
        "Loading model from {:?} and class names from {:?}",
        config.model.weights,
        config.model.labels
    );
    let state = match PredictionService::initialize(&config.model) {
        Ok(service) => {
            log::info!("Ready to make predictions over {} classes", service.labels().len());
            AppState::ready(service)
        }
        Err(e) if config.allow_degraded_start => {
            log::error!("Model not loaded, /predict will answer 503: {}", e);
            AppState::unavailable()
        }
        Err(e) => return Err(e).context("application failed to start"),
    }
    .with_max_upload_bytes(config.max_upload_bytes);

    let shared_state = web::Data::new(state);
    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(shared_state.clone())
            .wrap(api::cors())
            .wrap(Logger::default())
            .configure(api::configure)
    });
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    log::info!("Starting server on http://{}:{}", config.host, config.port);
    server
        .bind((config.host.as_str(), config.port))?
        .run()
        .await?;
    Ok(())
}
