mod config;
mod core;
mod ml;
mod models;
mod routes;
mod services;

use actix_cors::Cors;
use actix_web::{error, middleware, web, App, HttpServer};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::core::RecommendationEngine;
use crate::ml::{ArtifactStore, ModelHandle, ModelTrainer, TrainedScorer, TrainingJobManager};
use crate::models::ErrorResponse;
use crate::routes::recommendations::AppState;
use crate::services::{CachedHistory, HistoryProvider, PostgresClient, RecommendationStore};

/// Handle JSON payload errors with a structured response
pub fn handle_json_payload_error(
    err: error::JsonPayloadError,
    req: &actix_web::HttpRequest,
) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    error::InternalError::from_response(
        err.to_string(),
        actix_web::HttpResponse::BadRequest().json(ErrorResponse {
            error: "invalid_json".to_string(),
            message: err.to_string(),
            status_code: 400,
        }),
    )
    .into()
}

/// Handle query payload errors with a structured response
pub fn handle_query_payload_error(
    err: error::QueryPayloadError,
    _req: &actix_web::HttpRequest,
) -> actix_web::Error {
    error::InternalError::from_response(
        err.to_string(),
        actix_web::HttpResponse::BadRequest().json(ErrorResponse {
            error: "invalid_query".to_string(),
            message: err.to_string(),
            status_code: 400,
        }),
    )
    .into()
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Initialize logging
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&log_level))
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }

    info!("Starting OpenHouse Algo recommendation service...");

    // Load configuration
    let settings = Settings::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        panic!("Configuration error: {}", e);
    });

    info!("Configuration loaded successfully");

    // Initialize PostgreSQL client
    let db_max_conn = settings.database.max_connections.unwrap_or(10);
    let db_min_conn = settings.database.min_connections.unwrap_or(1);

    let postgres = Arc::new(
        PostgresClient::from_settings(
            &settings.database.url,
            Some(db_max_conn),
            Some(db_min_conn),
        )
        .await
        .unwrap_or_else(|e| {
            error!("Failed to connect to PostgreSQL: {}", e);
            panic!("PostgreSQL connection error: {}", e);
        }),
    );

    info!("PostgreSQL client initialized (max: {} connections)", db_max_conn);

    // Wrap the provider in the in-process read-through cache
    let history: Arc<dyn HistoryProvider> = Arc::new(CachedHistory::new(
        postgres.clone(),
        settings.cache.capacity,
        settings.cache.ttl_secs,
    ));

    info!(
        "History cache initialized ({} entries, TTL: {}s)",
        settings.cache.capacity, settings.cache.ttl_secs
    );

    // Artifact store and current-model slot
    let artifact_store = ArtifactStore::new(&settings.model.dir).unwrap_or_else(|e| {
        error!("Failed to prepare model directory: {}", e);
        panic!("Model directory error: {}", e);
    });

    let model = ModelHandle::empty();
    match artifact_store.load_latest() {
        Ok(Some(artifact)) => match TrainedScorer::from_artifact(artifact) {
            Ok(scorer) => {
                info!("Loaded model artifact {}", scorer.version);
                model.publish(scorer);
            }
            Err(e) => warn!("Rejected persisted model artifact, staying rule-based: {}", e),
        },
        Ok(None) => info!("No model artifact on disk, scoring in rule-based mode"),
        Err(e) => warn!("Failed to scan model artifacts, staying rule-based: {}", e),
    }

    // Engine and training job plumbing
    let engine = Arc::new(RecommendationEngine::new(
        history.clone(),
        model.clone(),
        settings.fairness.to_policy(),
    ));

    let trainer = Arc::new(ModelTrainer::new(history.clone(), artifact_store));
    let training = Arc::new(TrainingJobManager::new(trainer, model.clone()));

    info!("Recommendation engine initialized");

    // Build application state
    let store: Arc<dyn RecommendationStore> = postgres.clone();
    let app_state = AppState {
        history,
        store,
        engine,
        training,
        model,
        postgres: Some(postgres),
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
