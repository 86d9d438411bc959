use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

use crate::core::RecommendationEngine;
use crate::ml::{JobError, ModelHandle, TrainingJobManager};
use crate::models::{
    ErrorResponse, FairnessReportQuery, GenerateRecommendationsRequest, HealthResponse,
    RecommendationBatchResponse, SelectHostRequest, SelectHostResponse, TrainingStartedResponse,
};
use crate::models::ModelStatusResponse;
use crate::services::{HistoryError, HistoryProvider, PostgresClient, RecommendationStore};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub history: Arc<dyn HistoryProvider>,
    pub store: Arc<dyn RecommendationStore>,
    pub engine: Arc<RecommendationEngine>,
    pub training: Arc<TrainingJobManager>,
    pub model: ModelHandle,
    /// Present when backed by PostgreSQL; drives the health probe
    pub postgres: Option<Arc<PostgresClient>>,
}

/// Configure all recommendation-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route(
            "/recommendations/generate",
            web::post().to(generate_recommendations),
        )
        .route(
            "/recommendations/{open_house_id}",
            web::get().to(get_recommendations),
        )
        .route("/recommendations/select", web::post().to(select_host))
        .route("/fairness/report", web::get().to(fairness_report))
        .route("/model/train", web::post().to(train_model))
        .route("/model/status", web::get().to(model_status));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let db_healthy = match &state.postgres {
        Some(postgres) => postgres.health_check().await.unwrap_or(false),
        None => true,
    };

    let status = if db_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Generate (or regenerate) the recommendation batch for an open house
///
/// POST /api/v1/recommendations/generate
///
/// Request body:
/// ```json
/// { "openHouseId": 42 }
/// ```
///
/// Regeneration replaces the stored batch atomically; a storage failure
/// surfaces here as a failed regeneration with the prior batch intact.
async fn generate_recommendations(
    state: web::Data<AppState>,
    req: web::Json<GenerateRecommendationsRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let open_house_id = req.open_house_id;
    tracing::info!(open_house_id, "Generating recommendations");

    let open_house = match state.history.fetch_open_house(open_house_id).await {
        Ok(Some(open_house)) => open_house,
        Ok(None) => {
            return HttpResponse::NotFound().json(ErrorResponse {
                error: "Open house not found".to_string(),
                message: format!("no open house with id {}", open_house_id),
                status_code: 404,
            });
        }
        Err(e) => {
            tracing::error!(open_house_id, error = %e, "Failed to fetch open house");
            return internal_error("Failed to fetch open house", e);
        }
    };

    let listing = match state.history.fetch_listing(open_house.listing_id).await {
        Ok(Some(listing)) => listing,
        Ok(None) => {
            return HttpResponse::NotFound().json(ErrorResponse {
                error: "Listing not found".to_string(),
                message: format!("no listing with id {}", open_house.listing_id),
                status_code: 404,
            });
        }
        Err(e) => {
            tracing::error!(open_house_id, error = %e, "Failed to fetch listing");
            return internal_error("Failed to fetch listing", e);
        }
    };

    let batch = match state
        .engine
        .recommend(&open_house, &listing, chrono::Utc::now())
        .await
    {
        Ok(batch) => batch,
        Err(e) => {
            tracing::error!(open_house_id, error = %e, "Scoring pipeline failed");
            return internal_error("Failed to score candidates", e);
        }
    };

    if let Err(e) = state
        .store
        .replace_recommendations(open_house_id, &batch)
        .await
    {
        tracing::error!(open_house_id, error = %e, "Batch replacement failed");
        return internal_error("Failed to store recommendations", e);
    }

    tracing::info!(
        open_house_id,
        slate = batch.len(),
        "Recommendations generated"
    );

    HttpResponse::Ok().json(RecommendationBatchResponse {
        open_house_id,
        count: batch.len(),
        recommendations: batch,
    })
}

/// Fetch the stored recommendation batch for an open house
///
/// GET /api/v1/recommendations/{open_house_id}
async fn get_recommendations(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> impl Responder {
    let open_house_id = path.into_inner();

    match state.history.fetch_recommendations(open_house_id).await {
        Ok(recommendations) => HttpResponse::Ok().json(RecommendationBatchResponse {
            open_house_id,
            count: recommendations.len(),
            recommendations,
        }),
        Err(e) => {
            tracing::error!(open_house_id, error = %e, "Failed to fetch recommendations");
            internal_error("Failed to fetch recommendations", e)
        }
    }
}

/// Record which recommended agent was actually assigned as host
///
/// POST /api/v1/recommendations/select
///
/// Request body:
/// ```json
/// { "openHouseId": 42, "agentId": 7 }
/// ```
async fn select_host(
    state: web::Data<AppState>,
    req: web::Json<SelectHostRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    match state.store.mark_selected(req.open_house_id, req.agent_id).await {
        Ok(()) => HttpResponse::Ok().json(SelectHostResponse {
            open_house_id: req.open_house_id,
            agent_id: req.agent_id,
            success: true,
        }),
        Err(HistoryError::NotFound(message)) => HttpResponse::NotFound().json(ErrorResponse {
            error: "Recommendation not found".to_string(),
            message,
            status_code: 404,
        }),
        Err(e) => {
            tracing::error!(
                open_house_id = req.open_house_id,
                agent_id = req.agent_id,
                error = %e,
                "Failed to record host selection"
            );
            internal_error("Failed to record host selection", e)
        }
    }
}

/// Roster-wide fairness breakdown
///
/// GET /api/v1/fairness/report?date=2024-06-01T00:00:00Z
async fn fairness_report(
    state: web::Data<AppState>,
    query: web::Query<FairnessReportQuery>,
) -> impl Responder {
    let reference = query.date.unwrap_or_else(chrono::Utc::now);

    match state.engine.fairness_report(reference).await {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build fairness report");
            internal_error("Failed to build fairness report", e)
        }
    }
}

/// Start a background training run
///
/// POST /api/v1/model/train
async fn train_model(state: web::Data<AppState>) -> impl Responder {
    match state.training.start().await {
        Ok(job_id) => HttpResponse::Accepted().json(TrainingStartedResponse { job_id }),
        Err(JobError::AlreadyRunning) => HttpResponse::Conflict().json(ErrorResponse {
            error: "Training already running".to_string(),
            message: JobError::AlreadyRunning.to_string(),
            status_code: 409,
        }),
    }
}

/// Current model version and training-job state
///
/// GET /api/v1/model/status
async fn model_status(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(ModelStatusResponse {
        current_version: state.model.version(),
        training: state.training.status(),
    })
}

fn internal_error(error: &str, source: HistoryError) -> HttpResponse {
    HttpResponse::InternalServerError().json(ErrorResponse {
        error: error.to_string(),
        message: source.to_string(),
        status_code: 500,
    })
}
