use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ml::TrainingStatus;
use crate::models::domain::Recommendation;

/// Response for recommendation generation and lookup endpoints
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationBatchResponse {
    pub open_house_id: i64,
    pub recommendations: Vec<Recommendation>,
    pub count: usize,
}

/// Response after a host was assigned from the batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectHostResponse {
    pub open_house_id: i64,
    pub agent_id: i64,
    pub success: bool,
}

/// Response for the train endpoint: job accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingStartedResponse {
    pub job_id: Uuid,
}

/// Current model version plus training-job state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatusResponse {
    pub current_version: Option<String>,
    pub training: TrainingStatus,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
