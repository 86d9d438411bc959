use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to generate (or regenerate) the recommendation batch for an
/// open house
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerateRecommendationsRequest {
    #[validate(range(min = 1))]
    #[serde(alias = "open_house_id", rename = "openHouseId")]
    pub open_house_id: i64,
}

/// Query parameters for the fairness report endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FairnessReportQuery {
    /// Reference date for the rolling windows; defaults to now
    #[serde(default)]
    pub date: Option<chrono::DateTime<chrono::Utc>>,
}

/// Request to record which recommended agent was assigned as host
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SelectHostRequest {
    #[validate(range(min = 1))]
    #[serde(alias = "open_house_id", rename = "openHouseId")]
    pub open_house_id: i64,
    #[validate(range(min = 1))]
    #[serde(alias = "agent_id", rename = "agentId")]
    pub agent_id: i64,
}
