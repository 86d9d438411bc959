// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    Agent, AgentPerformance, ExperienceTier, FairnessFlag, FairnessNote, Listing, OpenHouse,
    OpenHouseStatus, PriceRange, RankedScore, Reasoning, Recommendation, ScoreFactor,
};
pub use requests::{FairnessReportQuery, GenerateRecommendationsRequest, SelectHostRequest};
pub use responses::{
    ErrorResponse, HealthResponse, ModelStatusResponse, RecommendationBatchResponse,
    SelectHostResponse, TrainingStartedResponse,
};
