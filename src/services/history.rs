use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Agent, AgentPerformance, Listing, OpenHouse, Recommendation};

/// Errors surfaced by historical-data providers
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// Read-only access to the historical records the engine scores against.
///
/// The engine never talks to storage directly: it receives already-fetched
/// domain records plus one of these handles for historical aggregates.
/// Implementations must be side-effect free so that scoring stays a pure
/// computation over immutable snapshots.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// All agents currently eligible to host
    async fn fetch_active_agents(&self) -> Result<Vec<Agent>, HistoryError>;

    async fn fetch_agent(&self, agent_id: i64) -> Result<Option<Agent>, HistoryError>;

    async fn fetch_listing(&self, listing_id: i64) -> Result<Option<Listing>, HistoryError>;

    async fn fetch_open_house(&self, open_house_id: i64)
        -> Result<Option<OpenHouse>, HistoryError>;

    /// Performance aggregates whose period starts at or after `since`
    async fn fetch_performance(
        &self,
        agent_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<AgentPerformance>, HistoryError>;

    /// Open houses hosted by `agent_id` with a start time in `[since, until]`,
    /// regardless of status
    async fn fetch_open_houses(
        &self,
        agent_id: i64,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<OpenHouse>, HistoryError>;

    /// Start time of the agent's most recent completed or scheduled open house
    async fn fetch_last_hosted(
        &self,
        agent_id: i64,
    ) -> Result<Option<DateTime<Utc>>, HistoryError>;

    /// Every completed open house, for training-set construction
    async fn fetch_completed_open_houses(&self) -> Result<Vec<OpenHouse>, HistoryError>;

    /// The stored recommendation batch for one open house
    async fn fetch_recommendations(
        &self,
        open_house_id: i64,
    ) -> Result<Vec<Recommendation>, HistoryError>;

    /// How many times the agent appeared in a recommendation batch for an
    /// open house starting in `[since, until]`, selected or not
    async fn count_recommendations(
        &self,
        agent_id: i64,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<u64, HistoryError>;
}

/// Mutation seam for the caller side of the recommendation contract.
///
/// Kept separate from [`HistoryProvider`] so the scoring pipeline can only
/// ever see the read-only surface.
#[async_trait]
pub trait RecommendationStore: Send + Sync {
    /// Atomically replace the stored batch for one open house.
    ///
    /// Must be all-or-nothing: a failure leaves the prior batch intact,
    /// never half-deleted.
    async fn replace_recommendations(
        &self,
        open_house_id: i64,
        batch: &[Recommendation],
    ) -> Result<(), HistoryError>;

    /// Record that a recommended agent was actually assigned as host
    async fn mark_selected(&self, open_house_id: i64, agent_id: i64)
        -> Result<(), HistoryError>;
}
