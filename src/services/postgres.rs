use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::time::Duration;

use crate::models::{
    Agent, AgentPerformance, Listing, OpenHouse, OpenHouseStatus, PriceRange, Reasoning,
    Recommendation,
};
use crate::services::history::{HistoryError, HistoryProvider, RecommendationStore};

/// PostgreSQL-backed implementation of the data-access seams.
///
/// The schema (agents, listings, open_houses, agent_performance,
/// agent_recommendations) is owned by the scheduling backend; this
/// client only queries it, plus the two recommendation mutations the
/// engine contract requires.
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, HistoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
    ) -> Result<Self, HistoryError> {
        tracing::info!("Connecting to PostgreSQL");
        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
        )
        .await
    }

    /// Cheap connectivity probe for the health endpoint
    pub async fn health_check(&self) -> Result<bool, HistoryError> {
        let row = sqlx::query("SELECT 1 AS one").fetch_one(&self.pool).await?;
        let one: i32 = row.get("one");
        Ok(one == 1)
    }
}

fn parse_status(raw: &str) -> Result<OpenHouseStatus, HistoryError> {
    match raw {
        "Scheduled" => Ok(OpenHouseStatus::Scheduled),
        "Completed" => Ok(OpenHouseStatus::Completed),
        "Cancelled" => Ok(OpenHouseStatus::Cancelled),
        other => Err(HistoryError::InvalidRecord(format!(
            "unknown open house status {:?}",
            other
        ))),
    }
}

fn map_agent(row: &sqlx::postgres::PgRow) -> Result<Agent, HistoryError> {
    let areas: Option<Json<Vec<String>>> = row.try_get("areas_of_expertise")?;
    let ranges: Option<Json<Vec<PriceRange>>> = row.try_get("buyer_price_ranges")?;

    Ok(Agent {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        experience_years: row.try_get::<i32, _>("experience_years")?.max(0) as u32,
        areas_of_expertise: areas.map(|json| json.0).unwrap_or_default(),
        buyer_price_ranges: ranges.map(|json| json.0).unwrap_or_default(),
        is_active: row.try_get("is_active")?,
    })
}

fn map_open_house(row: &sqlx::postgres::PgRow) -> Result<OpenHouse, HistoryError> {
    let status: String = row.try_get("status")?;
    Ok(OpenHouse {
        id: row.try_get("id")?,
        listing_id: row.try_get("listing_id")?,
        host_agent_id: row.try_get("host_agent_id")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        status: parse_status(&status)?,
        attendee_count: row.try_get::<i32, _>("attendee_count")?.max(0) as u32,
        leads_generated: row.try_get::<i32, _>("leads_generated")?.max(0) as u32,
        follow_ups_scheduled: row.try_get::<i32, _>("follow_ups_scheduled")?.max(0) as u32,
        offers_received: row.try_get::<i32, _>("offers_received")?.max(0) as u32,
    })
}

fn map_recommendation(row: &sqlx::postgres::PgRow) -> Result<Recommendation, HistoryError> {
    let reasoning: Json<Reasoning> = row.try_get("reasoning")?;
    Ok(Recommendation {
        open_house_id: row.try_get("open_house_id")?,
        agent_id: row.try_get("agent_id")?,
        raw_score: row.try_get("raw_score")?,
        fairness_score: row.try_get("fairness_score")?,
        adjusted_score: row.try_get("adjusted_score")?,
        rank: row.try_get::<i32, _>("rank")?.max(0) as u8,
        reasoning: reasoning.0,
        was_selected: row.try_get("was_selected")?,
    })
}

const OPEN_HOUSE_COLUMNS: &str = "id, listing_id, host_agent_id, start_time, end_time, status, \
     attendee_count, leads_generated, follow_ups_scheduled, offers_received";

#[async_trait]
impl HistoryProvider for PostgresClient {
    async fn fetch_active_agents(&self) -> Result<Vec<Agent>, HistoryError> {
        let rows = sqlx::query(
            "SELECT id, name, email, experience_years, areas_of_expertise, \
             buyer_price_ranges, is_active \
             FROM agents WHERE is_active = TRUE ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_agent).collect()
    }

    async fn fetch_agent(&self, agent_id: i64) -> Result<Option<Agent>, HistoryError> {
        let row = sqlx::query(
            "SELECT id, name, email, experience_years, areas_of_expertise, \
             buyer_price_ranges, is_active \
             FROM agents WHERE id = $1",
        )
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_agent).transpose()
    }

    async fn fetch_listing(&self, listing_id: i64) -> Result<Option<Listing>, HistoryError> {
        let row = sqlx::query("SELECT id, address, zip_code, price FROM listings WHERE id = $1")
            .bind(listing_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Listing {
            id: row.get("id"),
            address: row.get("address"),
            zip_code: row.get("zip_code"),
            price: row.get("price"),
        }))
    }

    async fn fetch_open_house(
        &self,
        open_house_id: i64,
    ) -> Result<Option<OpenHouse>, HistoryError> {
        let query = format!("SELECT {} FROM open_houses WHERE id = $1", OPEN_HOUSE_COLUMNS);
        let row = sqlx::query(&query)
            .bind(open_house_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_open_house).transpose()
    }

    async fn fetch_performance(
        &self,
        agent_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<AgentPerformance>, HistoryError> {
        let rows = sqlx::query(
            "SELECT agent_id, period_start, period_end, open_houses_hosted, \
             total_attendees, total_leads, total_offers, average_feedback_score \
             FROM agent_performance \
             WHERE agent_id = $1 AND period_start >= $2 \
             ORDER BY period_start",
        )
        .bind(agent_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| AgentPerformance {
                agent_id: row.get("agent_id"),
                period_start: row.get("period_start"),
                period_end: row.get("period_end"),
                open_houses_hosted: row.get::<i32, _>("open_houses_hosted").max(0) as u32,
                total_attendees: row.get::<i32, _>("total_attendees").max(0) as u32,
                total_leads: row.get::<i32, _>("total_leads").max(0) as u32,
                total_offers: row.get::<i32, _>("total_offers").max(0) as u32,
                average_feedback_score: row.get("average_feedback_score"),
            })
            .collect())
    }

    async fn fetch_open_houses(
        &self,
        agent_id: i64,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<OpenHouse>, HistoryError> {
        let query = format!(
            "SELECT {} FROM open_houses \
             WHERE host_agent_id = $1 AND start_time >= $2 AND start_time <= $3 \
             ORDER BY start_time",
            OPEN_HOUSE_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(agent_id)
            .bind(since)
            .bind(until)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(map_open_house).collect()
    }

    async fn fetch_last_hosted(
        &self,
        agent_id: i64,
    ) -> Result<Option<DateTime<Utc>>, HistoryError> {
        let row = sqlx::query(
            "SELECT start_time FROM open_houses \
             WHERE host_agent_id = $1 AND status IN ('Completed', 'Scheduled') \
             ORDER BY start_time DESC LIMIT 1",
        )
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.get("start_time")))
    }

    async fn fetch_completed_open_houses(&self) -> Result<Vec<OpenHouse>, HistoryError> {
        let query = format!(
            "SELECT {} FROM open_houses WHERE status = 'Completed' ORDER BY start_time",
            OPEN_HOUSE_COLUMNS
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        rows.iter().map(map_open_house).collect()
    }

    async fn fetch_recommendations(
        &self,
        open_house_id: i64,
    ) -> Result<Vec<Recommendation>, HistoryError> {
        let rows = sqlx::query(
            "SELECT open_house_id, agent_id, raw_score, fairness_score, adjusted_score, \
             rank, reasoning, was_selected \
             FROM agent_recommendations \
             WHERE open_house_id = $1 ORDER BY rank",
        )
        .bind(open_house_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_recommendation).collect()
    }

    async fn count_recommendations(
        &self,
        agent_id: i64,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<u64, HistoryError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total \
             FROM agent_recommendations rec \
             JOIN open_houses oh ON oh.id = rec.open_house_id \
             WHERE rec.agent_id = $1 AND oh.start_time >= $2 AND oh.start_time <= $3",
        )
        .bind(agent_id)
        .bind(since)
        .bind(until)
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.get("total");
        Ok(total.max(0) as u64)
    }
}

#[async_trait]
impl RecommendationStore for PostgresClient {
    /// Clear-then-insert inside one transaction: either the whole new
    /// batch lands or the prior batch survives untouched.
    async fn replace_recommendations(
        &self,
        open_house_id: i64,
        batch: &[Recommendation],
    ) -> Result<(), HistoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM agent_recommendations WHERE open_house_id = $1")
            .bind(open_house_id)
            .execute(&mut *tx)
            .await?;

        for recommendation in batch {
            sqlx::query(
                "INSERT INTO agent_recommendations \
                 (open_house_id, agent_id, raw_score, fairness_score, adjusted_score, \
                  rank, reasoning, was_selected, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())",
            )
            .bind(recommendation.open_house_id)
            .bind(recommendation.agent_id)
            .bind(recommendation.raw_score)
            .bind(recommendation.fairness_score)
            .bind(recommendation.adjusted_score)
            .bind(i32::from(recommendation.rank))
            .bind(Json(&recommendation.reasoning))
            .bind(recommendation.was_selected)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            open_house_id,
            batch_size = batch.len(),
            "Recommendation batch replaced"
        );

        Ok(())
    }

    async fn mark_selected(
        &self,
        open_house_id: i64,
        agent_id: i64,
    ) -> Result<(), HistoryError> {
        let result = sqlx::query(
            "UPDATE agent_recommendations SET was_selected = TRUE \
             WHERE open_house_id = $1 AND agent_id = $2",
        )
        .bind(open_house_id)
        .bind(agent_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(HistoryError::NotFound(format!(
                "no recommendation for agent {} on open house {}",
                agent_id, open_house_id
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("Scheduled").unwrap(), OpenHouseStatus::Scheduled);
        assert_eq!(parse_status("Completed").unwrap(), OpenHouseStatus::Completed);
        assert_eq!(parse_status("Cancelled").unwrap(), OpenHouseStatus::Cancelled);
        assert!(parse_status("Postponed").is_err());
    }
}
