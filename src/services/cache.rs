use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::models::{Agent, AgentPerformance, Listing, OpenHouse, Recommendation};
use crate::services::history::{HistoryError, HistoryProvider};

/// Read-through cache over a [`HistoryProvider`].
///
/// Scoring a roster hits the same performance aggregates and listings
/// once per candidate; both change slowly (aggregates come from an
/// external batch process), so they are cached in-process with a short
/// TTL. Opportunity counts and open-house windows feed the fairness
/// rotation and stay uncached: serving them stale would under-count
/// freshly-granted opportunities.
pub struct CachedHistory {
    inner: Arc<dyn HistoryProvider>,
    performance: moka::future::Cache<(i64, i64), Vec<AgentPerformance>>,
    listings: moka::future::Cache<i64, Listing>,
}

impl CachedHistory {
    pub fn new(inner: Arc<dyn HistoryProvider>, capacity: u64, ttl_secs: u64) -> Self {
        let performance = moka::future::CacheBuilder::new(capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();
        let listings = moka::future::CacheBuilder::new(capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self {
            inner,
            performance,
            listings,
        }
    }
}

#[async_trait]
impl HistoryProvider for CachedHistory {
    async fn fetch_active_agents(&self) -> Result<Vec<Agent>, HistoryError> {
        self.inner.fetch_active_agents().await
    }

    async fn fetch_agent(&self, agent_id: i64) -> Result<Option<Agent>, HistoryError> {
        self.inner.fetch_agent(agent_id).await
    }

    async fn fetch_listing(&self, listing_id: i64) -> Result<Option<Listing>, HistoryError> {
        if let Some(listing) = self.listings.get(&listing_id).await {
            tracing::trace!(listing_id, "Listing cache hit");
            return Ok(Some(listing));
        }

        let listing = self.inner.fetch_listing(listing_id).await?;
        if let Some(listing) = &listing {
            self.listings.insert(listing_id, listing.clone()).await;
        }
        Ok(listing)
    }

    async fn fetch_open_house(
        &self,
        open_house_id: i64,
    ) -> Result<Option<OpenHouse>, HistoryError> {
        self.inner.fetch_open_house(open_house_id).await
    }

    async fn fetch_performance(
        &self,
        agent_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<AgentPerformance>, HistoryError> {
        let key = (agent_id, since.timestamp());
        if let Some(rows) = self.performance.get(&key).await {
            tracing::trace!(agent_id, "Performance cache hit");
            return Ok(rows);
        }

        let rows = self.inner.fetch_performance(agent_id, since).await?;
        self.performance.insert(key, rows.clone()).await;
        Ok(rows)
    }

    async fn fetch_open_houses(
        &self,
        agent_id: i64,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<OpenHouse>, HistoryError> {
        self.inner.fetch_open_houses(agent_id, since, until).await
    }

    async fn fetch_last_hosted(
        &self,
        agent_id: i64,
    ) -> Result<Option<DateTime<Utc>>, HistoryError> {
        self.inner.fetch_last_hosted(agent_id).await
    }

    async fn fetch_completed_open_houses(&self) -> Result<Vec<OpenHouse>, HistoryError> {
        self.inner.fetch_completed_open_houses().await
    }

    async fn fetch_recommendations(
        &self,
        open_house_id: i64,
    ) -> Result<Vec<Recommendation>, HistoryError> {
        self.inner.fetch_recommendations(open_house_id).await
    }

    async fn count_recommendations(
        &self,
        agent_id: i64,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<u64, HistoryError> {
        self.inner.count_recommendations(agent_id, since, until).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryHistory;
    use chrono::TimeZone;

    fn since() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn performance_row(agent_id: i64) -> AgentPerformance {
        AgentPerformance {
            agent_id,
            period_start: since() + chrono::Duration::days(10),
            period_end: since() + chrono::Duration::days(40),
            open_houses_hosted: 3,
            total_attendees: 30,
            total_leads: 6,
            total_offers: 1,
            average_feedback_score: 4.2,
        }
    }

    #[tokio::test]
    async fn test_performance_reads_are_cached() {
        let backing = Arc::new(InMemoryHistory::new());
        let cached = CachedHistory::new(backing.clone(), 100, 300);

        assert!(cached.fetch_performance(1, since()).await.unwrap().is_empty());

        // A row added after the first read stays invisible until the TTL
        // expires
        backing.insert_performance(performance_row(1));
        assert!(cached.fetch_performance(1, since()).await.unwrap().is_empty());

        // A different window key misses the cache and sees the new row
        let other_window = since() + chrono::Duration::days(1);
        assert_eq!(
            cached.fetch_performance(1, other_window).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_listing_cache_skips_misses() {
        let backing = Arc::new(InMemoryHistory::new());
        let cached = CachedHistory::new(backing.clone(), 100, 300);

        assert!(cached.fetch_listing(1).await.unwrap().is_none());

        // Absent listings are not negatively cached
        backing.insert_listing(Listing {
            id: 1,
            address: "123 Main St".to_string(),
            zip_code: "94110".to_string(),
            price: 650_000.0,
        });
        assert!(cached.fetch_listing(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rotation_counts_bypass_cache() {
        let backing = Arc::new(InMemoryHistory::new());
        let cached = CachedHistory::new(backing.clone(), 100, 300);

        let until = since() + chrono::Duration::days(30);
        assert!(cached
            .fetch_open_houses(1, since(), until)
            .await
            .unwrap()
            .is_empty());

        backing.insert_open_house(OpenHouse {
            id: 1,
            listing_id: 1,
            host_agent_id: Some(1),
            start_time: since() + chrono::Duration::days(5),
            end_time: since() + chrono::Duration::days(5) + chrono::Duration::hours(2),
            status: crate::models::OpenHouseStatus::Scheduled,
            attendee_count: 0,
            leads_generated: 0,
            follow_ups_scheduled: 0,
            offers_received: 0,
        });

        // New opportunity visible immediately
        assert_eq!(
            cached.fetch_open_houses(1, since(), until).await.unwrap().len(),
            1
        );
    }
}
