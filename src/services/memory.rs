use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::RwLock;

use crate::models::{
    Agent, AgentPerformance, Listing, OpenHouse, OpenHouseStatus, Recommendation,
};
use crate::services::history::{HistoryError, HistoryProvider, RecommendationStore};

/// In-memory implementation of the data-access seams.
///
/// Backs unit and pipeline tests, and doubles as a fixture store for local
/// development without a database. Not intended for production use.
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    agents: Vec<Agent>,
    listings: Vec<Listing>,
    open_houses: Vec<OpenHouse>,
    performance: Vec<AgentPerformance>,
    recommendations: Vec<Recommendation>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_agent(&self, agent: Agent) {
        self.inner.write().expect("lock poisoned").agents.push(agent);
    }

    pub fn insert_listing(&self, listing: Listing) {
        self.inner
            .write()
            .expect("lock poisoned")
            .listings
            .push(listing);
    }

    pub fn insert_open_house(&self, open_house: OpenHouse) {
        self.inner
            .write()
            .expect("lock poisoned")
            .open_houses
            .push(open_house);
    }

    pub fn insert_performance(&self, row: AgentPerformance) {
        self.inner
            .write()
            .expect("lock poisoned")
            .performance
            .push(row);
    }

    pub fn insert_recommendation(&self, recommendation: Recommendation) {
        self.inner
            .write()
            .expect("lock poisoned")
            .recommendations
            .push(recommendation);
    }

    /// Synchronous snapshot of one open house's batch, for test assertions
    pub fn recommendation_batch(&self, open_house_id: i64) -> Vec<Recommendation> {
        self.inner
            .read()
            .expect("lock poisoned")
            .recommendations
            .iter()
            .filter(|rec| rec.open_house_id == open_house_id)
            .cloned()
            .collect()
    }

    fn open_house_start(&self, open_house_id: i64) -> Option<DateTime<Utc>> {
        self.inner
            .read()
            .expect("lock poisoned")
            .open_houses
            .iter()
            .find(|oh| oh.id == open_house_id)
            .map(|oh| oh.start_time)
    }
}

#[async_trait]
impl HistoryProvider for InMemoryHistory {
    async fn fetch_active_agents(&self) -> Result<Vec<Agent>, HistoryError> {
        Ok(self
            .inner
            .read()
            .expect("lock poisoned")
            .agents
            .iter()
            .filter(|agent| agent.is_active)
            .cloned()
            .collect())
    }

    async fn fetch_agent(&self, agent_id: i64) -> Result<Option<Agent>, HistoryError> {
        Ok(self
            .inner
            .read()
            .expect("lock poisoned")
            .agents
            .iter()
            .find(|agent| agent.id == agent_id)
            .cloned())
    }

    async fn fetch_listing(&self, listing_id: i64) -> Result<Option<Listing>, HistoryError> {
        Ok(self
            .inner
            .read()
            .expect("lock poisoned")
            .listings
            .iter()
            .find(|listing| listing.id == listing_id)
            .cloned())
    }

    async fn fetch_open_house(
        &self,
        open_house_id: i64,
    ) -> Result<Option<OpenHouse>, HistoryError> {
        Ok(self
            .inner
            .read()
            .expect("lock poisoned")
            .open_houses
            .iter()
            .find(|oh| oh.id == open_house_id)
            .cloned())
    }

    async fn fetch_performance(
        &self,
        agent_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<AgentPerformance>, HistoryError> {
        Ok(self
            .inner
            .read()
            .expect("lock poisoned")
            .performance
            .iter()
            .filter(|row| row.agent_id == agent_id && row.period_start >= since)
            .cloned()
            .collect())
    }

    async fn fetch_open_houses(
        &self,
        agent_id: i64,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<OpenHouse>, HistoryError> {
        Ok(self
            .inner
            .read()
            .expect("lock poisoned")
            .open_houses
            .iter()
            .filter(|oh| {
                oh.host_agent_id == Some(agent_id)
                    && oh.start_time >= since
                    && oh.start_time <= until
            })
            .cloned()
            .collect())
    }

    async fn fetch_last_hosted(
        &self,
        agent_id: i64,
    ) -> Result<Option<DateTime<Utc>>, HistoryError> {
        Ok(self
            .inner
            .read()
            .expect("lock poisoned")
            .open_houses
            .iter()
            .filter(|oh| {
                oh.host_agent_id == Some(agent_id)
                    && matches!(
                        oh.status,
                        OpenHouseStatus::Completed | OpenHouseStatus::Scheduled
                    )
            })
            .map(|oh| oh.start_time)
            .max())
    }

    async fn fetch_completed_open_houses(&self) -> Result<Vec<OpenHouse>, HistoryError> {
        Ok(self
            .inner
            .read()
            .expect("lock poisoned")
            .open_houses
            .iter()
            .filter(|oh| oh.is_completed())
            .cloned()
            .collect())
    }

    async fn fetch_recommendations(
        &self,
        open_house_id: i64,
    ) -> Result<Vec<Recommendation>, HistoryError> {
        Ok(self.recommendation_batch(open_house_id))
    }

    async fn count_recommendations(
        &self,
        agent_id: i64,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<u64, HistoryError> {
        let recommendations: Vec<i64> = self
            .inner
            .read()
            .expect("lock poisoned")
            .recommendations
            .iter()
            .filter(|rec| rec.agent_id == agent_id)
            .map(|rec| rec.open_house_id)
            .collect();

        let count = recommendations
            .into_iter()
            .filter_map(|open_house_id| self.open_house_start(open_house_id))
            .filter(|start| *start >= since && *start <= until)
            .count();

        Ok(count as u64)
    }
}

#[async_trait]
impl RecommendationStore for InMemoryHistory {
    async fn replace_recommendations(
        &self,
        open_house_id: i64,
        batch: &[Recommendation],
    ) -> Result<(), HistoryError> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner
            .recommendations
            .retain(|rec| rec.open_house_id != open_house_id);
        inner.recommendations.extend_from_slice(batch);
        Ok(())
    }

    async fn mark_selected(
        &self,
        open_house_id: i64,
        agent_id: i64,
    ) -> Result<(), HistoryError> {
        let mut inner = self.inner.write().expect("lock poisoned");
        let entry = inner
            .recommendations
            .iter_mut()
            .find(|rec| rec.open_house_id == open_house_id && rec.agent_id == agent_id);

        match entry {
            Some(rec) => {
                rec.was_selected = true;
                Ok(())
            }
            None => Err(HistoryError::NotFound(format!(
                "no recommendation for agent {} on open house {}",
                agent_id, open_house_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Reasoning;
    use chrono::{Duration, TimeZone};

    fn reasoning() -> Reasoning {
        Reasoning {
            key_factors: vec![],
            experience_years: 0,
            conversion_rate: 0.0,
            area_familiarity: false,
            recent_activity: 0,
            fairness: None,
        }
    }

    fn recommendation(open_house_id: i64, agent_id: i64, rank: u8) -> Recommendation {
        Recommendation {
            open_house_id,
            agent_id,
            raw_score: 0.6,
            fairness_score: 0.5,
            adjusted_score: 0.57,
            rank,
            reasoning: reasoning(),
            was_selected: false,
        }
    }

    #[tokio::test]
    async fn test_replace_is_full_batch_swap() {
        let history = InMemoryHistory::new();
        history.insert_recommendation(recommendation(7, 1, 1));
        history.insert_recommendation(recommendation(7, 2, 2));
        history.insert_recommendation(recommendation(8, 3, 1));

        let replacement = vec![recommendation(7, 9, 1)];
        history.replace_recommendations(7, &replacement).await.unwrap();

        let batch = history.fetch_recommendations(7).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].agent_id, 9);

        // Other open houses untouched
        assert_eq!(history.fetch_recommendations(8).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_selected_requires_existing_entry() {
        let history = InMemoryHistory::new();
        history.insert_recommendation(recommendation(7, 1, 1));

        history.mark_selected(7, 1).await.unwrap();
        assert!(history.recommendation_batch(7)[0].was_selected);

        let missing = history.mark_selected(7, 99).await;
        assert!(matches!(missing, Err(HistoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_count_recommendations_windows_by_event_start() {
        let history = InMemoryHistory::new();
        let reference = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        for (oh_id, days_back) in [(1_i64, 5_i64), (2, 20), (3, 60)] {
            let start = reference - Duration::days(days_back);
            history.insert_open_house(OpenHouse {
                id: oh_id,
                listing_id: 1,
                host_agent_id: None,
                start_time: start,
                end_time: start + Duration::hours(2),
                status: OpenHouseStatus::Scheduled,
                attendee_count: 0,
                leads_generated: 0,
                follow_ups_scheduled: 0,
                offers_received: 0,
            });
            history.insert_recommendation(recommendation(oh_id, 1, 1));
        }

        let count = history
            .count_recommendations(1, reference - Duration::days(30), reference)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }
}
