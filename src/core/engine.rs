use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::core::diversity::ensure_diversity;
use crate::core::fairness::{FairnessAdjuster, FairnessPolicy, FairnessReport};
use crate::core::features::extract_features;
use crate::core::scoring::{
    apply_rotation_adjustments, build_reasoning, confidence, model_score,
};
use crate::ml::ModelHandle;
use crate::models::{Agent, Listing, OpenHouse, RankedScore, Recommendation};
use crate::services::{HistoryError, HistoryProvider};

/// Recommendation pipeline: feature extraction → model score → fairness
/// blend → diversity-constrained slate.
///
/// Constructed with an injected history handle and the shared
/// current-model slot; holds no other state, so one engine can score
/// many open houses concurrently.
pub struct RecommendationEngine {
    history: Arc<dyn HistoryProvider>,
    model: ModelHandle,
    fairness: FairnessAdjuster,
}

impl RecommendationEngine {
    pub fn new(
        history: Arc<dyn HistoryProvider>,
        model: ModelHandle,
        policy: FairnessPolicy,
    ) -> Self {
        let fairness = FairnessAdjuster::new(history.clone(), policy);
        Self {
            history,
            model,
            fairness,
        }
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    /// Score candidates for hosting `listing` at `target`, best first.
    ///
    /// The published model is snapshotted once so every candidate in the
    /// batch is scored by the same artifact even if training swaps in a
    /// new one mid-call.
    pub async fn score_agents(
        &self,
        agents: &[Agent],
        listing: &Listing,
        target: DateTime<Utc>,
    ) -> Result<Vec<RankedScore>, HistoryError> {
        let current = self.model.current();
        let mut scores = Vec::with_capacity(agents.len());

        for agent in agents {
            let features =
                extract_features(agent, listing, target, self.history.as_ref()).await?;

            let base = model_score(&features, current.as_deref());
            let raw = apply_rotation_adjustments(base, &features);

            scores.push(RankedScore {
                agent_id: agent.id,
                agent_name: agent.name.clone(),
                tier: agent.tier(),
                raw_score: raw,
                fairness_score: None,
                score: raw,
                confidence: confidence(raw),
                reasoning: build_reasoning(&features),
            });
        }

        scores.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(scores)
    }

    /// Blend fairness into raw scores and re-sort (see [`FairnessAdjuster`])
    pub async fn apply_fairness_adjustments(
        &self,
        scores: Vec<RankedScore>,
        reference: DateTime<Utc>,
    ) -> Result<Vec<RankedScore>, HistoryError> {
        self.fairness.apply(scores, reference).await
    }

    /// Trim an adjusted candidate list to the final slate
    pub fn ensure_diversity(&self, scores: Vec<RankedScore>) -> Vec<RankedScore> {
        ensure_diversity(scores)
    }

    /// Full pipeline for one open house: returns the ranked batch for the
    /// caller to persist.
    ///
    /// Features are anchored at the open house start time; fairness
    /// windows end at `reference` (normally "now", injectable for
    /// replays). Ranks are contiguous from 1.
    pub async fn recommend(
        &self,
        open_house: &OpenHouse,
        listing: &Listing,
        reference: DateTime<Utc>,
    ) -> Result<Vec<Recommendation>, HistoryError> {
        let agents = self.history.fetch_active_agents().await?;
        tracing::debug!(
            open_house_id = open_house.id,
            candidates = agents.len(),
            "Scoring candidate hosts"
        );

        let scored = self
            .score_agents(&agents, listing, open_house.start_time)
            .await?;
        let adjusted = self.apply_fairness_adjustments(scored, reference).await?;
        let slate = ensure_diversity(adjusted);

        let batch = slate
            .into_iter()
            .enumerate()
            .map(|(index, candidate)| Recommendation {
                open_house_id: open_house.id,
                agent_id: candidate.agent_id,
                raw_score: candidate.raw_score,
                fairness_score: candidate.fairness_score.unwrap_or(0.0),
                adjusted_score: candidate.score,
                rank: (index + 1) as u8,
                reasoning: candidate.reasoning,
                was_selected: false,
            })
            .collect::<Vec<_>>();

        tracing::info!(
            open_house_id = open_house.id,
            slate = batch.len(),
            "Recommendation batch assembled"
        );

        Ok(batch)
    }

    /// Roster-wide fairness breakdown at `reference`
    pub async fn fairness_report(
        &self,
        reference: DateTime<Utc>,
    ) -> Result<FairnessReport, HistoryError> {
        self.fairness.report(reference).await
    }
}
