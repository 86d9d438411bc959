use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::scoring::clamp01;
use crate::models::{ExperienceTier, FairnessFlag, FairnessNote, RankedScore};
use crate::services::{HistoryError, HistoryProvider};

/// Opportunity bounds for one tier per rolling 30-day window
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TierLimits {
    pub min: u32,
    pub max: u32,
}

/// Fairness configuration: per-tier opportunity targets and the blend
/// between model score and fairness score.
#[derive(Debug, Clone, Copy)]
pub struct FairnessPolicy {
    pub junior: TierLimits,
    pub mid: TierLimits,
    pub senior: TierLimits,
    pub model_weight: f64,
    pub fairness_weight: f64,
}

impl Default for FairnessPolicy {
    fn default() -> Self {
        Self {
            junior: TierLimits { min: 2, max: 8 },
            mid: TierLimits { min: 3, max: 12 },
            senior: TierLimits { min: 4, max: 16 },
            model_weight: 0.7,
            fairness_weight: 0.3,
        }
    }
}

impl FairnessPolicy {
    pub fn limits(&self, tier: ExperienceTier) -> TierLimits {
        match tier {
            ExperienceTier::Junior => self.junior,
            ExperienceTier::Mid => self.mid,
            ExperienceTier::Senior => self.senior,
        }
    }
}

/// An agent's opportunity history, windows ending at the reference date
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityCounts {
    pub hosted_30_days: u32,
    pub hosted_90_days: u32,
    pub recommended_30_days: u32,
}

/// How an agent sits against their tier's opportunity bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FairnessStatus {
    Balanced,
    BelowMinimum,
    AboveMaximum,
}

/// Per-agent entry of the roster fairness report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentFairnessEntry {
    pub agent_id: i64,
    pub agent_name: String,
    pub tier: ExperienceTier,
    pub opportunities_30_days: u32,
    pub opportunities_90_days: u32,
    pub recommendations_30_days: u32,
    pub fairness_score: f64,
    pub status: FairnessStatus,
}

/// Roster-level aggregates for the fairness report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSummary {
    pub total_active_agents: usize,
    pub agents_below_minimum: usize,
    pub agents_above_maximum: usize,
    pub tier_distribution: TierDistribution,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TierDistribution {
    pub junior: usize,
    pub mid: usize,
    pub senior: usize,
}

/// Fairness breakdown for the whole active roster, most deserving first
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FairnessReport {
    pub report_date: DateTime<Utc>,
    pub agents: Vec<AgentFairnessEntry>,
    pub summary: RosterSummary,
}

/// Pure fairness formula: higher means more deserving of the next
/// opportunity.
///
/// Base 0.5, plus 0.15 per opportunity below the tier minimum, minus
/// 0.10 per opportunity above the tier maximum, plus 0.10 when the agent
/// was recommended fewer than five times in 30 days. Agents idle for
/// more than two weeks gain up to 0.20; agents who never hosted gain a
/// flat 0.30. Clamped to [0,1].
pub fn compute_fairness_score(
    limits: TierLimits,
    counts: &OpportunityCounts,
    last_hosted: Option<DateTime<Utc>>,
    reference: DateTime<Utc>,
) -> f64 {
    let mut score = 0.5;

    if counts.hosted_30_days < limits.min {
        let deficit = limits.min - counts.hosted_30_days;
        score += f64::from(deficit) * 0.15;
    }
    if counts.hosted_30_days > limits.max {
        let excess = counts.hosted_30_days - limits.max;
        score -= f64::from(excess) * 0.10;
    }

    if counts.recommended_30_days < 5 {
        score += 0.10;
    }

    match last_hosted {
        Some(last) => {
            let days_since_last = (reference - last).num_days();
            if days_since_last > 14 {
                score += (days_since_last as f64 * 0.01).min(0.20);
            }
        }
        None => {
            // Never hosted: strong cold-start boost
            score += 0.30;
        }
    }

    clamp01(score)
}

/// Re-weights raw model scores so opportunities rotate across the roster
pub struct FairnessAdjuster {
    history: Arc<dyn HistoryProvider>,
    policy: FairnessPolicy,
}

impl FairnessAdjuster {
    pub fn new(history: Arc<dyn HistoryProvider>, policy: FairnessPolicy) -> Self {
        Self { history, policy }
    }

    pub fn policy(&self) -> &FairnessPolicy {
        &self.policy
    }

    /// Opportunity counts for one agent, windows ending at `reference`
    pub async fn opportunity_counts(
        &self,
        agent_id: i64,
        reference: DateTime<Utc>,
    ) -> Result<OpportunityCounts, HistoryError> {
        let thirty_days_ago = reference - Duration::days(30);
        let ninety_days_ago = reference - Duration::days(90);

        let hosted_30 = self
            .history
            .fetch_open_houses(agent_id, thirty_days_ago, reference)
            .await?
            .len() as u32;
        let hosted_90 = self
            .history
            .fetch_open_houses(agent_id, ninety_days_ago, reference)
            .await?
            .len() as u32;
        let recommended_30 = self
            .history
            .count_recommendations(agent_id, thirty_days_ago, reference)
            .await? as u32;

        Ok(OpportunityCounts {
            hosted_30_days: hosted_30,
            hosted_90_days: hosted_90,
            recommended_30_days: recommended_30,
        })
    }

    /// Fairness score for one agent at `reference`
    pub async fn fairness_score(
        &self,
        agent_id: i64,
        tier: ExperienceTier,
        reference: DateTime<Utc>,
    ) -> Result<f64, HistoryError> {
        let counts = self.opportunity_counts(agent_id, reference).await?;
        let last_hosted = self.history.fetch_last_hosted(agent_id).await?;
        Ok(compute_fairness_score(
            self.policy.limits(tier),
            &counts,
            last_hosted,
            reference,
        ))
    }

    /// Blend fairness into raw scores and re-sort descending.
    ///
    /// Candidates whose roster record disappeared since scoring are
    /// dropped rather than scored blind.
    pub async fn apply(
        &self,
        scores: Vec<RankedScore>,
        reference: DateTime<Utc>,
    ) -> Result<Vec<RankedScore>, HistoryError> {
        let mut adjusted_scores = Vec::with_capacity(scores.len());

        for mut candidate in scores {
            let agent = match self.history.fetch_agent(candidate.agent_id).await? {
                Some(agent) => agent,
                None => {
                    tracing::warn!(
                        agent_id = candidate.agent_id,
                        "Dropping scored candidate no longer on the roster"
                    );
                    continue;
                }
            };

            let tier = agent.tier();
            let limits = self.policy.limits(tier);
            let counts = self.opportunity_counts(agent.id, reference).await?;
            let last_hosted = self.history.fetch_last_hosted(agent.id).await?;
            let fairness = compute_fairness_score(limits, &counts, last_hosted, reference);

            let mut flags = Vec::new();
            if counts.hosted_30_days < limits.min {
                flags.push(FairnessFlag::BelowMinimumOpportunities);
            }
            if counts.recommended_30_days < 5 {
                flags.push(FairnessFlag::FewRecentRecommendations);
            }

            candidate.fairness_score = Some(fairness);
            candidate.score = self.policy.model_weight * candidate.raw_score
                + self.policy.fairness_weight * fairness;
            candidate.tier = tier;
            candidate.reasoning.fairness = Some(FairnessNote {
                tier,
                opportunities_30_days: counts.hosted_30_days,
                fairness_score: fairness,
                flags,
            });

            adjusted_scores.push(candidate);
        }

        adjusted_scores.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(adjusted_scores)
    }

    /// Fairness breakdown for every active agent, most deserving first
    pub async fn report(&self, reference: DateTime<Utc>) -> Result<FairnessReport, HistoryError> {
        let agents = self.history.fetch_active_agents().await?;

        let mut entries = Vec::with_capacity(agents.len());
        let mut summary = RosterSummary {
            total_active_agents: agents.len(),
            agents_below_minimum: 0,
            agents_above_maximum: 0,
            tier_distribution: TierDistribution::default(),
        };

        for agent in agents {
            let tier = agent.tier();
            let limits = self.policy.limits(tier);
            let counts = self.opportunity_counts(agent.id, reference).await?;
            let last_hosted = self.history.fetch_last_hosted(agent.id).await?;
            let fairness = compute_fairness_score(limits, &counts, last_hosted, reference);

            let status = if counts.hosted_30_days < limits.min {
                summary.agents_below_minimum += 1;
                FairnessStatus::BelowMinimum
            } else if counts.hosted_30_days > limits.max {
                summary.agents_above_maximum += 1;
                FairnessStatus::AboveMaximum
            } else {
                FairnessStatus::Balanced
            };

            match tier {
                ExperienceTier::Junior => summary.tier_distribution.junior += 1,
                ExperienceTier::Mid => summary.tier_distribution.mid += 1,
                ExperienceTier::Senior => summary.tier_distribution.senior += 1,
            }

            entries.push(AgentFairnessEntry {
                agent_id: agent.id,
                agent_name: agent.name,
                tier,
                opportunities_30_days: counts.hosted_30_days,
                opportunities_90_days: counts.hosted_90_days,
                recommendations_30_days: counts.recommended_30_days,
                fairness_score: fairness,
                status,
            });
        }

        entries.sort_by(|a, b| {
            b.fairness_score
                .partial_cmp(&a.fairness_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(FairnessReport {
            report_date: reference,
            agents: entries,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Agent, OpenHouse, OpenHouseStatus, Reasoning};
    use crate::services::InMemoryHistory;
    use chrono::TimeZone;

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn counts(hosted_30: u32, hosted_90: u32, recommended_30: u32) -> OpportunityCounts {
        OpportunityCounts {
            hosted_30_days: hosted_30,
            hosted_90_days: hosted_90,
            recommended_30_days: recommended_30,
        }
    }

    fn junior_limits() -> TierLimits {
        FairnessPolicy::default().junior
    }

    #[test]
    fn test_never_hosted_junior_maxes_out() {
        // 0.5 + 2×0.15 deficit + 0.1 few-recs + 0.3 never-hosted = 1.2 → 1.0
        let score = compute_fairness_score(junior_limits(), &counts(0, 0, 0), None, reference());
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_above_maximum_penalty() {
        let senior = FairnessPolicy::default().senior;
        let last = reference() - Duration::days(3);
        // 0.5 − 4×0.10 excess, no few-recs boost, no recency boost
        let score =
            compute_fairness_score(senior, &counts(20, 30, 10), Some(last), reference());
        assert!((score - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_recency_boost_capped_at_twenty_percent() {
        let senior = FairnessPolicy::default().senior;
        let base = counts(5, 10, 10);

        let sixteen_days = reference() - Duration::days(16);
        let score =
            compute_fairness_score(senior, &base, Some(sixteen_days), reference());
        assert!((score - 0.66).abs() < 1e-9);

        let ninety_days = reference() - Duration::days(90);
        let capped = compute_fairness_score(senior, &base, Some(ninety_days), reference());
        assert!((capped - 0.7).abs() < 1e-9);

        // Two weeks exactly is not yet idle
        let fourteen_days = reference() - Duration::days(14);
        let none = compute_fairness_score(senior, &base, Some(fourteen_days), reference());
        assert!((none - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_fairness_score_clamped_low() {
        let senior = FairnessPolicy::default().senior;
        let last = reference() - Duration::days(1);
        let score =
            compute_fairness_score(senior, &counts(40, 60, 20), Some(last), reference());
        assert_eq!(score, 0.0);
    }

    fn roster_agent(id: i64, experience_years: u32) -> Agent {
        Agent {
            id,
            name: format!("Agent {}", id),
            email: format!("agent{}@example.com", id),
            experience_years,
            areas_of_expertise: vec![],
            buyer_price_ranges: vec![],
            is_active: true,
        }
    }

    fn hosted(id: i64, agent_id: i64, days_back: i64) -> OpenHouse {
        let start = reference() - Duration::days(days_back);
        OpenHouse {
            id,
            listing_id: 1,
            host_agent_id: Some(agent_id),
            start_time: start,
            end_time: start + Duration::hours(2),
            status: OpenHouseStatus::Completed,
            attendee_count: 0,
            leads_generated: 0,
            follow_ups_scheduled: 0,
            offers_received: 0,
        }
    }

    fn ranked(agent_id: i64, raw: f64) -> RankedScore {
        RankedScore {
            agent_id,
            agent_name: format!("Agent {}", agent_id),
            tier: ExperienceTier::Junior,
            raw_score: raw,
            fairness_score: None,
            score: raw,
            confidence: (raw + 0.1).min(1.0),
            reasoning: Reasoning {
                key_factors: vec![],
                experience_years: 0,
                conversion_rate: 0.0,
                area_familiarity: false,
                recent_activity: 0,
                fairness: None,
            },
        }
    }

    #[tokio::test]
    async fn test_apply_blends_and_resorts() {
        let history = Arc::new(InMemoryHistory::new());
        // Senior workhorse: strong model score, hosting constantly.
        // 27 events in 30 days → 11 over the senior max → fairness clamps to 0,
        // blend 0.7×0.9 = 0.63.
        history.insert_agent(roster_agent(1, 10));
        for i in 0..27 {
            history.insert_open_house(hosted(100 + i, 1, (i % 28) + 1));
        }
        // Fresh junior: weaker model score, never hosted
        history.insert_agent(roster_agent(2, 0));

        let adjuster =
            FairnessAdjuster::new(history.clone(), FairnessPolicy::default());
        let adjusted = adjuster
            .apply(vec![ranked(1, 0.9), ranked(2, 0.6)], reference())
            .await
            .unwrap();

        assert_eq!(adjusted.len(), 2);
        // Junior: 0.7×0.6 + 0.3×1.0 = 0.72; senior is pulled below that
        assert_eq!(adjusted[0].agent_id, 2);
        assert!((adjusted[0].score - 0.72).abs() < 1e-9);
        assert_eq!(adjusted[0].fairness_score, Some(1.0));

        let note = adjusted[0].reasoning.fairness.as_ref().unwrap();
        assert_eq!(note.tier, ExperienceTier::Junior);
        assert_eq!(note.opportunities_30_days, 0);
        assert!(note.flags.contains(&FairnessFlag::BelowMinimumOpportunities));
        assert!(note.flags.contains(&FairnessFlag::FewRecentRecommendations));

        // Raw scores preserved alongside the blend
        assert!((adjusted[1].raw_score - 0.9).abs() < 1e-9);
        assert!(adjusted[1].score < adjusted[0].score);
    }

    #[tokio::test]
    async fn test_apply_drops_unknown_agents() {
        let history = Arc::new(InMemoryHistory::new());
        history.insert_agent(roster_agent(1, 3));

        let adjuster =
            FairnessAdjuster::new(history.clone(), FairnessPolicy::default());
        let adjusted = adjuster
            .apply(vec![ranked(1, 0.5), ranked(99, 0.8)], reference())
            .await
            .unwrap();

        assert_eq!(adjusted.len(), 1);
        assert_eq!(adjusted[0].agent_id, 1);
    }

    #[tokio::test]
    async fn test_report_statuses_and_distribution() {
        let history = Arc::new(InMemoryHistory::new());
        history.insert_agent(roster_agent(1, 0)); // junior, never hosted
        history.insert_agent(roster_agent(2, 3)); // mid, balanced
        history.insert_agent(roster_agent(3, 8)); // senior, above max

        for i in 0..4 {
            history.insert_open_house(hosted(200 + i, 2, i + 1));
        }
        for i in 0..18 {
            history.insert_open_house(hosted(300 + i, 3, (i % 28) + 1));
        }

        let adjuster =
            FairnessAdjuster::new(history.clone(), FairnessPolicy::default());
        let report = adjuster.report(reference()).await.unwrap();

        assert_eq!(report.summary.total_active_agents, 3);
        assert_eq!(report.summary.agents_below_minimum, 1);
        assert_eq!(report.summary.agents_above_maximum, 1);
        assert_eq!(report.summary.tier_distribution.junior, 1);
        assert_eq!(report.summary.tier_distribution.mid, 1);
        assert_eq!(report.summary.tier_distribution.senior, 1);

        // Most deserving first: the never-hosted junior
        assert_eq!(report.agents[0].agent_id, 1);
        assert_eq!(report.agents[0].status, FairnessStatus::BelowMinimum);
        assert_eq!(report.agents[0].fairness_score, 1.0);
        assert_eq!(report.agents[2].status, FairnessStatus::AboveMaximum);
        assert!(report.agents[0].opportunities_90_days == 0);
    }
}
