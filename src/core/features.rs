use chrono::{DateTime, Duration, Utc};

use crate::models::{Agent, Listing};
use crate::services::{HistoryError, HistoryProvider};

/// Canonical feature column order.
///
/// Trained artifacts record their own copy of this list; scoring always
/// assembles vectors in the order the artifact was fitted with.
pub const FEATURE_NAMES: [&str; 12] = [
    "experience_years",
    "is_active",
    "total_open_houses_hosted",
    "avg_attendees_per_event",
    "conversion_rate",
    "success_rate",
    "average_feedback_score",
    "area_familiarity",
    "price_range_match",
    "recent_activity",
    "recent_hosting_frequency",
    "experience_tier",
];

/// Flat numeric features for one (agent, open house) pairing.
///
/// Ephemeral: computed on demand, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub experience_years: f64,
    pub is_active: f64,
    pub total_open_houses_hosted: f64,
    pub avg_attendees_per_event: f64,
    pub conversion_rate: f64,
    pub success_rate: f64,
    pub average_feedback_score: f64,
    pub area_familiarity: f64,
    pub price_range_match: f64,
    pub recent_activity: f64,
    pub recent_hosting_frequency: f64,
    pub experience_tier: f64,
}

impl FeatureRecord {
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "experience_years" => Some(self.experience_years),
            "is_active" => Some(self.is_active),
            "total_open_houses_hosted" => Some(self.total_open_houses_hosted),
            "avg_attendees_per_event" => Some(self.avg_attendees_per_event),
            "conversion_rate" => Some(self.conversion_rate),
            "success_rate" => Some(self.success_rate),
            "average_feedback_score" => Some(self.average_feedback_score),
            "area_familiarity" => Some(self.area_familiarity),
            "price_range_match" => Some(self.price_range_match),
            "recent_activity" => Some(self.recent_activity),
            "recent_hosting_frequency" => Some(self.recent_hosting_frequency),
            "experience_tier" => Some(self.experience_tier),
            _ => None,
        }
    }

    /// Assemble a vector in the given column order.
    ///
    /// Unknown column names read as 0.0 so an artifact fitted against an
    /// older feature list still gets a full-length input.
    pub fn vector(&self, names: &[String]) -> Vec<f64> {
        names
            .iter()
            .map(|name| self.get(name).unwrap_or(0.0))
            .collect()
    }

    /// Vector in [`FEATURE_NAMES`] order
    pub fn canonical_vector(&self) -> Vec<f64> {
        FEATURE_NAMES
            .iter()
            .map(|name| self.get(name).unwrap_or(0.0))
            .collect()
    }
}

/// Extract scoring features for one agent against one listing.
///
/// All trailing windows are anchored at `target` (the open-house start
/// time), not wall-clock now, so extraction replays identically for
/// historical events. Missing history never fails extraction: documented
/// neutral defaults are substituted instead.
pub async fn extract_features(
    agent: &Agent,
    listing: &Listing,
    target: DateTime<Utc>,
    history: &dyn HistoryProvider,
) -> Result<FeatureRecord, HistoryError> {
    let year_ago = target - Duration::days(365);
    let month_ago = target - Duration::days(30);

    let performance = history.fetch_performance(agent.id, year_ago).await?;

    let (total_hosted, avg_attendees, conversion_rate, success_rate, avg_feedback) =
        if performance.is_empty() {
            // New agent: neutral feedback, zero throughput
            (0.0, 0.0, 0.0, 0.0, 3.0)
        } else {
            let total_hosted: u64 = performance
                .iter()
                .map(|p| u64::from(p.open_houses_hosted))
                .sum();
            let total_attendees: u64 = performance
                .iter()
                .map(|p| u64::from(p.total_attendees))
                .sum();
            let total_leads: u64 = performance.iter().map(|p| u64::from(p.total_leads)).sum();
            let total_offers: u64 = performance.iter().map(|p| u64::from(p.total_offers)).sum();

            let positive_feedback: Vec<f64> = performance
                .iter()
                .map(|p| p.average_feedback_score)
                .filter(|score| *score > 0.0)
                .collect();
            let avg_feedback = if positive_feedback.is_empty() {
                3.0
            } else {
                positive_feedback.iter().sum::<f64>() / positive_feedback.len() as f64
            };

            (
                total_hosted as f64,
                total_attendees as f64 / total_hosted.max(1) as f64,
                total_leads as f64 / total_attendees.max(1) as f64,
                total_offers as f64 / total_leads.max(1) as f64,
                avg_feedback,
            )
        };

    let area_familiarity = if agent.areas_of_expertise.contains(&listing.zip_code) {
        1.0
    } else {
        0.0
    };

    let price_range_match = if agent
        .buyer_price_ranges
        .iter()
        .any(|range| range.contains(listing.price))
    {
        1.0
    } else {
        0.0
    };

    let recent = history.fetch_open_houses(agent.id, month_ago, target).await?;
    let recent_activity = recent.iter().filter(|oh| oh.is_completed()).count() as f64;
    let recent_hosting_frequency = recent.len() as f64;

    Ok(FeatureRecord {
        experience_years: f64::from(agent.experience_years),
        is_active: if agent.is_active { 1.0 } else { 0.0 },
        total_open_houses_hosted: total_hosted,
        avg_attendees_per_event: avg_attendees,
        conversion_rate,
        success_rate,
        average_feedback_score: avg_feedback,
        area_familiarity,
        price_range_match,
        recent_activity,
        recent_hosting_frequency,
        experience_tier: agent.tier().as_feature(),
    })
}
