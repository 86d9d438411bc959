use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Experience bracket used for fairness thresholds and slate diversity.
///
/// Derived from `experience_years`, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceTier {
    Junior,
    Mid,
    Senior,
}

impl ExperienceTier {
    pub fn from_years(experience_years: u32) -> Self {
        if experience_years < 2 {
            ExperienceTier::Junior
        } else if experience_years < 5 {
            ExperienceTier::Mid
        } else {
            ExperienceTier::Senior
        }
    }

    /// Numeric encoding used as a model feature: junior=1, mid=2, senior=3.
    pub fn as_feature(self) -> f64 {
        match self {
            ExperienceTier::Junior => 1.0,
            ExperienceTier::Mid => 2.0,
            ExperienceTier::Senior => 3.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExperienceTier::Junior => "junior",
            ExperienceTier::Mid => "mid",
            ExperienceTier::Senior => "senior",
        }
    }
}

impl std::fmt::Display for ExperienceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A historical buyer price interval an agent has worked in
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub fn contains(&self, price: f64) -> bool {
        self.min <= price && price <= self.max
    }
}

/// Real-estate agent roster record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub experience_years: u32,
    #[serde(default)]
    pub areas_of_expertise: Vec<String>,
    #[serde(default)]
    pub buyer_price_ranges: Vec<PriceRange>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Agent {
    pub fn tier(&self) -> ExperienceTier {
        ExperienceTier::from_years(self.experience_years)
    }
}

fn default_true() -> bool {
    true
}

/// Property listing an open house is scheduled for
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: i64,
    pub address: String,
    pub zip_code: String,
    pub price: f64,
}

/// Lifecycle of a scheduled open house
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenHouseStatus {
    Scheduled,
    Completed,
    Cancelled,
}

/// A scheduled open house event, with outcome counters once completed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHouse {
    pub id: i64,
    pub listing_id: i64,
    pub host_agent_id: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: OpenHouseStatus,
    #[serde(default)]
    pub attendee_count: u32,
    #[serde(default)]
    pub leads_generated: u32,
    #[serde(default)]
    pub follow_ups_scheduled: u32,
    #[serde(default)]
    pub offers_received: u32,
}

impl OpenHouse {
    pub fn is_completed(&self) -> bool {
        self.status == OpenHouseStatus::Completed
    }
}

/// Rolled-up performance aggregate over a reporting window.
///
/// Produced by an external aggregation process; the engine only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPerformance {
    pub agent_id: i64,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub open_houses_hosted: u32,
    pub total_attendees: u32,
    pub total_leads: u32,
    pub total_offers: u32,
    pub average_feedback_score: f64,
}

/// A single factor contributing to a recommendation's explanation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreFactor {
    StrongConversion { rate: f64 },
    AreaFamiliarity,
    PriceRangeMatch,
    HighFeedback { score: f64 },
    Experienced { years: u32 },
    HighRecentLoad,
}

/// Qualitative fairness observations attached during adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FairnessFlag {
    BelowMinimumOpportunities,
    FewRecentRecommendations,
}

/// Fairness context recorded alongside a blended score
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FairnessNote {
    pub tier: ExperienceTier,
    pub opportunities_30_days: u32,
    pub fairness_score: f64,
    #[serde(default)]
    pub flags: Vec<FairnessFlag>,
}

/// Machine-consumable explanation of why an agent was recommended
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reasoning {
    /// At most the three strongest factors, strongest first
    pub key_factors: Vec<ScoreFactor>,
    pub experience_years: u32,
    pub conversion_rate: f64,
    pub area_familiarity: bool,
    pub recent_activity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fairness: Option<FairnessNote>,
}

/// A scored candidate as it moves through the ranking pipeline.
///
/// `score` is the current ranking key: the raw model score after
/// `score_agents`, the 70/30 blend after `apply_fairness_adjustments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedScore {
    pub agent_id: i64,
    pub agent_name: String,
    pub tier: ExperienceTier,
    pub raw_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fairness_score: Option<f64>,
    pub score: f64,
    pub confidence: f64,
    pub reasoning: Reasoning,
}

/// Final recommendation record, ready for the caller to persist.
///
/// Created in a batch of at most three per open house; `rank` values are
/// unique and contiguous starting at 1. `was_selected` is the only field
/// mutated after creation, set exactly once when a host is assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub open_house_id: i64,
    pub agent_id: i64,
    pub raw_score: f64,
    pub fairness_score: f64,
    pub adjusted_score: f64,
    pub rank: u8,
    pub reasoning: Reasoning,
    #[serde(default)]
    pub was_selected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(ExperienceTier::from_years(0), ExperienceTier::Junior);
        assert_eq!(ExperienceTier::from_years(1), ExperienceTier::Junior);
        assert_eq!(ExperienceTier::from_years(2), ExperienceTier::Mid);
        assert_eq!(ExperienceTier::from_years(4), ExperienceTier::Mid);
        assert_eq!(ExperienceTier::from_years(5), ExperienceTier::Senior);
        assert_eq!(ExperienceTier::from_years(20), ExperienceTier::Senior);
    }

    #[test]
    fn test_tier_feature_encoding() {
        assert_eq!(ExperienceTier::Junior.as_feature(), 1.0);
        assert_eq!(ExperienceTier::Mid.as_feature(), 2.0);
        assert_eq!(ExperienceTier::Senior.as_feature(), 3.0);
    }

    #[test]
    fn test_price_range_contains() {
        let range = PriceRange {
            min: 300_000.0,
            max: 500_000.0,
        };
        assert!(range.contains(300_000.0));
        assert!(range.contains(450_000.0));
        assert!(range.contains(500_000.0));
        assert!(!range.contains(299_999.0));
        assert!(!range.contains(500_001.0));
    }

    #[test]
    fn test_reasoning_serializes_tagged_factors() {
        let reasoning = Reasoning {
            key_factors: vec![
                ScoreFactor::StrongConversion { rate: 0.25 },
                ScoreFactor::AreaFamiliarity,
            ],
            experience_years: 6,
            conversion_rate: 0.25,
            area_familiarity: true,
            recent_activity: 2,
            fairness: None,
        };

        let json = serde_json::to_value(&reasoning).unwrap();
        assert_eq!(json["keyFactors"][0]["kind"], "strong_conversion");
        assert_eq!(json["keyFactors"][1]["kind"], "area_familiarity");
        assert!(json.get("fairness").is_none());
    }
}
