//! OpenHouse Algo - agent recommendation engine for the OpenHouse
//! scheduling platform.
//!
//! This library scores candidate host agents for open houses, blends in
//! fairness adjustments so opportunities rotate across the roster, and
//! trims the result to a diversity-aware top-3 slate. It also owns the
//! suitability model lifecycle: training, versioned persistence, and
//! atomic publication.

pub mod config;
pub mod core;
pub mod ml;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{
    ensure_diversity, rule_based_score, FairnessPolicy, RecommendationEngine, SLATE_SIZE,
};
pub use crate::ml::{ArtifactStore, ModelHandle, ModelTrainer, TrainingJobManager};
pub use crate::models::{Agent, Listing, OpenHouse, RankedScore, Recommendation};
pub use crate::services::{HistoryProvider, InMemoryHistory, RecommendationStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        // Verify that the library exports work correctly
        let features = crate::core::FeatureRecord {
            experience_years: 0.0,
            is_active: 1.0,
            total_open_houses_hosted: 0.0,
            avg_attendees_per_event: 0.0,
            conversion_rate: 0.0,
            success_rate: 0.0,
            average_feedback_score: 3.0,
            area_familiarity: 0.0,
            price_range_match: 0.0,
            recent_activity: 0.0,
            recent_hosting_frequency: 0.0,
            experience_tier: 1.0,
        };
        assert!((rule_based_score(&features) - 0.5).abs() < 1e-12);
    }
}
