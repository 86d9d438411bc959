// Core algorithm exports
pub mod diversity;
pub mod engine;
pub mod fairness;
pub mod features;
pub mod scoring;

pub use diversity::{ensure_diversity, SLATE_SIZE};
pub use engine::RecommendationEngine;
pub use fairness::{
    compute_fairness_score, FairnessAdjuster, FairnessPolicy, FairnessReport, TierLimits,
};
pub use features::{extract_features, FeatureRecord, FEATURE_NAMES};
pub use scoring::{apply_rotation_adjustments, build_reasoning, confidence, rule_based_score};
