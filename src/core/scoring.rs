use crate::core::features::FeatureRecord;
use crate::ml::TrainedScorer;
use crate::models::{Reasoning, ScoreFactor};

pub(crate) fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Deterministic cold-start score used whenever no trained model is
/// published or training degraded for lack of data.
///
/// Weighted sum of experience, funnel ratios, feedback and listing fit,
/// with the recent-activity bonus capped at 0.1.
pub fn rule_based_score(features: &FeatureRecord) -> f64 {
    let mut score = 0.5;

    score += features.experience_years * 0.02;

    score += features.conversion_rate * 0.3;
    score += features.success_rate * 0.2;
    score += (features.average_feedback_score - 3.0) * 0.1;

    score += features.area_familiarity * 0.15;
    score += features.price_range_match * 0.1;

    score += (features.recent_activity * 0.05).min(0.1);

    clamp01(score)
}

/// Raw suitability score in [0,1]: trained regressor when one is
/// published, rule-based formula otherwise.
pub fn model_score(features: &FeatureRecord, model: Option<&TrainedScorer>) -> f64 {
    match model {
        Some(scorer) => clamp01(scorer.predict(features)),
        None => rule_based_score(features),
    }
}

/// Dampen agents already hosting heavily and lift new juniors.
///
/// The `> 5` arm is shadowed by the `> 3` check, so a single ×0.8
/// penalty applies to any frequency above 3; branch order is part of
/// the scoring contract and must not be reordered.
pub fn apply_rotation_adjustments(score: f64, features: &FeatureRecord) -> f64 {
    let mut adjusted = score;

    if features.recent_hosting_frequency > 3.0 {
        adjusted *= 0.8;
    } else if features.recent_hosting_frequency > 5.0 {
        adjusted *= 0.6;
    }

    if features.experience_tier == 1.0 && features.total_open_houses_hosted < 5.0 {
        adjusted += 0.1;
    }

    clamp01(adjusted)
}

/// Placeholder confidence heuristic; carries no calibration guarantee.
pub fn confidence(score: f64) -> f64 {
    (score + 0.1).min(1.0)
}

/// Build the structured explanation for a scored candidate.
///
/// At most the three strongest factors are kept, in the fixed priority
/// order below.
pub fn build_reasoning(features: &FeatureRecord) -> Reasoning {
    let mut factors = Vec::new();

    if features.conversion_rate > 0.1 {
        factors.push(ScoreFactor::StrongConversion {
            rate: features.conversion_rate,
        });
    }
    if features.area_familiarity > 0.0 {
        factors.push(ScoreFactor::AreaFamiliarity);
    }
    if features.price_range_match > 0.0 {
        factors.push(ScoreFactor::PriceRangeMatch);
    }
    if features.average_feedback_score > 4.0 {
        factors.push(ScoreFactor::HighFeedback {
            score: features.average_feedback_score,
        });
    }
    if features.experience_years > 5.0 {
        factors.push(ScoreFactor::Experienced {
            years: features.experience_years as u32,
        });
    }
    if features.recent_hosting_frequency > 3.0 {
        factors.push(ScoreFactor::HighRecentLoad);
    }

    factors.truncate(3);

    Reasoning {
        key_factors: factors,
        experience_years: features.experience_years as u32,
        conversion_rate: features.conversion_rate,
        area_familiarity: features.area_familiarity > 0.0,
        recent_activity: features.recent_activity as u32,
        fairness: None,
    }
}
