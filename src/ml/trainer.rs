use chrono::Utc;
use rand::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::core::features::{extract_features, FEATURE_NAMES};
use crate::ml::artifact::{ArtifactError, ArtifactStore, ModelArtifact, TrainedScorer};
use crate::ml::regressor::{r2_score, FitConfig, LinearRegressor, StandardScaler};
use crate::models::OpenHouse;
use crate::services::{HistoryError, HistoryProvider};

/// Below this many labeled rows, training degrades to rule-based mode
pub const MIN_TRAINING_SAMPLES: usize = 10;

const HOLDOUT_FRACTION: f64 = 0.2;
const SHUFFLE_SEED: u64 = 42;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),
}

/// Which scoring mode a training run left the engine in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    RuleBased,
    Regressor,
}

/// Outcome report for one training run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingSummary {
    pub model_type: ModelType,
    pub training_samples: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_samples: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train_r2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_r2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// A finished training run: the summary plus, in trained mode, the
/// scorer ready to publish. Publication is the caller's decision so a
/// cancelled run can be discarded without touching the live model.
#[derive(Debug)]
pub struct TrainingOutcome {
    pub summary: TrainingSummary,
    pub scorer: Option<TrainedScorer>,
}

/// Label an open house outcome for one recommended agent.
///
/// Agents who were recommended but not selected contribute a zero label;
/// for selected hosts the outcome counters are normalized against fixed
/// saturation points (20 attendees, 5 leads, 3 follow-ups, 1 offer).
pub fn success_score(open_house: &OpenHouse, was_selected: bool) -> f64 {
    if !was_selected {
        return 0.0;
    }

    let attendee_score = (f64::from(open_house.attendee_count) / 20.0).min(1.0);
    let lead_score = (f64::from(open_house.leads_generated) / 5.0).min(1.0);
    let follow_up_score = (f64::from(open_house.follow_ups_scheduled) / 3.0).min(1.0);
    let offer_score = (f64::from(open_house.offers_received) / 1.0).min(1.0);

    (attendee_score * 0.2 + lead_score * 0.3 + follow_up_score * 0.3 + offer_score * 0.2)
        .clamp(0.0, 1.0)
}

/// Builds labeled training sets from completed open houses and fits the
/// suitability regressor.
pub struct ModelTrainer {
    history: Arc<dyn HistoryProvider>,
    store: ArtifactStore,
    fit_config: FitConfig,
}

impl ModelTrainer {
    pub fn new(history: Arc<dyn HistoryProvider>, store: ArtifactStore) -> Self {
        Self {
            history,
            store,
            fit_config: FitConfig::default(),
        }
    }

    /// One labeled row per (completed open house, stored recommendation).
    ///
    /// Features are recomputed as of each open house's start time so the
    /// rows match what scoring saw when the recommendation was made.
    async fn build_training_set(&self) -> Result<(Vec<Vec<f64>>, Vec<f64>), TrainingError> {
        let mut inputs = Vec::new();
        let mut targets = Vec::new();

        for open_house in self.history.fetch_completed_open_houses().await? {
            let listing = match self.history.fetch_listing(open_house.listing_id).await? {
                Some(listing) => listing,
                None => {
                    tracing::warn!(
                        open_house_id = open_house.id,
                        listing_id = open_house.listing_id,
                        "Skipping completed open house with missing listing"
                    );
                    continue;
                }
            };

            for recommendation in self.history.fetch_recommendations(open_house.id).await? {
                let agent = match self.history.fetch_agent(recommendation.agent_id).await? {
                    Some(agent) => agent,
                    None => continue,
                };

                let features = extract_features(
                    &agent,
                    &listing,
                    open_house.start_time,
                    self.history.as_ref(),
                )
                .await?;

                inputs.push(features.canonical_vector());
                targets.push(success_score(&open_house, recommendation.was_selected));
            }
        }

        Ok((inputs, targets))
    }

    /// Run a full training pass.
    ///
    /// Too little data is not an error: the run reports rule-based mode
    /// and leaves any previously-published model alone. In trained mode
    /// the artifact is persisted before the outcome is returned.
    pub async fn train(&self) -> Result<TrainingOutcome, TrainingError> {
        let (inputs, targets) = self.build_training_set().await?;
        let total = inputs.len();

        if total < MIN_TRAINING_SAMPLES {
            tracing::info!(
                samples = total,
                "Too few labeled outcomes; staying in rule-based mode"
            );
            return Ok(TrainingOutcome {
                summary: TrainingSummary {
                    model_type: ModelType::RuleBased,
                    training_samples: total,
                    test_samples: None,
                    train_r2: None,
                    test_r2: None,
                    version: None,
                },
                scorer: None,
            });
        }

        // Reproducible shuffle, then a 20% holdout for evaluation
        let mut indices: Vec<usize> = (0..total).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(SHUFFLE_SEED));

        let test_len = ((total as f64) * HOLDOUT_FRACTION).ceil() as usize;
        let test_len = test_len.max(1);
        let (test_idx, train_idx) = indices.split_at(test_len);

        let train_inputs: Vec<Vec<f64>> = train_idx.iter().map(|&i| inputs[i].clone()).collect();
        let train_targets: Vec<f64> = train_idx.iter().map(|&i| targets[i]).collect();
        let test_inputs: Vec<Vec<f64>> = test_idx.iter().map(|&i| inputs[i].clone()).collect();
        let test_targets: Vec<f64> = test_idx.iter().map(|&i| targets[i]).collect();

        // Scaler is fitted on the training split only
        let scaler = StandardScaler::fit(&train_inputs);
        let train_scaled = scaler.transform(&train_inputs);
        let test_scaled = scaler.transform(&test_inputs);

        let regressor = LinearRegressor::fit(&train_scaled, &train_targets, &self.fit_config);

        let train_predicted: Vec<f64> =
            train_scaled.iter().map(|row| regressor.predict(row)).collect();
        let test_predicted: Vec<f64> =
            test_scaled.iter().map(|row| regressor.predict(row)).collect();
        let train_r2 = r2_score(&train_targets, &train_predicted);
        let test_r2 = r2_score(&test_targets, &test_predicted);

        let trained_at = Utc::now();
        let version = trained_at.format("%Y%m%d%H%M%S").to_string();
        let artifact = ModelArtifact::new(
            version.clone(),
            trained_at,
            FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
            scaler,
            regressor,
        );
        self.store.save(&artifact)?;
        let scorer = TrainedScorer::from_artifact(artifact)?;

        tracing::info!(
            version = %version,
            train_samples = train_idx.len(),
            test_samples = test_idx.len(),
            train_r2,
            test_r2,
            "Suitability model trained"
        );

        Ok(TrainingOutcome {
            summary: TrainingSummary {
                model_type: ModelType::Regressor,
                training_samples: train_idx.len(),
                test_samples: Some(test_idx.len()),
                train_r2: Some(train_r2),
                test_r2: Some(test_r2),
                version: Some(version),
            },
            scorer: Some(scorer),
        })
    }
}
