use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::core::features::FeatureRecord;
use crate::ml::regressor::{LinearRegressor, StandardScaler};

const ARTIFACT_PREFIX: &str = "agent_scorer_";
const ARTIFACT_SCHEMA: u32 = 1;

/// Errors raised while persisting or loading model artifacts
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid artifact: {0}")]
    Invalid(String),
}

/// Versioned model bundle persisted as plain structured data.
///
/// Regressor weights, fitted scaler parameters and the feature column
/// order travel together so a load can never pair weights from one
/// training run with the scaler of another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub schema: u32,
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
    pub regressor: LinearRegressor,
}

impl ModelArtifact {
    pub fn new(
        version: String,
        trained_at: DateTime<Utc>,
        feature_names: Vec<String>,
        scaler: StandardScaler,
        regressor: LinearRegressor,
    ) -> Self {
        Self {
            schema: ARTIFACT_SCHEMA,
            version,
            trained_at,
            feature_names,
            scaler,
            regressor,
        }
    }

    /// Structural validation applied on every load
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.schema != ARTIFACT_SCHEMA {
            return Err(ArtifactError::Invalid(format!(
                "unsupported schema {}",
                self.schema
            )));
        }
        if self.feature_names.is_empty() {
            return Err(ArtifactError::Invalid("empty feature list".to_string()));
        }

        let dims = self.feature_names.len();
        if self.scaler.mean.len() != dims
            || self.scaler.std.len() != dims
            || self.regressor.weights.len() != dims
        {
            return Err(ArtifactError::Invalid(format!(
                "dimension mismatch: {} features, {} scaler means, {} scaler stds, {} weights",
                dims,
                self.scaler.mean.len(),
                self.scaler.std.len(),
                self.regressor.weights.len()
            )));
        }

        Ok(())
    }
}

/// Directory-backed store for model artifacts, one JSON file per version
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, ArtifactError> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    fn path_for(&self, version: &str) -> PathBuf {
        self.dir.join(format!("{}{}.json", ARTIFACT_PREFIX, version))
    }

    /// Persist an artifact under its version key.
    ///
    /// Writes to a temp file first and renames into place so a crash
    /// mid-write can never leave a truncated artifact behind.
    pub fn save(&self, artifact: &ModelArtifact) -> Result<PathBuf, ArtifactError> {
        artifact.validate()?;

        let path = self.path_for(&artifact.version);
        let temp_path = path.with_extension("tmp");

        let mut file = File::create(&temp_path)?;
        file.write_all(serde_json::to_string_pretty(artifact)?.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, &path)?;

        tracing::info!(
            version = %artifact.version,
            path = %path.display(),
            "Model artifact saved"
        );

        Ok(path)
    }

    /// Load one version; model, scaler and feature order come back as a
    /// single validated unit.
    pub fn load(&self, version: &str) -> Result<ModelArtifact, ArtifactError> {
        let path = self.path_for(version);
        if !path.exists() {
            return Err(ArtifactError::NotFound(version.to_string()));
        }

        let contents = fs::read_to_string(&path)?;
        let artifact: ModelArtifact = serde_json::from_str(&contents)?;

        if artifact.version != version {
            return Err(ArtifactError::Invalid(format!(
                "version mismatch: file for {} contains {}",
                version, artifact.version
            )));
        }
        artifact.validate()?;

        Ok(artifact)
    }

    /// All versions present on disk, unordered
    pub fn list_versions(&self) -> Result<Vec<String>, ArtifactError> {
        let mut versions = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name
                .strip_prefix(ARTIFACT_PREFIX)
                .and_then(|rest| rest.strip_suffix(".json"))
            {
                versions.push(stem.to_string());
            }
        }
        Ok(versions)
    }

    /// Most recently trained artifact on disk, if any valid one exists.
    ///
    /// Unreadable versions are skipped with a warning; a directory of
    /// corrupt files behaves like an empty one.
    pub fn load_latest(&self) -> Result<Option<ModelArtifact>, ArtifactError> {
        let mut latest: Option<ModelArtifact> = None;
        for version in self.list_versions()? {
            match self.load(&version) {
                Ok(artifact) => {
                    let newer = latest
                        .as_ref()
                        .map(|current| artifact.trained_at > current.trained_at)
                        .unwrap_or(true);
                    if newer {
                        latest = Some(artifact);
                    }
                }
                Err(error) => {
                    tracing::warn!(version = %version, error = %error, "Skipping unreadable artifact");
                }
            }
        }
        Ok(latest)
    }
}

/// An artifact hydrated for scoring
#[derive(Debug, Clone)]
pub struct TrainedScorer {
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub feature_names: Vec<String>,
    scaler: StandardScaler,
    regressor: LinearRegressor,
}

impl TrainedScorer {
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, ArtifactError> {
        artifact.validate()?;
        Ok(Self {
            version: artifact.version,
            trained_at: artifact.trained_at,
            feature_names: artifact.feature_names,
            scaler: artifact.scaler,
            regressor: artifact.regressor,
        })
    }

    /// Raw regression output for one feature record.
    ///
    /// The vector is assembled in the column order recorded at training
    /// time, then standardized with the scaler fitted alongside the
    /// weights. May overshoot [0,1]; callers clamp.
    pub fn predict(&self, features: &FeatureRecord) -> f64 {
        let row = features.vector(&self.feature_names);
        self.regressor.predict(&self.scaler.transform_row(&row))
    }
}

/// Shared slot holding the currently-published model.
///
/// Scoring reads clone the inner `Arc`, so an in-flight call keeps the
/// artifact it started with even if training publishes a replacement
/// mid-computation. Publication is a single pointer swap: readers see
/// the fully-old or fully-new bundle, never a mix.
#[derive(Debug, Clone, Default)]
pub struct ModelHandle {
    current: Arc<RwLock<Option<Arc<TrainedScorer>>>>,
}

impl ModelHandle {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<TrainedScorer>> {
        self.current.read().expect("model lock poisoned").clone()
    }

    pub fn publish(&self, scorer: TrainedScorer) {
        let mut slot = self.current.write().expect("model lock poisoned");
        *slot = Some(Arc::new(scorer));
    }

    pub fn clear(&self) {
        let mut slot = self.current.write().expect("model lock poisoned");
        *slot = None;
    }

    pub fn version(&self) -> Option<String> {
        self.current().map(|scorer| scorer.version.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_artifact(version: &str, trained_at: DateTime<Utc>) -> ModelArtifact {
        ModelArtifact::new(
            version.to_string(),
            trained_at,
            vec!["a".to_string(), "b".to_string()],
            StandardScaler {
                mean: vec![1.0, 2.0],
                std: vec![0.5, 1.5],
            },
            LinearRegressor {
                weights: vec![0.3, -0.1],
                bias: 0.4,
            },
        )
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let trained_at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

        let artifact = sample_artifact("v1", trained_at);
        store.save(&artifact).unwrap();
        let loaded = store.load("v1").unwrap();

        assert_eq!(loaded.version, "v1");
        assert_eq!(loaded.scaler, artifact.scaler);
        assert_eq!(loaded.regressor, artifact.regressor);
        assert_eq!(loaded.feature_names, artifact.feature_names);
    }

    #[test]
    fn test_load_missing_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        assert!(matches!(
            store.load("nope"),
            Err(ArtifactError::NotFound(_))
        ));
    }

    #[test]
    fn test_validate_rejects_dimension_mismatch() {
        let trained_at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut artifact = sample_artifact("v1", trained_at);
        artifact.regressor.weights.pop();

        assert!(matches!(
            artifact.validate(),
            Err(ArtifactError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_latest_picks_newest_training_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();

        let older = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        store.save(&sample_artifact("v1", older)).unwrap();
        store.save(&sample_artifact("v2", newer)).unwrap();

        let latest = store.load_latest().unwrap().unwrap();
        assert_eq!(latest.version, "v2");

        let mut versions = store.list_versions().unwrap();
        versions.sort();
        assert_eq!(versions, vec!["v1", "v2"]);
    }

    #[test]
    fn test_model_handle_swap_and_clear() {
        let handle = ModelHandle::empty();
        assert!(handle.current().is_none());

        let trained_at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let scorer = TrainedScorer::from_artifact(sample_artifact("v1", trained_at)).unwrap();
        handle.publish(scorer);
        assert_eq!(handle.version().as_deref(), Some("v1"));

        // An in-flight reader keeps its artifact across a publish
        let held = handle.current().unwrap();
        let replacement =
            TrainedScorer::from_artifact(sample_artifact("v2", trained_at)).unwrap();
        handle.publish(replacement);
        assert_eq!(held.version, "v1");
        assert_eq!(handle.version().as_deref(), Some("v2"));

        handle.clear();
        assert!(handle.current().is_none());
    }
}
