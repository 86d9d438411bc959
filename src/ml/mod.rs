// Model lifecycle exports
pub mod artifact;
pub mod job;
pub mod regressor;
pub mod trainer;

pub use artifact::{ArtifactError, ArtifactStore, ModelArtifact, ModelHandle, TrainedScorer};
pub use job::{JobError, TrainingJobManager, TrainingStatus};
pub use regressor::{r2_score, FitConfig, LinearRegressor, StandardScaler};
pub use trainer::{
    success_score, ModelTrainer, ModelType, TrainingError, TrainingOutcome, TrainingSummary,
    MIN_TRAINING_SAMPLES,
};
