use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::ml::artifact::ModelHandle;
use crate::ml::trainer::{ModelTrainer, TrainingSummary};

/// Observable state of the retraining job
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrainingStatus {
    Idle,
    Running {
        job_id: Uuid,
        started_at: DateTime<Utc>,
    },
    Completed {
        job_id: Uuid,
        finished_at: DateTime<Utc>,
        summary: TrainingSummary,
    },
    Failed {
        job_id: Uuid,
        finished_at: DateTime<Utc>,
        error: String,
    },
    Aborted {
        job_id: Uuid,
        finished_at: DateTime<Utc>,
    },
}

impl TrainingStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, TrainingStatus::Running { .. })
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("a training job is already running")]
    AlreadyRunning,
}

/// Runs retraining as an explicit, observable async job.
///
/// One job at a time; status travels over a watch channel instead of a
/// fire-and-forget task. The trained model is only published after the
/// run fully succeeds, so failures and aborts leave the live model
/// untouched.
pub struct TrainingJobManager {
    trainer: Arc<ModelTrainer>,
    model: ModelHandle,
    status_tx: watch::Sender<TrainingStatus>,
    status_rx: watch::Receiver<TrainingStatus>,
    running: Mutex<Option<JoinHandle<()>>>,
}

impl TrainingJobManager {
    pub fn new(trainer: Arc<ModelTrainer>, model: ModelHandle) -> Self {
        let (status_tx, status_rx) = watch::channel(TrainingStatus::Idle);
        Self {
            trainer,
            model,
            status_tx,
            status_rx,
            running: Mutex::new(None),
        }
    }

    /// Launch a training run, rejecting a second concurrent one
    pub async fn start(&self) -> Result<Uuid, JobError> {
        let mut running = self.running.lock().await;
        if let Some(handle) = running.as_ref() {
            if !handle.is_finished() {
                return Err(JobError::AlreadyRunning);
            }
        }

        let job_id = Uuid::new_v4();
        self.status_tx.send_replace(TrainingStatus::Running {
            job_id,
            started_at: Utc::now(),
        });
        tracing::info!(%job_id, "Training job started");

        let trainer = self.trainer.clone();
        let model = self.model.clone();
        let status_tx = self.status_tx.clone();

        let handle = tokio::spawn(async move {
            match trainer.train().await {
                Ok(outcome) => {
                    if let Some(scorer) = outcome.scorer {
                        tracing::info!(%job_id, version = %scorer.version, "Publishing trained model");
                        model.publish(scorer);
                    }
                    status_tx.send_replace(TrainingStatus::Completed {
                        job_id,
                        finished_at: Utc::now(),
                        summary: outcome.summary,
                    });
                }
                Err(error) => {
                    tracing::error!(%job_id, error = %error, "Training job failed");
                    status_tx.send_replace(TrainingStatus::Failed {
                        job_id,
                        finished_at: Utc::now(),
                        error: error.to_string(),
                    });
                }
            }
        });

        *running = Some(handle);
        Ok(job_id)
    }

    pub fn status(&self) -> TrainingStatus {
        self.status_rx.borrow().clone()
    }

    /// Watch for status transitions (used by callers that want to block
    /// until a run finishes)
    pub fn subscribe(&self) -> watch::Receiver<TrainingStatus> {
        self.status_rx.clone()
    }

    /// Abort the in-flight run, if any.
    ///
    /// The published model is only swapped at the very end of a
    /// successful run, so an abort can never leave a partial artifact
    /// live.
    pub async fn abort(&self) -> bool {
        let mut running = self.running.lock().await;
        let Some(handle) = running.take() else {
            return false;
        };
        if handle.is_finished() {
            return false;
        }

        handle.abort();
        let job_id = match self.status() {
            TrainingStatus::Running { job_id, .. } => job_id,
            _ => Uuid::nil(),
        };
        self.status_tx.send_replace(TrainingStatus::Aborted {
            job_id,
            finished_at: Utc::now(),
        });
        tracing::warn!(%job_id, "Training job aborted");
        true
    }
}
