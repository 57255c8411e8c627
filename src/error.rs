//! Error type
use crate::logging::LogError;
use crate::torch::optimizers::OptimizerStepError;
use tch::TchError;
use thiserror::Error;

/// Error from a training run.
///
/// Every variant is fatal for the run that produced it.
#[derive(Error, Debug)]
pub enum TrainError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("optimizer step failed for the {network}")]
    OptimizerStep {
        network: &'static str,
        #[source]
        source: OptimizerStepError,
    },
    #[error("action {action} is not in 0..{num_actions}")]
    InvalidAction { action: usize, num_actions: usize },
    #[error("policy produced invalid action probabilities {0:?}")]
    InvalidPolicyOutput(Vec<f64>),
    #[error("expected {expected} {what}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("expected observations of dimension {expected}, got {actual}")]
    ObservationDim { expected: usize, actual: usize },
    #[error("cannot flush an episode with no steps")]
    EmptyEpisode,
    #[error("batch is not ready: {episode_count} episodes flushed with batch size {batch_episodes}")]
    BatchNotReady {
        episode_count: u64,
        batch_episodes: usize,
    },
    #[error("cannot update from an empty batch")]
    EmptyBatch,
    #[error("torch error")]
    Torch(#[from] TchError),
    #[error("logging error")]
    Log(#[from] LogError),
    #[error("file error {0}")]
    Io(#[from] std::io::Error),
    #[error("error parsing configuration file")]
    ConfigFile(#[from] serde_json::Error),
}

impl TrainError {
    pub(crate) fn config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig(message.into())
    }
}
