//! Training runs
mod checkpoint;
mod train;

pub use checkpoint::{CheckpointSeries, EmptyWindowPolicy, MetricsTable};
pub use train::Trainer;

use crate::agents::LambdaReturn;
use crate::torch::{Activation, MlpConfig, OptimizerConfig};
use crate::TrainError;
use serde::{Deserialize, Serialize};

/// Configuration of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Total number of environment steps.
    pub num_steps: u64,
    /// Number of steps between metric checkpoints.
    pub checkpoint_interval: u64,
    /// Number of completed episodes per batch update.
    pub batch_episodes: usize,
    /// Discount factor.
    pub gamma: f64,
    /// Lambda return weighting.
    pub lambda: f64,
    /// Checkpoint value when no episode completed in an interval.
    pub empty_window: EmptyWindowPolicy,
    /// Policy network layout.
    pub policy: MlpConfig,
    /// Value network layout.
    pub critic: MlpConfig,
    pub policy_optimizer: OptimizerConfig,
    pub critic_optimizer: OptimizerConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            num_steps: 500_000,
            checkpoint_interval: 10_000,
            batch_episodes: 30,
            gamma: 1.0,
            lambda: 1.0,
            empty_window: EmptyWindowPolicy::Nan,
            policy: MlpConfig {
                hidden_sizes: vec![32, 16],
                activation: Activation::Relu,
                output_activation: Activation::Identity,
            },
            critic: MlpConfig {
                hidden_sizes: vec![32, 32],
                activation: Activation::Relu,
                output_activation: Activation::Identity,
            },
            policy_optimizer: OptimizerConfig::default(),
            critic_optimizer: OptimizerConfig::default(),
        }
    }
}

impl TrainConfig {
    /// Check that the configuration describes a valid run.
    ///
    /// # Errors
    /// [`TrainError::InvalidConfig`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), TrainError> {
        if self.num_steps == 0 {
            return Err(TrainError::config("number of steps must be positive"));
        }
        if self.checkpoint_interval == 0 {
            return Err(TrainError::config("checkpoint interval must be positive"));
        }
        if self.batch_episodes == 0 {
            return Err(TrainError::config("batch size must be at least one episode"));
        }
        self.return_estimator()?;
        for (name, optimizer) in [
            ("policy", &self.policy_optimizer),
            ("critic", &self.critic_optimizer),
        ] {
            let learning_rate = optimizer.learning_rate();
            if !(learning_rate > 0.0 && learning_rate.is_finite()) {
                return Err(TrainError::config(format!(
                    "{} learning rate must be positive and finite, got {}",
                    name, learning_rate
                )));
            }
        }
        Ok(())
    }

    /// The lambda return estimator for this configuration.
    pub fn return_estimator(&self) -> Result<LambdaReturn, TrainError> {
        LambdaReturn::new(self.gamma, self.lambda)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::torch::SgdConfig;
    use rstest::rstest;

    #[test]
    fn default_is_valid() {
        TrainConfig::default().validate().unwrap();
    }

    #[rstest]
    #[case::zero_steps(TrainConfig { num_steps: 0, ..TrainConfig::default() })]
    #[case::zero_interval(TrainConfig { checkpoint_interval: 0, ..TrainConfig::default() })]
    #[case::zero_batch(TrainConfig { batch_episodes: 0, ..TrainConfig::default() })]
    #[case::zero_gamma(TrainConfig { gamma: 0.0, ..TrainConfig::default() })]
    #[case::large_gamma(TrainConfig { gamma: 1.5, ..TrainConfig::default() })]
    #[case::negative_lambda(TrainConfig { lambda: -0.1, ..TrainConfig::default() })]
    #[case::nan_lambda(TrainConfig { lambda: f64::NAN, ..TrainConfig::default() })]
    #[case::zero_learning_rate(TrainConfig {
        critic_optimizer: OptimizerConfig::Sgd(SgdConfig { learning_rate: 0.0, ..SgdConfig::default() }),
        ..TrainConfig::default()
    })]
    fn invalid(#[case] config: TrainConfig) {
        assert!(matches!(
            config.validate(),
            Err(TrainError::InvalidConfig(_))
        ));
    }

    #[test]
    fn json_partial_overrides_defaults() {
        let config: TrainConfig = serde_json::from_str(
            r#"{"num_steps": 1000, "lambda": 0.5, "empty_window": "CarryForward"}"#,
        )
        .unwrap();
        assert_eq!(config.num_steps, 1000);
        assert_eq!(config.lambda, 0.5);
        assert_eq!(config.empty_window, EmptyWindowPolicy::CarryForward);
        assert_eq!(config.batch_episodes, 30);
        assert_eq!(config.policy.hidden_sizes, vec![32, 16]);
    }

    #[test]
    fn json_round_trip() {
        let config = TrainConfig::default();
        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<TrainConfig>(&text).unwrap(), config);
    }
}
