//! Command-line options
use super::{Update, WithUpdate};
use crate::envs::CartPoleConfig;
use crate::simulation::{EmptyWindowPolicy, TrainConfig};
use crate::TrainError;
use clap::{Parser, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(
    version,
    author,
    about,
    after_help = "Values given as options override those in the --config file."
)]
pub struct Options {
    /// Random seed for environment resets, action sampling and network initialization.
    #[arg(default_value_t = 0)]
    pub seed: u64,

    /// JSON training configuration file. Missing fields take their default values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory in which to write the checkpoint table.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    #[arg(long, help_heading = "TRAINING OPTIONS")]
    /// Total number of environment steps
    pub num_steps: Option<u64>,

    #[arg(long, help_heading = "TRAINING OPTIONS")]
    /// Number of steps between checkpoints of the mean episode return
    pub checkpoint_interval: Option<u64>,

    #[arg(long, help_heading = "TRAINING OPTIONS")]
    /// Number of episodes per batch update
    pub batch_episodes: Option<usize>,

    #[arg(long, help_heading = "TRAINING OPTIONS")]
    /// Discount factor
    pub gamma: Option<f64>,

    #[arg(long, help_heading = "TRAINING OPTIONS")]
    /// Lambda return weighting
    pub lambda: Option<f64>,

    #[arg(long, value_enum, help_heading = "TRAINING OPTIONS")]
    /// Checkpoint value when no episode completed in an interval
    pub empty_window: Option<EmptyWindowArg>,

    #[arg(long, help_heading = "AGENT OPTIONS")]
    /// Policy optimizer learning rate
    pub policy_learning_rate: Option<f64>,

    #[arg(long, help_heading = "AGENT OPTIONS")]
    /// Critic optimizer learning rate
    pub critic_learning_rate: Option<f64>,

    #[arg(long, value_delimiter = ',', help_heading = "AGENT OPTIONS")]
    /// Policy network hidden layer sizes
    pub policy_hidden_sizes: Option<Vec<usize>>,

    #[arg(long, value_delimiter = ',', help_heading = "AGENT OPTIONS")]
    /// Critic network hidden layer sizes
    pub critic_hidden_sizes: Option<Vec<usize>>,

    #[arg(long, help_heading = "ENVIRONMENT OPTIONS")]
    /// Maximum number of steps per episode
    pub max_episode_steps: Option<u64>,

    #[arg(long, default_value_t = 1.0, help_heading = "LOGGING OPTIONS")]
    /// Seconds between progress summaries
    pub display_period: f64,
}

/// Empty checkpoint window policy
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyWindowArg {
    Nan,
    CarryForward,
}

impl From<EmptyWindowArg> for EmptyWindowPolicy {
    fn from(arg: EmptyWindowArg) -> Self {
        match arg {
            EmptyWindowArg::Nan => Self::Nan,
            EmptyWindowArg::CarryForward => Self::CarryForward,
        }
    }
}

impl Options {
    /// The training configuration: the config file (or defaults) updated by these options.
    ///
    /// # Errors
    /// If the config file cannot be read or parsed.
    pub fn train_config(&self) -> Result<TrainConfig, TrainError> {
        let base = match &self.config {
            Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
            None => TrainConfig::default(),
        };
        Ok(base.with_update(self))
    }

    pub fn env_config(&self) -> CartPoleConfig {
        CartPoleConfig::default().with_update(self)
    }

    /// Time between progress summaries.
    ///
    /// # Errors
    /// [`TrainError::InvalidConfig`] if the period is negative or not finite.
    pub fn display_period(&self) -> Result<Duration, TrainError> {
        Duration::try_from_secs_f64(self.display_period).map_err(|_| {
            TrainError::config(format!(
                "display period must be a finite non-negative number of seconds, got {}",
                self.display_period
            ))
        })
    }

    /// Path of the output checkpoint table.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(crate::MetricsTable::file_name(self.seed))
    }
}

impl Update<&Options> for TrainConfig {
    fn update(&mut self, opts: &Options) {
        if let Some(num_steps) = opts.num_steps {
            self.num_steps = num_steps;
        }
        if let Some(checkpoint_interval) = opts.checkpoint_interval {
            self.checkpoint_interval = checkpoint_interval;
        }
        if let Some(batch_episodes) = opts.batch_episodes {
            self.batch_episodes = batch_episodes;
        }
        if let Some(gamma) = opts.gamma {
            self.gamma = gamma;
        }
        if let Some(lambda) = opts.lambda {
            self.lambda = lambda;
        }
        if let Some(empty_window) = opts.empty_window {
            self.empty_window = empty_window.into();
        }
        if let Some(learning_rate) = opts.policy_learning_rate {
            self.policy_optimizer.set_learning_rate(learning_rate);
        }
        if let Some(learning_rate) = opts.critic_learning_rate {
            self.critic_optimizer.set_learning_rate(learning_rate);
        }
        if let Some(hidden_sizes) = &opts.policy_hidden_sizes {
            self.policy.hidden_sizes = hidden_sizes.clone();
        }
        if let Some(hidden_sizes) = &opts.critic_hidden_sizes {
            self.critic.hidden_sizes = hidden_sizes.clone();
        }
    }
}

impl Update<&Options> for CartPoleConfig {
    fn update(&mut self, opts: &Options) {
        if let Some(max_episode_steps) = opts.max_episode_steps {
            self.env_config.max_episode_steps = max_episode_steps;
        }
    }
}
