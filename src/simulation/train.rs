//! Batch actor-critic training loop
use super::{CheckpointSeries, MetricsTable, TrainConfig};
use crate::agents::TrajectoryBuffer;
use crate::envs::{EnvStep, StatefulEnvironment};
use crate::logging::{Event, Loggable, Logger};
use crate::torch::{ActorCriticUpdater, PolicyNetwork, UpdateStats, ValueNetwork};
use crate::{Prng, TrainError};
use rand::SeedableRng;
use std::mem;

/// Trains a policy and critic on an environment with batched actor-critic updates.
///
/// Each step samples an action from the policy, steps the environment and records the
/// transition. When an episode ends it is flushed to the trajectory buffer and the environment
/// is reset. Once the buffer holds `batch_episodes` episodes, the batch is drained and used for
/// one actor-critic update.
///
/// All randomness comes from the single seed given to [`Trainer::new`].
pub struct Trainer<E> {
    config: TrainConfig,
    env: E,
    rng: Prng,
    policy: PolicyNetwork,
    critic: ValueNetwork,
    updater: ActorCriticUpdater,
    buffer: TrajectoryBuffer,
}

impl<E: StatefulEnvironment> Trainer<E> {
    /// Initialize a training run.
    ///
    /// Seeds the torch random state for network initialization and the run [`Prng`].
    ///
    /// # Errors
    /// [`TrainError::InvalidConfig`] if the configuration is invalid
    /// or `seed` is larger than `i64::MAX`.
    pub fn new(config: TrainConfig, env: E, seed: u64) -> Result<Self, TrainError> {
        config.validate()?;
        let torch_seed = i64::try_from(seed).map_err(|_| {
            TrainError::config(format!("seed must be at most {}, got {}", i64::MAX, seed))
        })?;
        tch::manual_seed(torch_seed);
        let rng = Prng::seed_from_u64(seed);

        let policy = PolicyNetwork::new(env.observation_dim(), env.num_actions(), &config.policy);
        let critic = ValueNetwork::new(env.observation_dim(), &config.critic);
        let updater = ActorCriticUpdater::new(
            &policy,
            &config.policy_optimizer,
            &critic,
            &config.critic_optimizer,
        )?;
        let buffer = TrajectoryBuffer::new(config.batch_episodes, config.return_estimator()?)?;
        Ok(Self {
            config,
            env,
            rng,
            policy,
            critic,
            updater,
            buffer,
        })
    }

    pub const fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub const fn policy(&self) -> &PolicyNetwork {
        &self.policy
    }

    pub const fn critic(&self) -> &ValueNetwork {
        &self.critic
    }

    pub const fn buffer(&self) -> &TrajectoryBuffer {
        &self.buffer
    }

    /// Run for the configured number of steps.
    ///
    /// Returns the mean episode return of each checkpoint interval.
    /// An episode still in progress when the run ends is discarded.
    ///
    /// # Errors
    /// Any error ends the run. Numerical failures in an update leave the networks unchanged.
    pub fn run<L: Logger + ?Sized>(&mut self, logger: &mut L) -> Result<MetricsTable, TrainError> {
        let num_actions = self.env.num_actions();
        let mut checkpoints =
            CheckpointSeries::new(self.config.checkpoint_interval, self.config.empty_window);
        let mut observation = self.env.reset(&mut self.rng);
        let mut episode_reward = 0.0;

        for step in 1..=self.config.num_steps {
            let action = self.policy.act(&observation, &mut self.rng)?;
            let EnvStep {
                observation: next_observation,
                reward,
                done,
                info,
            } = self.env.step(action, &mut self.rng)?;

            logger.log(Event::Step, "reward", reward.into())?;
            logger.log(
                Event::Step,
                "action",
                Loggable::IndexSample {
                    value: action,
                    size: num_actions,
                },
            )?;
            logger.done(Event::Step);

            let state = mem::replace(&mut observation, next_observation);
            self.buffer.record(state, action, reward);
            episode_reward += reward;

            if done {
                let episode_len = self.buffer.episode_len();
                // Truncated episodes are treated as terminal
                self.buffer.flush_episode(&self.critic)?;
                if self.buffer.is_batch_ready() {
                    let batch = self.buffer.drain_batch()?;
                    let stats = self.updater.update(&self.policy, &self.critic, &batch)?;
                    log_update(logger, &stats)?;
                }

                checkpoints.push_episode(episode_reward);
                logger.log(Event::Episode, "reward", episode_reward.into())?;
                logger.log(Event::Episode, "length", (episode_len as f64).into())?;
                logger.log(
                    Event::Episode,
                    "truncated",
                    Loggable::Scalar(if info.truncated { 1.0 } else { 0.0 }),
                )?;
                logger.done(Event::Episode);

                episode_reward = 0.0;
                observation = self.env.reset(&mut self.rng);
            }

            if let Some(mean_return) = checkpoints.end_step(step) {
                logger.log(Event::Checkpoint, "step", (step as f64).into())?;
                logger.log(Event::Checkpoint, "mean_return", mean_return.into())?;
                logger.done(Event::Checkpoint);
            }
        }
        self.buffer.discard_episode();
        Ok(checkpoints.into_table())
    }
}

fn log_update<L: Logger + ?Sized>(logger: &mut L, stats: &UpdateStats) -> Result<(), TrainError> {
    logger.log(Event::Update, "policy_loss", stats.policy_loss.into())?;
    logger.log(Event::Update, "critic_loss", stats.critic_loss.into())?;
    logger.log(Event::Update, "entropy", stats.entropy.into())?;
    logger.log(Event::Update, "batch_len", (stats.batch_len as f64).into())?;
    logger.done(Event::Update);
    Ok(())
}
