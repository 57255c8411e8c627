//! Trajectory buffer
use super::lambda_return::{LambdaReturn, StateValue};
use crate::envs::Observation;
use crate::TrainError;
use std::mem;

/// Steps of the episode in progress.
#[derive(Debug, Default, Clone, PartialEq)]
struct Episode {
    states: Vec<Observation>,
    actions: Vec<usize>,
    rewards: Vec<f64>,
}

impl Episode {
    fn clear(&mut self) {
        self.states.clear();
        self.actions.clear();
        self.rewards.clear();
    }
}

/// Training batch: the steps of one or more complete episodes with their lambda returns.
///
/// The states, actions and returns always have the same length.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Batch {
    states: Vec<Observation>,
    actions: Vec<usize>,
    returns: Vec<f64>,
}

impl Batch {
    /// Number of steps in the batch.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &[Observation] {
        &self.states
    }

    pub fn actions(&self) -> &[usize] {
        &self.actions
    }

    pub fn returns(&self) -> &[f64] {
        &self.returns
    }

    /// Construct a batch from parallel sequences.
    ///
    /// # Errors
    /// [`TrainError::LengthMismatch`] if the sequences differ in length.
    pub fn from_parts(
        states: Vec<Observation>,
        actions: Vec<usize>,
        returns: Vec<f64>,
    ) -> Result<Self, TrainError> {
        if actions.len() != states.len() {
            return Err(TrainError::LengthMismatch {
                what: "actions",
                expected: states.len(),
                actual: actions.len(),
            });
        }
        if returns.len() != states.len() {
            return Err(TrainError::LengthMismatch {
                what: "returns",
                expected: states.len(),
                actual: returns.len(),
            });
        }
        Ok(Self {
            states,
            actions,
            returns,
        })
    }
}

/// Accumulates episode steps into training batches of a fixed number of episodes.
///
/// Steps are recorded into the current episode with [`TrajectoryBuffer::record`].
/// When the episode ends, [`TrajectoryBuffer::flush_episode`] converts its rewards into lambda
/// returns and appends it to the batch. Once `batch_episodes` episodes have been flushed since
/// the last drain the batch is ready and is taken with [`TrajectoryBuffer::drain_batch`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryBuffer {
    batch_episodes: usize,
    estimator: LambdaReturn,
    episode: Episode,
    batch: Batch,
    episode_count: u64,
}

impl TrajectoryBuffer {
    /// # Errors
    /// [`TrainError::InvalidConfig`] if `batch_episodes` is zero.
    pub fn new(batch_episodes: usize, estimator: LambdaReturn) -> Result<Self, TrainError> {
        if batch_episodes == 0 {
            return Err(TrainError::config("batch size must be at least one episode"));
        }
        Ok(Self {
            batch_episodes,
            estimator,
            episode: Episode::default(),
            batch: Batch::default(),
            episode_count: 0,
        })
    }

    /// Record a step of the current episode.
    ///
    /// `reward` is the reward received after taking `action` in `state`.
    pub fn record(&mut self, state: Observation, action: usize, reward: f64) {
        self.episode.states.push(state);
        self.episode.actions.push(action);
        self.episode.rewards.push(reward);
    }

    /// End the current episode and add it to the batch.
    ///
    /// `critic` provides the bootstrap values of the episode states.
    ///
    /// # Errors
    /// [`TrainError::EmptyEpisode`] if no steps have been recorded since the last flush.
    /// The buffer is unchanged on error.
    pub fn flush_episode<V>(&mut self, critic: &V) -> Result<(), TrainError>
    where
        V: StateValue + ?Sized,
    {
        if self.episode.states.is_empty() {
            return Err(TrainError::EmptyEpisode);
        }
        let returns = self
            .estimator
            .returns(&self.episode.states, &self.episode.rewards, critic)?;

        self.batch.states.append(&mut self.episode.states);
        self.batch.actions.append(&mut self.episode.actions);
        self.batch.returns.extend(returns);
        self.episode.clear();
        self.episode_count += 1;
        Ok(())
    }

    /// Drop the steps of the current episode without adding them to the batch.
    pub fn discard_episode(&mut self) {
        self.episode.clear();
    }

    /// Number of episodes flushed over the lifetime of the buffer.
    pub const fn episode_count(&self) -> u64 {
        self.episode_count
    }

    /// Number of steps recorded in the current episode.
    pub fn episode_len(&self) -> usize {
        self.episode.states.len()
    }

    /// Number of episodes per batch.
    pub const fn batch_episodes(&self) -> usize {
        self.batch_episodes
    }

    /// The batch accumulated so far.
    pub const fn batch(&self) -> &Batch {
        &self.batch
    }

    /// Whether the episode count is a multiple of the batch size.
    ///
    /// This holds before the first flush and stays true after a drain until the next flush,
    /// so a batch drained in either state is empty.
    pub fn is_batch_ready(&self) -> bool {
        self.episode_count % self.batch_episodes as u64 == 0
    }

    /// Take the accumulated batch, leaving the batch empty.
    ///
    /// The episode count and any episode in progress are unaffected.
    /// The returned batch has no steps if nothing was flushed since the last drain.
    ///
    /// # Errors
    /// [`TrainError::BatchNotReady`] unless [`TrajectoryBuffer::is_batch_ready`].
    pub fn drain_batch(&mut self) -> Result<Batch, TrainError> {
        if !self.is_batch_ready() {
            return Err(TrainError::BatchNotReady {
                episode_count: self.episode_count,
                batch_episodes: self.batch_episodes,
            });
        }
        Ok(mem::take(&mut self.batch))
    }
}
