//! Reinforcement learning environments
mod cartpole;
#[cfg(test)]
pub mod testing;

pub use cartpole::{CartPole, CartPoleConfig, EnvironmentParams, PhysicalConstants};

use crate::Prng;

/// An environment observation: a fixed-dimensional vector of real values.
pub type Observation = Vec<f64>;

/// Auxiliary information about an environment step.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StepInfo {
    /// The episode was cut off by a step limit rather than reaching a terminal state.
    pub truncated: bool,
}

/// The result of an environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvStep {
    /// Observation of the resulting state.
    ///
    /// Provided even if the episode is done; callers reset the environment in that case.
    pub observation: Observation,
    /// The reward value for this transition.
    pub reward: f64,
    /// Whether this step ends the episode.
    pub done: bool,
    pub info: StepInfo,
}

/// A reinforcement learning environment with internal state.
///
/// The environment has a fixed number of discrete actions, indexed `0 .. num_actions()`,
/// and produces observations of dimension `observation_dim()`.
pub trait StatefulEnvironment {
    /// Number of dimensions of each observation.
    fn observation_dim(&self) -> usize;

    /// Number of discrete actions.
    fn num_actions(&self) -> usize;

    /// Reset the environment to an initial state.
    ///
    /// Must be called before the first step and after each step with `done = true`.
    fn reset(&mut self, rng: &mut Prng) -> Observation;

    /// Take a step in the environment.
    ///
    /// # Errors
    /// [`TrainError::InvalidAction`](crate::TrainError::InvalidAction)
    /// if `action` is not less than `num_actions()`.
    fn step(&mut self, action: usize, rng: &mut Prng) -> Result<EnvStep, crate::TrainError>;
}
