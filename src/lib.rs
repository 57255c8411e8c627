//! Batch actor-critic training with lambda returns.
#![warn(clippy::cast_lossless)]
#![warn(clippy::cast_possible_truncation)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::missing_const_for_fn)] // has some false positives
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::redundant_closure_for_method_calls)]
#![warn(clippy::use_self)]
pub mod agents;
pub mod cli;
pub mod envs;
mod error;
pub mod logging;
pub mod simulation;
pub mod torch;
pub mod utils;

pub use agents::{Batch, LambdaReturn, StateValue, TrajectoryBuffer};
pub use envs::{CartPole, EnvStep, Observation, StatefulEnvironment};
pub use error::TrainError;
pub use simulation::{MetricsTable, TrainConfig, Trainer};

/// Pseudo-random number generator type used by this crate.
///
/// A run draws environment resets, environment dynamics and action samples from a single
/// instance seeded once at the start of the run.
pub type Prng = rand_chacha::ChaCha8Rng;
