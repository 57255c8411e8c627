//! Torch components
mod activation;
mod distributions;
mod mlp;
pub mod networks;
pub mod optimizers;
mod updater;

pub use activation::Activation;
pub use distributions::Categorical;
pub use mlp::{Mlp, MlpConfig};
pub use networks::{PolicyNetwork, ValueNetwork};
pub use optimizers::{AdamConfig, BuildOptimizer, OptimizerConfig, SgdConfig, TorchOptimizer};
pub use updater::{ActorCriticUpdater, UpdateStats};
