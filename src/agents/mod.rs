//! Episode bookkeeping for batch actor-critic learning
mod buffer;
mod lambda_return;

pub use buffer::{Batch, TrajectoryBuffer};
pub use lambda_return::{LambdaReturn, StateValue};
