//! Optimizers
use serde::{Deserialize, Serialize};
use std::convert::{TryFrom, TryInto};
use tch::{nn::VarStore, COptimizer, TchError, Tensor};
use thiserror::Error;

/// Error performing an optimization step.
///
/// The parameters are unchanged when a step fails.
#[derive(Debug, Error)]
pub enum OptimizerStepError {
    #[error("loss is not finite: {0}")]
    NonFiniteLoss(f64),
    #[error("gradient is not finite")]
    NonFiniteGradient,
    #[error(transparent)]
    Torch(#[from] TchError),
}

/// Build an optimizer
pub trait BuildOptimizer {
    /// Build an optimizer for the trainable variables in a variable store.
    fn build_optimizer(&self, vs: &VarStore) -> Result<TorchOptimizer, TchError>;
}

impl<T> BuildOptimizer for T
where
    for<'a> &'a T: TryInto<COptimizer, Error = TchError>,
{
    fn build_optimizer(&self, vs: &VarStore) -> Result<TorchOptimizer, TchError> {
        let mut optimizer: COptimizer = self.try_into()?;
        let variables = vs.trainable_variables();
        for var in &variables {
            optimizer.add_parameters(var, 0)?;
        }
        Ok(TorchOptimizer {
            optimizer,
            variables,
        })
    }
}

/// A torch optimizer together with the variables it updates.
pub struct TorchOptimizer {
    optimizer: COptimizer,
    variables: Vec<Tensor>,
}

impl TorchOptimizer {
    /// Back-propagate `loss` and take one optimization step.
    ///
    /// Returns the value of `loss`.
    ///
    /// # Errors
    /// Fails without modifying the parameters if the loss or any gradient is not finite.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<f64, OptimizerStepError> {
        let loss_value = self.backward(loss)?;
        self.step()?;
        Ok(loss_value)
    }

    /// Compute the gradients of `loss` without changing the parameters.
    ///
    /// Returns the value of `loss`.
    /// On error the gradients are left zeroed.
    ///
    /// # Errors
    /// If the loss or any gradient is not finite.
    pub fn backward(&mut self, loss: &Tensor) -> Result<f64, OptimizerStepError> {
        let loss_value = f64::from(loss);
        if !loss_value.is_finite() {
            return Err(OptimizerStepError::NonFiniteLoss(loss_value));
        }
        self.optimizer.zero_grad()?;
        loss.f_backward()?;
        if !self.gradients_are_finite() {
            self.optimizer.zero_grad()?;
            return Err(OptimizerStepError::NonFiniteGradient);
        }
        Ok(loss_value)
    }

    /// Apply the gradients from the last successful [`TorchOptimizer::backward`].
    pub fn step(&mut self) -> Result<(), OptimizerStepError> {
        self.optimizer.step()?;
        Ok(())
    }

    /// Clear the gradients of all variables.
    pub fn zero_grad(&mut self) -> Result<(), OptimizerStepError> {
        self.optimizer.zero_grad()?;
        Ok(())
    }

    fn gradients_are_finite(&self) -> bool {
        self.variables.iter().all(|var| {
            let grad = var.grad();
            !grad.defined() || bool::from(grad.isfinite().all())
        })
    }
}

/// Configuration for the SGD optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SgdConfig {
    /// Learning rate
    pub learning_rate: f64,
    /// Momentum
    pub momentum: f64,
    /// Weight decay (L2 penalty)
    pub weight_decay: f64,
    /// Dampening for momentum
    pub dampening: f64,
    /// Enables Nesterov momentum
    pub nesterov: bool,
}

impl Default for SgdConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-2,
            momentum: 0.0,
            weight_decay: 0.0,
            dampening: 0.0,
            nesterov: false,
        }
    }
}

impl TryFrom<&SgdConfig> for COptimizer {
    type Error = TchError;
    fn try_from(config: &SgdConfig) -> Result<Self, Self::Error> {
        Self::sgd(
            config.learning_rate,
            config.momentum,
            config.dampening,
            config.weight_decay,
            config.nesterov,
        )
    }
}

/// Configuration for the Adam optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdamConfig {
    /// Learning rate
    pub learning_rate: f64,
    /// Coefficient for the running average of the gradient
    pub beta1: f64,
    /// Coefficient for the running average of the square of the gradient
    pub beta2: f64,
    /// Weight decay (L2 penalty)
    pub weight_decay: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            weight_decay: 0.0,
        }
    }
}

impl AdamConfig {
    pub fn with_learning_rate(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            ..Self::default()
        }
    }
}

impl TryFrom<&AdamConfig> for COptimizer {
    type Error = TchError;
    fn try_from(config: &AdamConfig) -> Result<Self, Self::Error> {
        Self::adam(
            config.learning_rate,
            config.beta1,
            config.beta2,
            config.weight_decay,
        )
    }
}

/// Optimizer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OptimizerConfig {
    Sgd(SgdConfig),
    Adam(AdamConfig),
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam(AdamConfig::default())
    }
}

impl OptimizerConfig {
    pub const fn learning_rate(&self) -> f64 {
        match self {
            Self::Sgd(config) => config.learning_rate,
            Self::Adam(config) => config.learning_rate,
        }
    }

    pub fn set_learning_rate(&mut self, learning_rate: f64) {
        match self {
            Self::Sgd(config) => config.learning_rate = learning_rate,
            Self::Adam(config) => config.learning_rate = learning_rate,
        }
    }
}

impl TryFrom<&OptimizerConfig> for COptimizer {
    type Error = TchError;

    fn try_from(config: &OptimizerConfig) -> Result<Self, Self::Error> {
        match config {
            OptimizerConfig::Sgd(config) => config.try_into(),
            OptimizerConfig::Adam(config) => config.try_into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tch::{Device, Kind};

    fn quadratic_store() -> (VarStore, Tensor) {
        let vs = VarStore::new(Device::Cpu);
        let x = vs.root().zeros("x", &[2]);
        (vs, x)
    }

    /// Minimize (x - [1, -2])^2 from x = 0 and check the distance to the minimum.
    fn check_optimizes_quadratic<B: BuildOptimizer>(config: &B, num_steps: usize, tolerance: f64) {
        let (vs, x) = quadratic_store();
        let mut optimizer = config.build_optimizer(&vs).unwrap();
        let target = Tensor::of_slice(&[1.0_f32, -2.0]);
        for _ in 0..num_steps {
            let loss = (&x - &target).square().sum(Kind::Float);
            optimizer.backward_step(&loss).unwrap();
        }
        let distance = f64::from((&x - &target).norm());
        assert!(distance < tolerance, "x: {:?}, target: {:?}", x, target);
    }

    #[test]
    fn sgd_optimizes_quadratic() {
        let config = SgdConfig {
            learning_rate: 1e-1,
            ..SgdConfig::default()
        };
        check_optimizes_quadratic(&config, 500, 1e-3);
    }

    #[test]
    fn adam_optimizes_quadratic() {
        check_optimizes_quadratic(&AdamConfig::with_learning_rate(1e-1), 500, 0.1);
    }

    #[test]
    fn returns_loss_value() {
        let (vs, x) = quadratic_store();
        let mut optimizer = SgdConfig::default().build_optimizer(&vs).unwrap();
        let loss = (&x + 3.0).square().sum(Kind::Float);
        assert_eq!(optimizer.backward_step(&loss).unwrap(), 18.0);
    }

    #[rstest]
    #[case::nan(f32::NAN)]
    #[case::inf(f32::INFINITY)]
    fn rejects_non_finite_loss(#[case] scale: f32) {
        let (vs, x) = quadratic_store();
        let mut optimizer = AdamConfig::default().build_optimizer(&vs).unwrap();
        let loss = (&x + 1.0).sum(Kind::Float) * f64::from(scale);
        assert!(matches!(
            optimizer.backward_step(&loss),
            Err(OptimizerStepError::NonFiniteLoss(_))
        ));
        assert_eq!(x, Tensor::zeros(&[2], (Kind::Float, Device::Cpu)));
    }

    #[test]
    fn rejects_non_finite_gradient() {
        let (vs, x) = quadratic_store();
        let mut optimizer = SgdConfig::default().build_optimizer(&vs).unwrap();
        // d/dx sqrt(x) at 0 is infinite while the loss is 0
        let loss = x.sqrt().sum(Kind::Float);
        assert!(matches!(
            optimizer.backward_step(&loss),
            Err(OptimizerStepError::NonFiniteGradient)
        ));
        assert_eq!(x, Tensor::zeros(&[2], (Kind::Float, Device::Cpu)));
    }

    #[test]
    fn backward_defers_update_to_step() {
        let (vs, x) = quadratic_store();
        let mut optimizer = SgdConfig::default().build_optimizer(&vs).unwrap();
        let loss = (&x - 1.0).square().sum(Kind::Float);
        assert_eq!(optimizer.backward(&loss).unwrap(), 2.0);
        assert_eq!(x, Tensor::zeros(&[2], (Kind::Float, Device::Cpu)));
        optimizer.step().unwrap();
        assert!(bool::from(x.gt(0.0).all()));
    }

    #[test]
    fn learning_rate_accessors() {
        let mut config = OptimizerConfig::default();
        assert_eq!(config.learning_rate(), 1e-3);
        config.set_learning_rate(0.5);
        assert_eq!(config, OptimizerConfig::Adam(AdamConfig::with_learning_rate(0.5)));
    }
}
