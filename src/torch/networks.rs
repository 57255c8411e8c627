//! Policy and value networks
use super::{Categorical, Mlp, MlpConfig};
use crate::agents::StateValue;
use crate::envs::Observation;
use crate::TrainError;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use tch::{
    nn::{Module, VarStore},
    Device, Kind, Tensor,
};

/// Stack observations into an f32 tensor of shape `[N, observation_dim]`.
fn observations_tensor(states: &[Observation], observation_dim: usize) -> Result<Tensor, TrainError> {
    let mut flat = Vec::with_capacity(states.len() * observation_dim);
    for state in states {
        if state.len() != observation_dim {
            return Err(TrainError::ObservationDim {
                expected: observation_dim,
                actual: state.len(),
            });
        }
        flat.extend_from_slice(state);
    }
    Ok(Tensor::of_slice(&flat)
        .to_kind(Kind::Float)
        .reshape(&[states.len() as i64, observation_dim as i64]))
}

/// Stochastic policy over a finite action set.
///
/// An MLP maps an observation to action logits.
#[derive(Debug)]
pub struct PolicyNetwork {
    vs: VarStore,
    mlp: Mlp,
    observation_dim: usize,
    num_actions: usize,
}

impl PolicyNetwork {
    pub fn new(observation_dim: usize, num_actions: usize, config: &MlpConfig) -> Self {
        let vs = VarStore::new(Device::Cpu);
        let mlp = config.build_module(&vs.root(), observation_dim, num_actions);
        Self {
            vs,
            mlp,
            observation_dim,
            num_actions,
        }
    }

    pub const fn var_store(&self) -> &VarStore {
        &self.vs
    }

    pub const fn num_actions(&self) -> usize {
        self.num_actions
    }

    /// Action distributions for a batch of states, with gradient tracking.
    pub fn distribution(&self, states: &[Observation]) -> Result<Categorical, TrainError> {
        let input = observations_tensor(states, self.observation_dim)?;
        Ok(Categorical::new(&self.mlp.forward(&input)))
    }

    /// Action probabilities for a single state.
    pub fn action_probs(&self, state: &[f64]) -> Result<Vec<f64>, TrainError> {
        let distribution =
            tch::no_grad(|| self.distribution(std::slice::from_ref(&state.to_vec())))?;
        Ok(Vec::<f64>::from(
            &distribution.probs().squeeze_dim(0).to_kind(Kind::Double),
        ))
    }

    /// Sample an action for `state`.
    ///
    /// # Errors
    /// [`TrainError::InvalidPolicyOutput`] if the action probabilities are not a valid
    /// distribution, e.g. after the parameters have diverged.
    pub fn act<R: Rng + ?Sized>(&self, state: &[f64], rng: &mut R) -> Result<usize, TrainError> {
        let probs = self.action_probs(state)?;
        match WeightedIndex::new(&probs) {
            Ok(distribution) => Ok(distribution.sample(rng)),
            Err(_) => Err(TrainError::InvalidPolicyOutput(probs)),
        }
    }
}

/// State value estimator.
///
/// An MLP maps an observation to a scalar value.
#[derive(Debug)]
pub struct ValueNetwork {
    vs: VarStore,
    mlp: Mlp,
    observation_dim: usize,
}

impl ValueNetwork {
    pub fn new(observation_dim: usize, config: &MlpConfig) -> Self {
        let vs = VarStore::new(Device::Cpu);
        let mlp = config.build_module(&vs.root(), observation_dim, 1);
        Self {
            vs,
            mlp,
            observation_dim,
        }
    }

    pub const fn var_store(&self) -> &VarStore {
        &self.vs
    }

    /// Values of a batch of states as an f32 tensor of shape `[N]`, with gradient tracking.
    pub fn values(&self, states: &[Observation]) -> Result<Tensor, TrainError> {
        let input = observations_tensor(states, self.observation_dim)?;
        Ok(self.mlp.forward(&input).squeeze_dim(-1))
    }
}

impl StateValue for ValueNetwork {
    fn state_values(&self, states: &[Observation]) -> Result<Vec<f64>, TrainError> {
        let values = tch::no_grad(|| self.values(states))?;
        Ok(Vec::<f64>::from(&values.to_kind(Kind::Double)))
    }
}
