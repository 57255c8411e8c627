//! Lambda returns
use crate::envs::Observation;
use crate::TrainError;
use serde::{Deserialize, Serialize};

/// Read-only state value estimates.
///
/// Values are plain numbers: evaluating them must not record any gradient information,
/// since the resulting returns are used as fixed regression targets for the same estimator.
pub trait StateValue {
    /// Estimated value of each state.
    fn state_values(&self, states: &[Observation]) -> Result<Vec<f64>, TrainError>;
}

impl<F> StateValue for F
where
    F: Fn(&[f64]) -> f64,
{
    fn state_values(&self, states: &[Observation]) -> Result<Vec<f64>, TrainError> {
        Ok(states.iter().map(|s| self(s)).collect())
    }
}

/// Lambda-weighted multi-step returns.
///
/// The lambda return of step `t` is an exponentially weighted average of the `n`-step
/// bootstrapped returns `r_{t+1} + ... + γ^{n-1} r_{t+n} + γ^n V(s_{t+n})` with weights
/// `(1 - λ) λ^{n-1}`, where the weight of every `n`-step return reaching the end of the episode
/// goes to the full (unbootstrapped) return. Equivalently,
///
/// ```text
/// G_{T-1} = r_T
/// G_t     = r_{t+1} + γ ((1 - λ) V(s_{t+1}) + λ G_{t+1})
/// ```
///
/// Episodes are assumed to end in a terminal state so the last step is never bootstrapped.
/// `λ = 0` gives one-step TD targets and `λ = γ = 1` gives undiscounted Monte Carlo returns.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaReturn {
    gamma: f64,
    lambda: f64,
}

impl LambdaReturn {
    /// # Args
    /// * `gamma` - Discount factor in `(0, 1]`.
    /// * `lambda` - Return weighting factor in `[0, 1]`.
    ///
    /// # Errors
    /// [`TrainError::InvalidConfig`] if either factor is out of range.
    pub fn new(gamma: f64, lambda: f64) -> Result<Self, TrainError> {
        if !(gamma > 0.0 && gamma <= 1.0) {
            return Err(TrainError::config(format!(
                "discount factor must be in (0, 1], got {}",
                gamma
            )));
        }
        if !(0.0..=1.0).contains(&lambda) {
            return Err(TrainError::config(format!(
                "lambda must be in [0, 1], got {}",
                lambda
            )));
        }
        Ok(Self { gamma, lambda })
    }

    pub const fn gamma(&self) -> f64 {
        self.gamma
    }

    pub const fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Lambda returns of an episode.
    ///
    /// # Args
    /// * `states` - The states `s_0 .. s_{T-1}` in which each action was taken.
    /// * `rewards` - The rewards `r_1 .. r_T`; `r_t` follows the action taken in `s_{t-1}`.
    /// * `critic` - State value estimates. Only queried for `s_1 .. s_{T-1}`.
    ///
    /// # Errors
    /// [`TrainError::LengthMismatch`] if `states` and `rewards` differ in length
    /// or any error from querying the critic.
    pub fn returns<V>(
        &self,
        states: &[Observation],
        rewards: &[f64],
        critic: &V,
    ) -> Result<Vec<f64>, TrainError>
    where
        V: StateValue + ?Sized,
    {
        check_lengths(states, rewards)?;
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let next_values = critic_values(critic, &states[1..])?;
        Ok(self.returns_from_next_values(rewards, &next_values))
    }

    /// Lambda returns given the value of each successor state.
    ///
    /// Computed backwards through the episode in linear time.
    ///
    /// # Args
    /// * `rewards` - The rewards `r_1 .. r_T`.
    /// * `next_values` - The values `V(s_1) .. V(s_{T-1})`: one fewer than `rewards`.
    ///
    /// # Panics
    /// If `next_values.len() + 1 != rewards.len()` for non-empty `rewards`.
    pub fn returns_from_next_values(&self, rewards: &[f64], next_values: &[f64]) -> Vec<f64> {
        let num_steps = rewards.len();
        if num_steps == 0 {
            return Vec::new();
        }
        assert_eq!(next_values.len() + 1, num_steps, "one value per successor state");

        let mut returns = vec![0.0; num_steps];
        let mut next_return = rewards[num_steps - 1];
        returns[num_steps - 1] = next_return;
        for t in (0..num_steps - 1).rev() {
            next_return = rewards[t]
                + self.gamma
                    * ((1.0 - self.lambda) * next_values[t] + self.lambda * next_return);
            returns[t] = next_return;
        }
        returns
    }

    /// Lambda returns computed directly as the weighted sum of every `n`-step return.
    ///
    /// Takes quadratic time in the episode length.
    /// Agrees with [`LambdaReturn::returns`] up to floating point error.
    ///
    /// # Errors
    /// Same as [`LambdaReturn::returns`].
    pub fn naive_returns<V>(
        &self,
        states: &[Observation],
        rewards: &[f64],
        critic: &V,
    ) -> Result<Vec<f64>, TrainError>
    where
        V: StateValue + ?Sized,
    {
        check_lengths(states, rewards)?;
        let num_steps = rewards.len();
        if num_steps == 0 {
            return Ok(Vec::new());
        }
        // values[i] = V(s_i); the value of s_0 is never used
        let mut values = vec![0.0];
        values.extend(critic_values(critic, &states[1..])?);

        let returns = (0..num_steps)
            .map(|t| {
                let horizon = num_steps - t;
                let mut discounted_rewards = 0.0;
                let mut discount = 1.0;
                let mut weighted_bootstrapped = 0.0;
                let mut weight = 1.0 - self.lambda;
                for n in 1..horizon {
                    discounted_rewards += discount * rewards[t + n - 1];
                    discount *= self.gamma;
                    weighted_bootstrapped +=
                        weight * (discounted_rewards + discount * values[t + n]);
                    weight *= self.lambda;
                }
                let full_return = discounted_rewards + discount * rewards[num_steps - 1];
                weighted_bootstrapped + powi(self.lambda, horizon - 1) * full_return
            })
            .collect();
        Ok(returns)
    }
}

/// `x^n` with `0^0 = 1`.
fn powi(x: f64, n: usize) -> f64 {
    (0..n).fold(1.0, |acc, _| acc * x)
}

/// Query the critic, checking that it produced one value per state.
fn critic_values<V>(critic: &V, states: &[Observation]) -> Result<Vec<f64>, TrainError>
where
    V: StateValue + ?Sized,
{
    let values = critic.state_values(states)?;
    if values.len() != states.len() {
        return Err(TrainError::LengthMismatch {
            what: "state values",
            expected: states.len(),
            actual: values.len(),
        });
    }
    Ok(values)
}

fn check_lengths(states: &[Observation], rewards: &[f64]) -> Result<(), TrainError> {
    if states.len() == rewards.len() {
        Ok(())
    } else {
        Err(TrainError::LengthMismatch {
            what: "rewards",
            expected: states.len(),
            actual: rewards.len(),
        })
    }
}
