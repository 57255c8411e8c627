//! Actor-critic parameter updates
use super::networks::{PolicyNetwork, ValueNetwork};
use super::optimizers::{BuildOptimizer, OptimizerConfig, TorchOptimizer};
use crate::agents::Batch;
use crate::TrainError;
use tch::{Kind, Tensor};

/// Statistics of one actor-critic update, evaluated before the parameters change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateStats {
    /// Policy surrogate loss `-mean(advantage * log_prob)`.
    pub policy_loss: f64,
    /// Mean squared residual of the critic.
    pub critic_loss: f64,
    /// Mean entropy of the policy action distributions.
    pub entropy: f64,
    /// Number of steps in the batch.
    pub batch_len: usize,
}

/// Applies one policy-gradient step and one critic regression step per batch.
///
/// For a batch of states `s`, actions `a` and returns `G`,
/// the residual is `h = G - V(s)`.
/// The policy loss is `-mean(stop_gradient(h) * log π(a|s))`
/// and the critic loss is `mean(h^2)`.
/// The policy and critic each have their own optimizer.
pub struct ActorCriticUpdater {
    policy_optimizer: TorchOptimizer,
    critic_optimizer: TorchOptimizer,
}

impl ActorCriticUpdater {
    pub fn new(
        policy: &PolicyNetwork,
        policy_optimizer: &OptimizerConfig,
        critic: &ValueNetwork,
        critic_optimizer: &OptimizerConfig,
    ) -> Result<Self, TrainError> {
        Ok(Self {
            policy_optimizer: policy_optimizer.build_optimizer(policy.var_store())?,
            critic_optimizer: critic_optimizer.build_optimizer(critic.var_store())?,
        })
    }

    /// Update the policy then the critic from a batch.
    ///
    /// Both losses are evaluated at the current parameters
    /// and both gradients are computed and checked before either step.
    ///
    /// # Errors
    /// * [`TrainError::EmptyBatch`] if the batch has no steps.
    /// * [`TrainError::InvalidAction`] if an action is outside the policy action set.
    /// * [`TrainError::OptimizerStep`] if a loss or gradient is not finite.
    ///   Neither network changes in that case.
    pub fn update(
        &mut self,
        policy: &PolicyNetwork,
        critic: &ValueNetwork,
        batch: &Batch,
    ) -> Result<UpdateStats, TrainError> {
        if batch.is_empty() {
            return Err(TrainError::EmptyBatch);
        }
        let num_actions = policy.num_actions();
        if let Some(&action) = batch.actions().iter().find(|&&a| a >= num_actions) {
            return Err(TrainError::InvalidAction {
                action,
                num_actions,
            });
        }

        let returns = Tensor::of_slice(batch.returns()).to_kind(Kind::Float);
        let actions: Vec<i64> = batch.actions().iter().map(|&a| a as i64).collect();
        let actions = Tensor::of_slice(&actions);

        let residuals = returns - critic.values(batch.states())?;
        let advantages = residuals.detach();

        let distribution = policy.distribution(batch.states())?;
        let policy_loss = -(advantages * distribution.log_probs(&actions)).mean(Kind::Float);
        let critic_loss = residuals.square().mean(Kind::Float);
        let entropy = f64::from(distribution.entropy().mean(Kind::Float));

        let policy_loss = self
            .policy_optimizer
            .backward(&policy_loss)
            .map_err(|source| TrainError::OptimizerStep {
                network: "policy",
                source,
            })?;
        let critic_loss = match self.critic_optimizer.backward(&critic_loss) {
            Ok(loss) => loss,
            Err(source) => {
                self.policy_optimizer.zero_grad().map_err(|source| {
                    TrainError::OptimizerStep {
                        network: "policy",
                        source,
                    }
                })?;
                return Err(TrainError::OptimizerStep {
                    network: "critic",
                    source,
                });
            }
        };

        self.policy_optimizer
            .step()
            .map_err(|source| TrainError::OptimizerStep {
                network: "policy",
                source,
            })?;
        self.critic_optimizer
            .step()
            .map_err(|source| TrainError::OptimizerStep {
                network: "critic",
                source,
            })?;

        Ok(UpdateStats {
            policy_loss,
            critic_loss,
            entropy,
            batch_len: batch.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::optimizers::OptimizerStepError;
    use super::super::{MlpConfig, SgdConfig};
    use super::*;
    use crate::agents::StateValue;
    use crate::envs::Observation;
    use crate::Prng;
    use rand::{Rng, SeedableRng};
    use rstest::{fixture, rstest};
    use tch::nn::VarStore;

    const OBS_DIM: usize = 3;
    const NUM_ACTIONS: usize = 2;

    struct Setup {
        policy: PolicyNetwork,
        critic: ValueNetwork,
        updater: ActorCriticUpdater,
    }

    fn sgd(learning_rate: f64) -> OptimizerConfig {
        OptimizerConfig::Sgd(SgdConfig {
            learning_rate,
            ..SgdConfig::default()
        })
    }

    #[fixture]
    fn setup() -> Setup {
        tch::manual_seed(1);
        let config = MlpConfig {
            hidden_sizes: vec![8],
            ..MlpConfig::default()
        };
        let policy = PolicyNetwork::new(OBS_DIM, NUM_ACTIONS, &config);
        let critic = ValueNetwork::new(OBS_DIM, &config);
        let updater = ActorCriticUpdater::new(&policy, &sgd(0.01), &critic, &sgd(0.01)).unwrap();
        Setup {
            policy,
            critic,
            updater,
        }
    }

    fn random_states(rng: &mut Prng, n: usize) -> Vec<Observation> {
        (0..n)
            .map(|_| (0..OBS_DIM).map(|_| rng.gen_range(-1.0..1.0)).collect())
            .collect()
    }

    fn parameters(vs: &VarStore) -> Vec<Tensor> {
        vs.trainable_variables().iter().map(Tensor::copy).collect()
    }

    fn critic_loss(critic: &ValueNetwork, batch: &Batch) -> f64 {
        let values = critic.state_values(batch.states()).unwrap();
        values
            .iter()
            .zip(batch.returns())
            .map(|(v, g)| (g - v).powi(2))
            .sum::<f64>()
            / batch.len() as f64
    }

    #[rstest]
    fn critic_loss_decreases(mut setup: Setup) {
        let mut rng = Prng::seed_from_u64(2);
        for _ in 0..10 {
            let states = random_states(&mut rng, 16);
            let actions = (0..16).map(|_| rng.gen_range(0..NUM_ACTIONS)).collect();
            let returns = (0..16).map(|_| rng.gen_range(0.0..5.0)).collect();
            let batch = Batch::from_parts(states, actions, returns).unwrap();

            let before = critic_loss(&setup.critic, &batch);
            setup
                .updater
                .update(&setup.policy, &setup.critic, &batch)
                .unwrap();
            let after = critic_loss(&setup.critic, &batch);
            assert!(after < before, "before: {}, after: {}", before, after);
        }
    }

    #[rstest]
    fn positive_residual_raises_action_probability(mut setup: Setup) {
        let state = vec![0.2, -0.4, 0.9];
        let value = setup.critic.state_values(&[state.clone()]).unwrap()[0];
        let batch = Batch::from_parts(vec![state.clone()], vec![1], vec![value + 1.0]).unwrap();

        let before = setup.policy.action_probs(&state).unwrap()[1];
        setup
            .updater
            .update(&setup.policy, &setup.critic, &batch)
            .unwrap();
        let after = setup.policy.action_probs(&state).unwrap()[1];
        assert!(after > before, "before: {}, after: {}", before, after);
    }

    #[rstest]
    fn negative_residual_lowers_action_probability(mut setup: Setup) {
        let state = vec![-0.3, 0.1, 0.5];
        let value = setup.critic.state_values(&[state.clone()]).unwrap()[0];
        let batch = Batch::from_parts(vec![state.clone()], vec![0], vec![value - 1.0]).unwrap();

        let before = setup.policy.action_probs(&state).unwrap()[0];
        setup
            .updater
            .update(&setup.policy, &setup.critic, &batch)
            .unwrap();
        let after = setup.policy.action_probs(&state).unwrap()[0];
        assert!(after < before, "before: {}, after: {}", before, after);
    }

    #[rstest]
    fn reports_losses_before_update(mut setup: Setup) {
        let mut rng = Prng::seed_from_u64(3);
        let states = random_states(&mut rng, 4);
        let batch = Batch::from_parts(states, vec![0, 1, 1, 0], vec![1.0, -2.0, 0.5, 3.0]).unwrap();

        let values = setup.critic.state_values(batch.states()).unwrap();
        let mut expected_policy_loss = 0.0;
        let mut expected_entropy = 0.0;
        for (((state, &action), &ret), value) in batch
            .states()
            .iter()
            .zip(batch.actions())
            .zip(batch.returns())
            .zip(&values)
        {
            let probs = setup.policy.action_probs(state).unwrap();
            expected_policy_loss -= (ret - value) * probs[action].ln();
            expected_entropy -= probs.iter().map(|p| p * p.ln()).sum::<f64>();
        }
        expected_policy_loss /= 4.0;
        expected_entropy /= 4.0;
        let expected_critic_loss = critic_loss(&setup.critic, &batch);

        let stats = setup
            .updater
            .update(&setup.policy, &setup.critic, &batch)
            .unwrap();
        assert_eq!(stats.batch_len, 4);
        assert!((stats.policy_loss - expected_policy_loss).abs() < 1e-4);
        assert!((stats.critic_loss - expected_critic_loss).abs() < 1e-4);
        assert!((stats.entropy - expected_entropy).abs() < 1e-4);
    }

    #[rstest]
    fn zero_residual_leaves_parameters_unchanged(mut setup: Setup) {
        let mut rng = Prng::seed_from_u64(4);
        let states = random_states(&mut rng, 5);
        let returns = setup.critic.state_values(&states).unwrap();
        let batch = Batch::from_parts(states, vec![0, 1, 0, 1, 1], returns).unwrap();

        let policy_before = parameters(setup.policy.var_store());
        let critic_before = parameters(setup.critic.var_store());
        let stats = setup
            .updater
            .update(&setup.policy, &setup.critic, &batch)
            .unwrap();
        assert_eq!(stats.critic_loss, 0.0);
        assert_eq!(parameters(setup.policy.var_store()), policy_before);
        assert_eq!(parameters(setup.critic.var_store()), critic_before);
    }

    #[rstest]
    fn non_finite_return_is_error(mut setup: Setup) {
        let batch = Batch::from_parts(vec![vec![0.0; OBS_DIM]; 2], vec![0, 1], vec![1.0, f64::NAN])
            .unwrap();
        let policy_before = parameters(setup.policy.var_store());
        let critic_before = parameters(setup.critic.var_store());
        assert!(matches!(
            setup.updater.update(&setup.policy, &setup.critic, &batch),
            Err(TrainError::OptimizerStep {
                source: OptimizerStepError::NonFiniteLoss(_),
                ..
            })
        ));
        assert_eq!(parameters(setup.policy.var_store()), policy_before);
        assert_eq!(parameters(setup.critic.var_store()), critic_before);
    }

    #[test]
    fn non_finite_critic_gradient_leaves_policy_unchanged() {
        tch::manual_seed(5);
        let policy_config = MlpConfig {
            hidden_sizes: vec![8],
            ..MlpConfig::default()
        };
        let critic_config = MlpConfig {
            hidden_sizes: vec![],
            ..MlpConfig::default()
        };
        let policy = PolicyNetwork::new(OBS_DIM, NUM_ACTIONS, &policy_config);
        let critic = ValueNetwork::new(OBS_DIM, &critic_config);
        let mut updater =
            ActorCriticUpdater::new(&policy, &sgd(0.01), &critic, &sgd(0.01)).unwrap();
        // Uniform policy with finite gradients for any input
        tch::no_grad(|| {
            for mut var in policy.var_store().trainable_variables() {
                let _ = var.zero_();
            }
        });

        // Finite loss h^2 = 1e38 but the linear critic weight gradient 2 * h * s overflows f32
        let state = vec![1e20, 0.0, 0.0];
        let value = critic.state_values(&[state.clone()]).unwrap()[0];
        let batch = Batch::from_parts(vec![state], vec![0], vec![value + 1e19]).unwrap();

        let policy_before = parameters(policy.var_store());
        let critic_before = parameters(critic.var_store());
        assert!(matches!(
            updater.update(&policy, &critic, &batch),
            Err(TrainError::OptimizerStep {
                network: "critic",
                source: OptimizerStepError::NonFiniteGradient,
            })
        ));
        assert_eq!(parameters(policy.var_store()), policy_before);
        assert_eq!(parameters(critic.var_store()), critic_before);
    }

    #[rstest]
    fn empty_batch_is_error(mut setup: Setup) {
        assert!(matches!(
            setup
                .updater
                .update(&setup.policy, &setup.critic, &Batch::default()),
            Err(TrainError::EmptyBatch)
        ));
    }

    #[rstest]
    fn out_of_range_action_is_error(mut setup: Setup) {
        let batch = Batch::from_parts(vec![vec![0.0; OBS_DIM]], vec![NUM_ACTIONS], vec![1.0]).unwrap();
        assert!(matches!(
            setup.updater.update(&setup.policy, &setup.critic, &batch),
            Err(TrainError::InvalidAction {
                action: 2,
                num_actions: 2
            })
        ));
    }
}
