use super::{EnvStep, Observation, StatefulEnvironment, StepInfo};
use crate::{Prng, TrainError};
use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

/// Configuration for the [`CartPole`] environment.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartPoleConfig {
    /// Physics configuration
    pub physics_config: PhysicalConstants,
    /// Episode configuration
    pub env_config: EnvironmentParams,
}

impl CartPoleConfig {
    pub fn build_env(&self) -> CartPole {
        CartPole::new(self.physics_config, self.env_config)
    }
}

/// Cart-Pole environment
///
/// Consists of a simulated cart on a track with a vertical pole attached by a hinge on the top.
/// The goal is to keep the pole upright by applying left (action `0`) and right (action `1`)
/// forces to the cart. Every step yields a reward of `1`.
///
/// The environment is based on [Barto et al. (1983)][barto1983] with updated dynamics equations
/// from [Florian (2005)][florian2005], who corrects the friction term.
/// The default dynamics constants and episode parameters are based on the
/// [OpenAI Gym][gym_cartpole] [CartPole-v1 environment][cartpole_source],
/// including the limit of 500 steps per episode.
///
/// Observations are `[cart_position, cart_velocity, pole_angle, pole_angular_velocity]`.
///
/// [barto1983]: https://ieeexplore.ieee.org/document/6313077
/// [florian2005]: https://coneural.org/florian/papers/05_cart_pole.pdf
/// [gym_cartpole]: https://gym.openai.com/envs/CartPole-v1/
/// [cartpole_source]: https://github.com/openai/gym/blob/master/gym/envs/classic_control/cartpole.py
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CartPole {
    phys: InternalPhysicalConstants,
    env: EnvironmentParams,
    state: CartPoleState,
    /// Number of steps taken in the current episode.
    episode_steps: u64,
}

impl CartPole {
    pub fn new(phys: PhysicalConstants, env: EnvironmentParams) -> Self {
        Self {
            phys: phys.into(),
            env,
            state: CartPoleState::default(),
            episode_steps: 0,
        }
    }
}

/// Left and right pushes.
pub const NUM_ACTIONS: usize = 2;

impl StatefulEnvironment for CartPole {
    fn observation_dim(&self) -> usize {
        4
    }

    fn num_actions(&self) -> usize {
        NUM_ACTIONS
    }

    fn reset(&mut self, rng: &mut Prng) -> Observation {
        // All parameters are sampled from the same range of values
        let dist = Uniform::new_inclusive(-0.05, 0.05);
        self.state = CartPoleState {
            physical: PhysicalState {
                cart_position: dist.sample(rng),
                cart_velocity: dist.sample(rng),
                pole_angle: dist.sample(rng),
                pole_angular_velocity: dist.sample(rng),
            },
            cached_normal_velocity_is_positive: true,
        };
        self.episode_steps = 0;
        self.state.physical.observation()
    }

    fn step(&mut self, action: usize, _: &mut Prng) -> Result<EnvStep, TrainError> {
        let applied_force = match action {
            0 => -self.env.action_force,
            1 => self.env.action_force,
            _ => {
                return Err(TrainError::InvalidAction {
                    action,
                    num_actions: NUM_ACTIONS,
                })
            }
        };
        self.state = self.phys.next_state(&self.state, applied_force);
        self.episode_steps += 1;

        let phys = &self.state.physical;
        let terminal = phys.cart_position.abs() > self.env.max_pos
            || phys.pole_angle.abs() > self.env.max_angle;
        let truncated = !terminal && self.episode_steps >= self.env.max_episode_steps;
        Ok(EnvStep {
            observation: phys.observation(),
            reward: 1.0,
            done: terminal || truncated,
            info: StepInfo { truncated },
        })
    }
}

/// Physical constants for the [`CartPole`] environment.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalConstants {
    /// Downward force of gravity (m/s^2)
    pub gravity: f64,
    /// Mass of the cart (kg)
    pub mass_cart: f64,
    /// Mass of the pole (kg)
    pub mass_pole: f64,
    /// Half the length of the pole (m)
    pub length_half_pole: f64,
    /// Coefficient of friction between the cart and the track (unitless).
    ///
    /// The track is assumed to fully confine the cart in the vertical direction and this same
    /// friction coefficient applies whether the normal force of the cart is up or down.
    pub friction_cart: f64,
    /// Coefficient of friction between the pole and the cart at the hinge (unitless).
    pub friction_pole: f64,
    /// Simulation time step (s)
    pub time_step: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        // Defaults (other than friction) from the OpenAI CartPole-v1 environment
        Self {
            gravity: 9.8,
            mass_cart: 1.0,
            mass_pole: 0.1,
            length_half_pole: 0.5,
            friction_cart: 0.01,
            friction_pole: 0.01,
            time_step: 0.02,
        }
    }
}

/// Parameters for [`CartPole`] as a reinforcement learning environment.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentParams {
    /// Magnitude of the force (N) applied by actions.
    pub action_force: f64,
    /// Maximum absolute position (meters) before the episode is ended.
    pub max_pos: f64,
    /// Maximum absolute pole angle from vertical (radians) before the episode is ended.
    pub max_angle: f64,
    /// Episodes are truncated after this many steps.
    pub max_episode_steps: u64,
}

impl Default for EnvironmentParams {
    fn default() -> Self {
        // Defaults from the OpenAI CartPole-v1 environment
        Self {
            action_force: 10.0,
            max_pos: 2.4,
            max_angle: 12.0f64.to_radians(),
            max_episode_steps: 500,
        }
    }
}

/// Internal cart-pole constants with pre-computed common values.
#[derive(Debug, Copy, Clone, PartialEq)]
struct InternalPhysicalConstants {
    /// Fundamental constants
    c: PhysicalConstants,
    /// Gravitational weight of the combined system (N): `gravity * (mass_cart + mass_pole)`.
    total_weight: f64,
    /// `1 / (mass_cart + mass_pole)`,
    inv_total_mass: f64,
    /// `mass_pole * length_half_pole`
    mass_length_pole: f64,
}

impl Default for InternalPhysicalConstants {
    fn default() -> Self {
        PhysicalConstants::default().into()
    }
}

impl From<PhysicalConstants> for InternalPhysicalConstants {
    fn from(c: PhysicalConstants) -> Self {
        let total_mass = c.mass_cart + c.mass_pole;
        Self {
            c,
            total_weight: c.gravity * total_mass,
            inv_total_mass: total_mass.recip(),
            mass_length_pole: c.mass_pole * c.length_half_pole,
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq)]
struct PhysicalState {
    /// Cart position from the track midpoint (m).
    cart_position: f64,
    /// Cart velocity (m/s).
    cart_velocity: f64,
    /// Angle of the pole from vertical (radians).
    pole_angle: f64,
    /// Pole angular velocity about the hinge (radians / s).
    pole_angular_velocity: f64,
}

impl PhysicalState {
    fn observation(&self) -> Observation {
        vec![
            self.cart_position,
            self.cart_velocity,
            self.pole_angle,
            self.pole_angular_velocity,
        ]
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct CartPoleState {
    physical: PhysicalState,

    /// Cached sign of normal_force * cart_velocity.
    ///
    /// The dynamics equations are slightly circular: this term depends on its own value.
    /// There are only two possible values so the value from the previous time step is used and
    /// if the result is self-inconsistent then the negated value is used.
    cached_normal_velocity_is_positive: bool,
}

impl Default for CartPoleState {
    fn default() -> Self {
        Self {
            physical: PhysicalState::default(),
            cached_normal_velocity_is_positive: true,
        }
    }
}

impl InternalPhysicalConstants {
    /// Simulate the state for one time step with an applied force on the cart (in N).
    fn next_state(&self, state: &CartPoleState, applied_force: f64) -> CartPoleState {
        // Reference:
        // "Correct equations for the dynamics of the cart-pole system" by Florian (2005)
        let phys = &state.physical;

        let mut signed_cart_friction = if state.cached_normal_velocity_is_positive {
            self.c.friction_cart
        } else {
            -self.c.friction_cart
        };
        let (sin_angle, cos_angle) = phys.pole_angle.sin_cos();
        let angular_velocity_squared = phys.pole_angular_velocity * phys.pole_angular_velocity;

        let mut angular_acceleration = self.angular_acceleration(
            phys,
            applied_force,
            signed_cart_friction,
            angular_velocity_squared,
            sin_angle,
            cos_angle,
        );
        let mut normal_force = self.normal_force(
            angular_acceleration,
            angular_velocity_squared,
            sin_angle,
            cos_angle,
        );
        let normal_velocity_is_positive = (normal_force * phys.cart_velocity).is_sign_positive();

        if normal_velocity_is_positive != state.cached_normal_velocity_is_positive {
            signed_cart_friction = -signed_cart_friction;
            angular_acceleration = self.angular_acceleration(
                phys,
                applied_force,
                signed_cart_friction,
                angular_velocity_squared,
                sin_angle,
                cos_angle,
            );
            normal_force = self.normal_force(
                angular_acceleration,
                angular_velocity_squared,
                sin_angle,
                cos_angle,
            );
        }

        // Horizontal acceleration of the cart (m/s^2)
        let force_pole = self.mass_length_pole
            * (angular_velocity_squared * sin_angle + angular_acceleration * cos_angle);
        let force_friction = -signed_cart_friction * normal_force;
        let net_force = applied_force + force_pole + force_friction;
        let cart_acceleration = net_force * self.inv_total_mass;

        // Semi-implicit euler integration
        let cart_velocity = phys.cart_velocity + self.c.time_step * cart_acceleration;
        let cart_position = phys.cart_position + self.c.time_step * cart_velocity;
        let pole_angular_velocity =
            phys.pole_angular_velocity + self.c.time_step * angular_acceleration;
        let pole_angle = phys.pole_angle + self.c.time_step * phys.pole_angular_velocity;

        CartPoleState {
            physical: PhysicalState {
                cart_position,
                cart_velocity,
                pole_angle,
                pole_angular_velocity,
            },
            cached_normal_velocity_is_positive: normal_velocity_is_positive,
        }
    }

    /// The pole angular acceleration
    ///
    /// # Args
    /// * `applied_force`            - Applied horizontal force on the cart (N).
    /// * `signed_cart_friction`     - `friction_cart * sign(normal_force * cart_velocity)`
    /// * `angular_velocity_squared` - `pole_angular_velocity ** 2`
    /// * `sin_angle`                - `sin(pole_angle)`.
    /// * `cos_angle`                - `cos(pole_angle)`.
    fn angular_acceleration(
        &self,
        state: &PhysicalState,
        applied_force: f64,
        signed_cart_friction: f64,
        angular_velocity_squared: f64,
        sin_angle: f64,
        cos_angle: f64,
    ) -> f64 {
        // Equation (21) of Florian (2005) decomposed as numerator / denominator
        let alpha = (-applied_force
            - self.mass_length_pole
                * angular_velocity_squared
                * (sin_angle + signed_cart_friction * cos_angle))
            * self.inv_total_mass;
        let beta = self.c.friction_pole * state.pole_angular_velocity / self.mass_length_pole;
        let numerator = self.c.gravity * sin_angle
            + cos_angle * (alpha + self.c.gravity * signed_cart_friction)
            - beta;

        let denominator = self.c.length_half_pole
            * (4.0 / 3.0
                - self.c.mass_pole
                    * cos_angle
                    * self.inv_total_mass
                    * (cos_angle - signed_cart_friction));
        numerator / denominator
    }

    /// Normal force of the cart against the track (N).
    ///
    /// Positive for downward normal force and negative for upward.
    fn normal_force(
        &self,
        angular_acceleration: f64,
        angular_velocity_squared: f64,
        sin_angle: f64,
        cos_angle: f64,
    ) -> f64 {
        self.total_weight
            - self.mass_length_pole
                * (angular_acceleration * sin_angle + angular_velocity_squared * cos_angle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn reset_is_near_upright() {
        let mut env = CartPole::default();
        let mut rng = Prng::seed_from_u64(0);
        let observation = env.reset(&mut rng);
        assert_eq!(observation.len(), env.observation_dim());
        assert!(observation.iter().all(|x| x.abs() <= 0.05));
    }

    #[test]
    fn constant_push_terminates() {
        let mut env = CartPole::default();
        let mut rng = Prng::seed_from_u64(1);
        env.reset(&mut rng);
        let mut steps = 0;
        loop {
            let step = env.step(1, &mut rng).unwrap();
            steps += 1;
            assert_eq!(step.reward, 1.0);
            if step.done {
                assert!(!step.info.truncated);
                break;
            }
            assert!(steps < 500, "pushing right forever should fail quickly");
        }
    }

    #[test]
    fn truncates_at_step_limit() {
        let env_config = EnvironmentParams {
            max_episode_steps: 3,
            ..EnvironmentParams::default()
        };
        let mut env = CartPole::new(PhysicalConstants::default(), env_config);
        let mut rng = Prng::seed_from_u64(2);
        env.reset(&mut rng);
        // Alternate pushes to stay near upright
        assert!(!env.step(0, &mut rng).unwrap().done);
        assert!(!env.step(1, &mut rng).unwrap().done);
        let last = env.step(0, &mut rng).unwrap();
        assert!(last.done);
        assert!(last.info.truncated);
    }

    #[test]
    fn invalid_action() {
        let mut env = CartPole::default();
        let mut rng = Prng::seed_from_u64(3);
        env.reset(&mut rng);
        assert!(matches!(
            env.step(2, &mut rng),
            Err(TrainError::InvalidAction {
                action: 2,
                num_actions: 2
            })
        ));
    }

    #[test]
    fn same_seed_same_trajectory() {
        let run = |seed| {
            let mut env = CartPole::default();
            let mut rng = Prng::seed_from_u64(seed);
            let mut observations = vec![env.reset(&mut rng)];
            for action in [0, 1, 1, 0, 1] {
                observations.push(env.step(action, &mut rng).unwrap().observation);
            }
            observations
        };
        assert_eq!(run(7), run(7));
    }
}
