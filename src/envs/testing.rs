//! Environment testing utilities
use super::{EnvStep, Observation, StatefulEnvironment, StepInfo};
use crate::{Prng, TrainError};

/// Environment that replays scripted episode rewards, cycling through the episodes.
///
/// Observations are `[episode_index, step_index]` within the current script entry.
/// Actions are validated but otherwise ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedEnv {
    episodes: Vec<Vec<f64>>,
    num_actions: usize,
    episode: usize,
    step: usize,
    started: bool,
}

impl ScriptedEnv {
    /// # Panics
    /// If `episodes` is empty or contains an empty episode.
    pub fn new(episodes: Vec<Vec<f64>>, num_actions: usize) -> Self {
        assert!(!episodes.is_empty() && episodes.iter().all(|e| !e.is_empty()));
        Self {
            episodes,
            num_actions,
            episode: 0,
            step: 0,
            started: false,
        }
    }

    fn observation(&self) -> Observation {
        vec![self.episode as f64, self.step as f64]
    }
}

impl StatefulEnvironment for ScriptedEnv {
    fn observation_dim(&self) -> usize {
        2
    }

    fn num_actions(&self) -> usize {
        self.num_actions
    }

    fn reset(&mut self, _: &mut Prng) -> Observation {
        if self.started {
            self.episode = (self.episode + 1) % self.episodes.len();
        }
        self.started = true;
        self.step = 0;
        self.observation()
    }

    fn step(&mut self, action: usize, _: &mut Prng) -> Result<EnvStep, TrainError> {
        if action >= self.num_actions {
            return Err(TrainError::InvalidAction {
                action,
                num_actions: self.num_actions,
            });
        }
        let rewards = &self.episodes[self.episode];
        let reward = rewards[self.step];
        self.step += 1;
        let done = self.step == rewards.len();
        Ok(EnvStep {
            observation: self.observation(),
            reward,
            done,
            info: StepInfo::default(),
        })
    }
}
