//! Deep Q-learning offloading agent: epsilon-greedy policy over a value
//! network, experience replay, and a periodically synced target network.

mod qnet;
mod replay;

pub use qnet::QNetwork;
pub use replay::{Experience, ReplayBuffer};

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::LearningConfig;
use crate::error::{EdgesimError, Result};

#[derive(Serialize, Deserialize)]
struct SavedModel {
    state_dim: usize,
    action_dim: usize,
    epsilon: f64,
    network: QNetwork,
}

pub struct DqnAgent {
    policy: QNetwork,
    target: QNetwork,
    buffer: ReplayBuffer,
    rng: StdRng,
    config: LearningConfig,
    epsilon: f64,
    train_steps: usize,
    state_dim: usize,
    action_dim: usize,
}

impl DqnAgent {
    pub fn new(state_dim: usize, action_dim: usize, config: LearningConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let policy = QNetwork::new(state_dim, action_dim, &mut rng);
        let target = policy.clone();
        let buffer = ReplayBuffer::new(config.replay_capacity);
        let epsilon = config.exploration_rate;
        DqnAgent {
            policy,
            target,
            buffer,
            rng,
            config,
            epsilon,
            train_steps: 0,
            state_dim,
            action_dim,
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn action_dim(&self) -> usize {
        self.action_dim
    }

    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    /// Epsilon-greedy action selection.
    pub fn act(&mut self, state: &[f64]) -> usize {
        if self.rng.gen_range(0.0..1.0) < self.epsilon {
            self.rng.gen_range(0..self.action_dim)
        } else {
            self.act_greedy(state)
        }
    }

    /// Purely greedy selection: the highest-valued action, first index on
    /// ties.
    pub fn act_greedy(&self, state: &[f64]) -> usize {
        argmax(&self.policy.forward(state))
    }

    pub fn remember(&mut self, experience: Experience) {
        self.buffer.push(experience);
    }

    /// One training round over a uniform minibatch. Returns the mean loss,
    /// or `None` while the buffer is shorter than a batch.
    pub fn train(&mut self) -> Option<f64> {
        if self.buffer.len() < self.config.batch_size {
            return None;
        }
        let batch = self.buffer.sample(&mut self.rng, self.config.batch_size);
        let mut loss_sum = 0.0;
        for experience in &batch {
            let mut target_values = self.policy.forward(&experience.state);
            let value = if experience.done {
                experience.reward
            } else {
                let next = self.target.forward(&experience.next_state);
                experience.reward + self.config.discount_factor * max_value(&next)
            };
            target_values[experience.action] = value;
            loss_sum += self.policy.train(
                &experience.state,
                &target_values,
                self.config.learning_rate,
            );
        }
        self.train_steps += 1;
        if self.train_steps % self.config.target_update_frequency == 0 {
            self.target = self.policy.clone();
            debug!(steps = self.train_steps, "target network synced");
        }
        Some(loss_sum / batch.len() as f64)
    }

    /// Episode boundary: decay exploration toward its floor.
    pub fn end_episode(&mut self) {
        self.epsilon = (self.epsilon * self.config.exploration_decay)
            .max(self.config.exploration_floor);
    }

    /// Persist the policy network and exploration state as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let model = SavedModel {
            state_dim: self.state_dim,
            action_dim: self.action_dim,
            epsilon: self.epsilon,
            network: self.policy.clone(),
        };
        let blob = serde_json::to_string(&model)?;
        std::fs::write(path, blob)?;
        info!(path = %path.display(), "model saved");
        Ok(())
    }

    /// Restore a saved policy into a fresh agent. The checkpoint must match
    /// the current world's state and action dimensions.
    pub fn load(
        path: &Path,
        state_dim: usize,
        action_dim: usize,
        config: LearningConfig,
        seed: u64,
    ) -> Result<Self> {
        let blob = std::fs::read_to_string(path)?;
        let model: SavedModel = serde_json::from_str(&blob)?;
        if model.state_dim != state_dim || model.action_dim != action_dim {
            return Err(EdgesimError::Model(format!(
                "checkpoint dimensions {}x{} do not match world {}x{}",
                model.state_dim, model.action_dim, state_dim, action_dim
            )));
        }
        let mut agent = DqnAgent::new(state_dim, action_dim, config, seed);
        agent.target = model.network.clone();
        agent.policy = model.network;
        agent.epsilon = model.epsilon;
        info!(path = %path.display(), epsilon = agent.epsilon, "model loaded");
        Ok(agent)
    }

    #[cfg(test)]
    fn target_forward(&self, state: &[f64]) -> Vec<f64> {
        self.target.forward(state)
    }
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (idx, value) in values.iter().enumerate() {
        if *value > values[best] {
            best = idx;
        }
    }
    best
}

fn max_value(values: &[f64]) -> f64 {
    values.iter().fold(f64::NEG_INFINITY, |acc, v| acc.max(*v))
}
