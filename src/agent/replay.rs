use std::collections::VecDeque;

use rand::rngs::StdRng;

/// One transition observed by the agent.
#[derive(Debug, Clone)]
pub struct Experience {
    pub state: Vec<f64>,
    pub action: usize,
    pub reward: f64,
    pub next_state: Vec<f64>,
    pub done: bool,
}

/// Bounded FIFO replay buffer with uniform sampling.
#[derive(Debug)]
pub struct ReplayBuffer {
    buffer: VecDeque<Experience>,
    capacity: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        ReplayBuffer {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a transition, evicting the oldest when full.
    pub fn push(&mut self, experience: Experience) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(experience);
    }

    /// Uniform sample without replacement. Returns fewer than `amount`
    /// when the buffer holds fewer transitions.
    pub fn sample(&self, rng: &mut StdRng, amount: usize) -> Vec<Experience> {
        let amount = amount.min(self.buffer.len());
        rand::seq::index::sample(rng, self.buffer.len(), amount)
            .into_iter()
            .map(|idx| self.buffer[idx].clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[cfg(test)]
    pub fn rewards(&self) -> Vec<f64> {
        self.buffer.iter().map(|e| e.reward).collect()
    }
}
