//! Offloading policies: deterministic baselines and the trained agent
//! behind one trait.

use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::agent::DqnAgent;
use crate::env::OffloadingEnv;
use crate::model::Task;
use crate::network::nearest_in_coverage;

/// Picks an action index for a pending task: 0 is local, `1..=n` the edge
/// servers, `n + 1` the cloud.
pub trait OffloadPolicy {
    fn name(&self) -> &str;
    fn select(&mut self, env: &OffloadingEnv, device_idx: usize, task: &Task, now: f64) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BaselineKind {
    LocalOnly,
    EdgeOnly,
    CloudOnly,
    Random,
    GreedyLatency,
    GreedyEnergy,
}

impl BaselineKind {
    pub const ALL: [BaselineKind; 6] = [
        BaselineKind::LocalOnly,
        BaselineKind::EdgeOnly,
        BaselineKind::CloudOnly,
        BaselineKind::Random,
        BaselineKind::GreedyLatency,
        BaselineKind::GreedyEnergy,
    ];

    pub fn build(self, seed: u64) -> Box<dyn OffloadPolicy> {
        match self {
            BaselineKind::LocalOnly => Box::new(LocalOnly),
            BaselineKind::EdgeOnly => Box::new(EdgeOnly),
            BaselineKind::CloudOnly => Box::new(CloudOnly),
            BaselineKind::Random => Box::new(RandomPolicy::new(seed)),
            BaselineKind::GreedyLatency => Box::new(GreedyLatency),
            BaselineKind::GreedyEnergy => Box::new(GreedyEnergy),
        }
    }
}

/// Every task runs on its originating device.
pub struct LocalOnly;

impl OffloadPolicy for LocalOnly {
    fn name(&self) -> &str {
        "local-only"
    }

    fn select(&mut self, _env: &OffloadingEnv, _device_idx: usize, _task: &Task, _now: f64) -> usize {
        0
    }
}

/// Nearest in-coverage edge server, local when none covers the device.
pub struct EdgeOnly;

impl OffloadPolicy for EdgeOnly {
    fn name(&self) -> &str {
        "edge-only"
    }

    fn select(&mut self, env: &OffloadingEnv, device_idx: usize, _task: &Task, _now: f64) -> usize {
        let device = &env.devices()[device_idx];
        match nearest_in_coverage(env.edges(), device.x, device.y) {
            Some(idx) => idx + 1,
            None => 0,
        }
    }
}

/// Every task goes to the cloud.
pub struct CloudOnly;

impl OffloadPolicy for CloudOnly {
    fn name(&self) -> &str {
        "cloud-only"
    }

    fn select(&mut self, env: &OffloadingEnv, _device_idx: usize, _task: &Task, _now: f64) -> usize {
        env.action_space() - 1
    }
}

/// Uniformly random action, from the policy's own seeded stream.
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        RandomPolicy {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl OffloadPolicy for RandomPolicy {
    fn name(&self) -> &str {
        "random"
    }

    fn select(&mut self, env: &OffloadingEnv, _device_idx: usize, _task: &Task, _now: f64) -> usize {
        self.rng.gen_range(0..env.action_space())
    }
}

/// Minimizes predicted end-to-end latency over all reachable targets.
pub struct GreedyLatency;

impl OffloadPolicy for GreedyLatency {
    fn name(&self) -> &str {
        "greedy-latency"
    }

    fn select(&mut self, env: &OffloadingEnv, device_idx: usize, task: &Task, now: f64) -> usize {
        let device = &env.devices()[device_idx];
        let mut best_action = 0;
        let mut best_latency = device.local_execution_time(task.length_mi);

        for (idx, edge) in env.edges().iter().enumerate() {
            if !edge.in_coverage(device.x, device.y) {
                continue;
            }
            let distance = edge.distance_to(device.x, device.y);
            let latency = env.network().edge_offload_time(
                task.input_kb,
                task.output_kb,
                distance,
                edge.coverage_radius_m,
            ) + edge.execution_time(task.length_mi, now);
            if latency < best_latency {
                best_latency = latency;
                best_action = idx + 1;
            }
        }

        // Cloud relays through the first server when one exists.
        let cloud_latency = match env.edges().first() {
            Some(relay) if relay.in_coverage(device.x, device.y) => {
                env.network().cloud_offload_time(
                    task.input_kb,
                    task.output_kb,
                    relay.distance_to(device.x, device.y),
                    relay.coverage_radius_m,
                ) + env.cloud().execution_time(task.length_mi)
            }
            Some(_) => f64::INFINITY,
            None => {
                env.network().cloud_offload_time(task.input_kb, task.output_kb, 0.0, 1.0)
                    + env.cloud().execution_time(task.length_mi)
            }
        };
        if cloud_latency < best_latency {
            best_action = env.action_space() - 1;
        }
        best_action
    }
}

/// Minimizes predicted device-side energy. Offload energy is a simple
/// distance-scaled radio estimate, not the execution-time model.
pub struct GreedyEnergy;

impl GreedyEnergy {
    fn radio_energy(device: &crate::model::Device, task: &Task, distance_m: f64) -> f64 {
        let transmit = task.input_kb * 1e-6 * distance_m * device.transmit_power_w;
        let receive = task.output_kb * 5e-7 * device.receive_power_w;
        transmit + receive
    }
}

impl OffloadPolicy for GreedyEnergy {
    fn name(&self) -> &str {
        "greedy-energy"
    }

    fn select(&mut self, env: &OffloadingEnv, device_idx: usize, task: &Task, _now: f64) -> usize {
        let device = &env.devices()[device_idx];
        let mut best_action = 0;
        let mut best_energy = device.local_energy(task.length_mi);

        for (idx, edge) in env.edges().iter().enumerate() {
            if !edge.in_coverage(device.x, device.y) {
                continue;
            }
            let energy = Self::radio_energy(device, task, edge.distance_to(device.x, device.y));
            if energy < best_energy {
                best_energy = energy;
                best_action = idx + 1;
            }
        }

        // The cloud needs an in-coverage relay.
        if let Some(relay) = nearest_in_coverage(env.edges(), device.x, device.y) {
            let distance = env.edges()[relay].distance_to(device.x, device.y);
            let energy = Self::radio_energy(device, task, distance);
            if energy < best_energy {
                best_action = env.action_space() - 1;
            }
        }
        best_action
    }
}

/// Adapter running a trained agent greedily, for evaluation runs.
pub struct AgentPolicy<'a> {
    agent: &'a DqnAgent,
}

impl<'a> AgentPolicy<'a> {
    pub fn new(agent: &'a DqnAgent) -> Self {
        AgentPolicy { agent }
    }
}

impl OffloadPolicy for AgentPolicy<'_> {
    fn name(&self) -> &str {
        "dqn"
    }

    fn select(&mut self, env: &OffloadingEnv, device_idx: usize, task: &Task, now: f64) -> usize {
        self.agent.act_greedy(&env.state(device_idx, task, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    fn env_with(devices: usize, edges: usize, coverage: f64) -> OffloadingEnv {
        let mut config = SimConfig::default();
        config.devices.count = devices;
        config.edge.count = edges;
        config.edge.coverage_radius_m = coverage;
        config.seed = 7;
        OffloadingEnv::new(&config)
    }

    fn task() -> Task {
        Task::new(0, 0, 100.0, 50.0, 5.0, 5.0, 1.0)
    }

    #[test]
    fn test_local_only_always_zero() {
        let env = env_with(2, 3, 400.0);
        let mut policy = LocalOnly;
        assert_eq!(policy.select(&env, 0, &task(), 1.0), 0);
    }

    #[test]
    fn test_cloud_only_picks_last_action() {
        let env = env_with(2, 3, 400.0);
        let mut policy = CloudOnly;
        assert_eq!(policy.select(&env, 0, &task(), 1.0), env.action_space() - 1);
    }

    #[test]
    fn test_edge_only_falls_back_to_local() {
        let env = env_with(2, 2, 0.001);
        let mut policy = EdgeOnly;
        assert_eq!(policy.select(&env, 0, &task(), 1.0), 0);
    }

    #[test]
    fn test_edge_only_picks_nearest_covering_server() {
        let env = env_with(2, 2, 10_000.0);
        let mut policy = EdgeOnly;
        let device = &env.devices()[0];
        let action = policy.select(&env, 0, &task(), 1.0);
        assert!(action >= 1 && action <= 2);
        let chosen = &env.edges()[action - 1];
        let other = &env.edges()[2 - action];
        assert!(
            chosen.distance_to(device.x, device.y) <= other.distance_to(device.x, device.y)
        );
    }

    #[test]
    fn test_random_stays_in_action_space() {
        let env = env_with(1, 2, 400.0);
        let mut policy = RandomPolicy::new(3);
        for _ in 0..200 {
            assert!(policy.select(&env, 0, &task(), 1.0) < env.action_space());
        }
    }

    #[test]
    fn test_greedy_latency_prefers_local_when_isolated() {
        let env = env_with(1, 2, 0.001);
        let mut policy = GreedyLatency;
        assert_eq!(policy.select(&env, 0, &task(), 1.0), 0);
    }

    #[test]
    fn test_greedy_energy_prefers_local_when_isolated() {
        let env = env_with(1, 2, 0.001);
        let mut policy = GreedyEnergy;
        assert_eq!(policy.select(&env, 0, &task(), 1.0), 0);
    }
}
