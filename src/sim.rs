//! Simulation orchestration: the arrival/mobility event loop, the DQN
//! training driver, evaluation runs, and the strategy comparison driver.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::agent::{DqnAgent, Experience};
use crate::config::SimConfig;
use crate::env::OffloadingEnv;
use crate::error::Result;
use crate::generator::TaskGenerator;
use crate::metrics::MetricsReport;
use crate::mobility::MobilityModel;
use crate::model::Task;
use crate::strategy::{AgentPolicy, BaselineKind, OffloadPolicy};

/// Per-episode training summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub episode: usize,
    pub tasks: u64,
    pub total_reward: f64,
    pub avg_reward: f64,
    pub avg_loss: Option<f64>,
    pub epsilon: f64,
    pub deadline_met_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingReport {
    pub episodes: Vec<EpisodeSummary>,
}

impl TrainingReport {
    /// Mean episode reward over the first and last quarters of training,
    /// as a coarse learning-trend indicator.
    pub fn reward_trend(&self) -> Option<(f64, f64)> {
        let quarter = self.episodes.len() / 4;
        if quarter == 0 {
            return None;
        }
        let mean = |slice: &[EpisodeSummary]| {
            slice.iter().map(|e| e.avg_reward).sum::<f64>() / slice.len() as f64
        };
        Some((
            mean(&self.episodes[..quarter]),
            mean(&self.episodes[self.episodes.len() - quarter..]),
        ))
    }
}

/// World plus the seeded workload and movement streams driving it.
pub struct Simulation {
    config: SimConfig,
    env: OffloadingEnv,
    generator: TaskGenerator,
    mobility: MobilityModel,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        let env = OffloadingEnv::new(&config);
        let generator = TaskGenerator::new(config.tasks.clone(), workload_seed(&config, 0));
        let mobility = MobilityModel::new(
            &config.mobility,
            config.devices.count,
            movement_seed(&config, 0),
        );
        Simulation {
            config,
            env,
            generator,
            mobility,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn env(&self) -> &OffloadingEnv {
        &self.env
    }

    /// Reset the world and reseed both stochastic streams for a round.
    /// Equal round numbers replay the identical workload and movement,
    /// which is what makes strategy comparisons apples-to-apples.
    fn reset_round(&mut self, round: u64) {
        self.env.reset();
        self.generator.reseed(workload_seed(&self.config, round));
        self.mobility.reseed(movement_seed(&self.config, round));
    }

    /// Run the arrival loop until the horizon or the per-episode task quota,
    /// interleaving fixed-interval mobility updates in time order. The
    /// handler decides and executes each task.
    fn drive<F>(&mut self, mut handle: F) -> u64
    where
        F: FnMut(&mut OffloadingEnv, usize, Task, f64),
    {
        let horizon = self.config.run.horizon_s;
        let quota = self.config.run.tasks_per_episode as u64;
        let dt = self.config.mobility.update_interval_s;
        let mut next_arrival: Vec<f64> = (0..self.config.devices.count)
            .map(|_| self.generator.next_interarrival(0.0))
            .collect();
        let mut next_move = dt;
        let mut count = 0u64;

        while count < quota {
            let Some((device_idx, at)) = next_arrival
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, t)| (i, *t))
            else {
                break;
            };
            if at > horizon {
                break;
            }
            while next_move <= at {
                self.mobility.update(self.env.devices_mut(), dt);
                next_move += dt;
            }
            let task = self.generator.next_task(device_idx, at);
            handle(&mut self.env, device_idx, task, at);
            count += 1;
            next_arrival[device_idx] = at + self.generator.next_interarrival(at);
        }
        count
    }

    /// Train the agent for the configured number of episodes. Checkpoints
    /// land in `checkpoint_dir` when a checkpoint interval is set.
    pub fn train(
        &mut self,
        agent: &mut DqnAgent,
        checkpoint_dir: Option<&Path>,
    ) -> Result<TrainingReport> {
        let episodes = self.config.learning.training_episodes;
        let train_interval = self.config.learning.train_interval.max(1);
        let mut report = TrainingReport::default();

        for episode in 0..episodes {
            self.reset_round(episode as u64);
            let mut pending: Option<Experience> = None;
            let mut total_reward = 0.0;
            let mut decisions = 0usize;
            let mut loss_sum = 0.0;
            let mut loss_count = 0usize;

            let tasks = self.drive(|env, device_idx, mut task, now| {
                let state = env.state(device_idx, &task, now);
                let action = agent.act(&state);
                let reward = env.execute_action(device_idx, &mut task, action, now);
                let next_state = env.state(device_idx, &task, now);
                if let Some(experience) = pending.take() {
                    agent.remember(experience);
                }
                pending = Some(Experience {
                    state,
                    action,
                    reward,
                    next_state,
                    done: false,
                });
                total_reward += reward;
                decisions += 1;
                if decisions % train_interval == 0 {
                    if let Some(loss) = agent.train() {
                        loss_sum += loss;
                        loss_count += 1;
                    }
                }
            });

            // The episode's last transition is terminal.
            if let Some(mut experience) = pending.take() {
                experience.next_state = vec![0.0; experience.next_state.len()];
                experience.done = true;
                agent.remember(experience);
            }
            if let Some(loss) = agent.train() {
                loss_sum += loss;
                loss_count += 1;
            }
            agent.end_episode();

            let metrics = MetricsReport::from_tasks(
                self.env.devices().iter().flat_map(|d| &d.completed_tasks),
                self.config.run.warmup_s,
            );
            let summary = EpisodeSummary {
                episode,
                tasks,
                total_reward,
                avg_reward: if tasks > 0 {
                    total_reward / tasks as f64
                } else {
                    0.0
                },
                avg_loss: (loss_count > 0).then(|| loss_sum / loss_count as f64),
                epsilon: agent.epsilon(),
                deadline_met_rate: metrics.deadline_met_rate,
            };
            debug!(
                episode,
                tasks,
                avg_reward = summary.avg_reward,
                epsilon = summary.epsilon,
                "episode finished"
            );
            report.episodes.push(summary);

            let interval = self.config.learning.checkpoint_interval;
            if interval > 0 && (episode + 1) % interval == 0 {
                if let Some(dir) = checkpoint_dir {
                    agent.save(&dir.join(format!("checkpoint_ep{}.json", episode + 1)))?;
                }
            }
        }
        if let Some((early, late)) = report.reward_trend() {
            info!(early_avg_reward = early, late_avg_reward = late, "training finished");
        }
        Ok(report)
    }

    /// One evaluation run of a policy on the given round's workload.
    pub fn evaluate_round(&mut self, policy: &mut dyn OffloadPolicy, round: u64) -> Vec<Task> {
        self.reset_round(round);
        self.drive(|env, device_idx, mut task, now| {
            let action = policy.select(env, device_idx, &task, now);
            env.execute_action(device_idx, &mut task, action, now);
        });
        self.env
            .devices()
            .iter()
            .flat_map(|d| d.completed_tasks.iter().cloned())
            .collect()
    }

    /// Evaluate a policy over the configured number of runs.
    pub fn evaluate(&mut self, policy: &mut dyn OffloadPolicy) -> MetricsReport {
        let runs = self.config.run.evaluation_runs.max(1);
        let mut tasks = Vec::new();
        for run in 0..runs {
            tasks.extend(self.evaluate_round(policy, run as u64));
        }
        MetricsReport::from_tasks(tasks.iter(), self.config.run.warmup_s)
    }

    /// Run every baseline, and the agent when given, on identical
    /// workloads. Returns reports in a stable order.
    pub fn compare(&mut self, agent: Option<&DqnAgent>) -> Vec<(String, MetricsReport)> {
        let mut results = Vec::new();
        for kind in BaselineKind::ALL {
            let mut policy = kind.build(self.config.seed);
            let name = policy.name().to_string();
            info!(strategy = %name, "evaluating");
            results.push((name, self.evaluate(policy.as_mut())));
        }
        if let Some(agent) = agent {
            let mut policy = AgentPolicy::new(agent);
            info!(strategy = "dqn", "evaluating");
            results.push(("dqn".to_string(), self.evaluate(&mut policy)));
        }
        results
    }
}

fn workload_seed(config: &SimConfig, round: u64) -> u64 {
    config.seed.wrapping_add(round.wrapping_mul(2))
}

fn movement_seed(config: &SimConfig, round: u64) -> u64 {
    config.seed.wrapping_add(round.wrapping_mul(2)).wrapping_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::LocalOnly;

    fn small_config() -> SimConfig {
        let mut config = SimConfig::default();
        config.seed = 11;
        config.devices.count = 3;
        config.edge.count = 2;
        config.run.horizon_s = 20.0;
        config.run.tasks_per_episode = 60;
        config.run.evaluation_runs = 1;
        config.learning.training_episodes = 2;
        config.learning.batch_size = 8;
        config.learning.replay_capacity = 256;
        config
    }

    #[test]
    fn test_evaluation_is_deterministic_under_fixed_seed() {
        let config = small_config();
        let mut first = Simulation::new(config.clone());
        let mut second = Simulation::new(config);
        let a = first.evaluate(&mut LocalOnly);
        let b = second.evaluate(&mut LocalOnly);
        assert_eq!(a.tasks_completed, b.tasks_completed);
        assert_eq!(a.avg_latency_s, b.avg_latency_s);
        assert_eq!(a.total_energy_j, b.total_energy_j);
    }

    #[test]
    fn test_identical_workload_across_strategies() {
        let config = small_config();
        let mut sim = Simulation::new(config);
        let local = sim.evaluate_round(&mut LocalOnly, 0);
        let cloud = sim.evaluate_round(&mut crate::strategy::CloudOnly, 0);
        assert_eq!(local.len(), cloud.len());
        for (a, b) in local.iter().zip(cloud.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.length_mi, b.length_mi);
            assert_eq!(a.start_time, b.start_time);
        }
    }

    #[test]
    fn test_training_produces_per_episode_summaries() {
        let config = small_config();
        let episodes = config.learning.training_episodes;
        let mut sim = Simulation::new(config.clone());
        let mut agent = DqnAgent::new(
            config.state_space(),
            config.action_space(),
            config.learning.clone(),
            config.seed,
        );
        let report = sim.train(&mut agent, None).unwrap();
        assert_eq!(report.episodes.len(), episodes);
        for summary in &report.episodes {
            assert!(summary.tasks > 0);
            assert!(summary.epsilon < 1.0);
        }
        // Two decayed episodes.
        let expected = 1.0 * 0.995 * 0.995;
        assert!((agent.epsilon() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_compare_covers_all_strategies() {
        let mut config = small_config();
        config.run.tasks_per_episode = 30;
        let mut sim = Simulation::new(config.clone());
        let agent = DqnAgent::new(
            config.state_space(),
            config.action_space(),
            config.learning.clone(),
            config.seed,
        );
        let results = sim.compare(Some(&agent));
        assert_eq!(results.len(), 7);
        for (name, report) in &results {
            assert!(report.tasks_completed > 0, "{name} completed no tasks");
        }
    }

    #[test]
    fn test_horizon_bounds_the_run() {
        let mut config = small_config();
        config.run.horizon_s = 2.0;
        config.run.tasks_per_episode = 100_000;
        let mut sim = Simulation::new(config);
        let tasks = sim.evaluate_round(&mut LocalOnly, 0);
        assert!(!tasks.is_empty());
        for task in &tasks {
            assert!(task.start_time <= 2.0);
        }
    }
}
