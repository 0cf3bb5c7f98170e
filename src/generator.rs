//! Synthetic workload generation: task parameter synthesis and
//! inter-arrival processes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};

use crate::config::TaskConfig;
use crate::model::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArrivalPattern {
    /// Fixed inter-arrival gap of 1/rate.
    Uniform,
    /// Exponentially distributed inter-arrival gaps.
    Poisson,
    /// Poisson with a 20% chance of a 5x-rate burst per arrival.
    Bursty,
    /// Poisson with an hour-of-day rate multiplier.
    Diurnal,
}

impl Default for ArrivalPattern {
    fn default() -> Self {
        ArrivalPattern::Poisson
    }
}

/// Seeded generator producing tasks and the times at which they arrive.
#[derive(Debug)]
pub struct TaskGenerator {
    config: TaskConfig,
    rng: StdRng,
    next_id: u64,
}

impl TaskGenerator {
    pub fn new(config: TaskConfig, seed: u64) -> Self {
        TaskGenerator {
            config,
            rng: StdRng::seed_from_u64(seed),
            next_id: 0,
        }
    }

    /// Restart the stream: same seed reproduces the same workload.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
        self.next_id = 0;
    }

    /// Synthesize one task starting at `now` on the given device. All
    /// parameters are uniform over their configured ranges.
    pub fn next_task(&mut self, device_id: usize, now: f64) -> Task {
        let c = &self.config;
        let task = Task::new(
            self.next_id,
            device_id,
            self.rng.gen_range(c.min_length_mi..=c.max_length_mi),
            self.rng.gen_range(c.min_input_kb..=c.max_input_kb),
            self.rng.gen_range(c.min_output_kb..=c.max_output_kb),
            self.rng.gen_range(c.min_deadline_s..=c.max_deadline_s),
            now,
        );
        self.next_id += 1;
        task
    }

    /// Gap until a device's next task arrival, given the current time.
    pub fn next_interarrival(&mut self, now: f64) -> f64 {
        let rate = self.effective_rate(now);
        match self.config.arrival_pattern {
            ArrivalPattern::Uniform => 1.0 / rate,
            ArrivalPattern::Poisson | ArrivalPattern::Bursty | ArrivalPattern::Diurnal => {
                match Exp::new(rate) {
                    Ok(exp) => exp.sample(&mut self.rng),
                    Err(_) => 1.0 / rate,
                }
            }
        }
    }

    fn effective_rate(&mut self, now: f64) -> f64 {
        let base = self.config.arrival_rate;
        match self.config.arrival_pattern {
            ArrivalPattern::Bursty => {
                if self.rng.gen_bool(0.2) {
                    base * 5.0
                } else {
                    base
                }
            }
            ArrivalPattern::Diurnal => base * diurnal_multiplier(now),
            _ => base,
        }
    }
}

/// Hour-of-day rate multiplier: quiet nights, a morning ramp, a busy
/// working day and an evening ramp-down.
fn diurnal_multiplier(now_s: f64) -> f64 {
    let hour = (now_s / 3600.0) % 24.0;
    if hour < 6.0 {
        0.2
    } else if hour < 9.0 {
        0.2 + (hour - 6.0) / 3.0 * 1.8
    } else if hour < 17.0 {
        2.0
    } else if hour < 22.0 {
        2.0 - (hour - 17.0) / 5.0 * 1.8
    } else {
        0.2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pattern: ArrivalPattern) -> TaskConfig {
        TaskConfig {
            arrival_pattern: pattern,
            ..TaskConfig::default()
        }
    }

    #[test]
    fn test_task_parameters_within_ranges() {
        let cfg = config(ArrivalPattern::Poisson);
        let mut generator = TaskGenerator::new(cfg.clone(), 3);
        for _ in 0..500 {
            let task = generator.next_task(0, 1.0);
            assert!(task.length_mi >= cfg.min_length_mi && task.length_mi <= cfg.max_length_mi);
            assert!(task.input_kb >= cfg.min_input_kb && task.input_kb <= cfg.max_input_kb);
            assert!(task.output_kb >= cfg.min_output_kb && task.output_kb <= cfg.max_output_kb);
            assert!(task.deadline_s >= cfg.min_deadline_s && task.deadline_s <= cfg.max_deadline_s);
        }
    }

    #[test]
    fn test_task_ids_monotonic() {
        let mut generator = TaskGenerator::new(config(ArrivalPattern::Poisson), 3);
        let ids: Vec<u64> = (0..10).map(|_| generator.next_task(0, 0.0).id).collect();
        assert_eq!(ids, (0..10).collect::<Vec<u64>>());
    }

    #[test]
    fn test_uniform_interarrival_is_fixed() {
        let mut generator = TaskGenerator::new(config(ArrivalPattern::Uniform), 3);
        for _ in 0..10 {
            assert!((generator.next_interarrival(0.0) - 0.2).abs() < 1e-12);
        }
    }

    #[test]
    fn test_poisson_mean_roughly_inverse_rate() {
        let mut generator = TaskGenerator::new(config(ArrivalPattern::Poisson), 42);
        let n = 20_000;
        let total: f64 = (0..n).map(|_| generator.next_interarrival(0.0)).sum();
        let mean = total / f64::from(n);
        assert!((mean - 0.2).abs() < 0.02, "mean {mean}");
    }

    #[test]
    fn test_reseed_reproduces_workload() {
        let mut generator = TaskGenerator::new(config(ArrivalPattern::Bursty), 9);
        let first: Vec<f64> = (0..20).map(|_| generator.next_interarrival(0.0)).collect();
        generator.reseed(9);
        let second: Vec<f64> = (0..20).map(|_| generator.next_interarrival(0.0)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_diurnal_multiplier_shape() {
        assert!((diurnal_multiplier(2.0 * 3600.0) - 0.2).abs() < 1e-12);
        assert!((diurnal_multiplier(7.5 * 3600.0) - 1.1).abs() < 1e-12);
        assert!((diurnal_multiplier(12.0 * 3600.0) - 2.0).abs() < 1e-12);
        assert!((diurnal_multiplier(19.5 * 3600.0) - 1.1).abs() < 1e-12);
        assert!((diurnal_multiplier(23.0 * 3600.0) - 0.2).abs() < 1e-12);
    }
}
