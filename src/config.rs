//! Simulation configuration.
//!
//! All components receive an immutable [`SimConfig`] (or a section of it) at
//! construction. Values load from a JSON file with per-field defaults; a
//! malformed file degrades to the documented defaults with a warning rather
//! than aborting the run. Entity-invariant violations (non-positive compute
//! rates, bandwidths, arrival rates) are rejected up front.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EdgesimError, Result};
use crate::generator::ArrivalPattern;
use crate::mobility::MobilityPattern;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SimConfig {
    pub seed: u64,
    pub devices: DeviceConfig,
    pub edge: EdgeConfig,
    pub cloud: CloudConfig,
    pub network: NetworkConfig,
    pub tasks: TaskConfig,
    pub mobility: MobilityConfig,
    pub learning: LearningConfig,
    pub reward: RewardConfig,
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub count: usize,
    /// Compute rate in million instructions per second.
    pub mips: f64,
    pub ram_mb: u32,
    pub storage_mb: u32,
    pub bandwidth_mbps: f64,
    pub idle_power_w: f64,
    pub compute_power_w: f64,
    pub transmit_power_w: f64,
    pub receive_power_w: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    pub count: usize,
    pub mips: f64,
    pub pes: u32,
    pub bandwidth_mbps: f64,
    pub coverage_radius_m: f64,
    pub idle_power_w: f64,
    pub compute_power_w: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub hosts: u32,
    pub pes_per_host: u32,
    pub mips_per_host: f64,
    pub bandwidth_mbps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub mobile_to_edge_bandwidth_mbps: f64,
    pub edge_to_cloud_bandwidth_mbps: f64,
    pub mobile_to_edge_latency_ms: f64,
    pub edge_to_cloud_latency_ms: f64,
    /// Mobile link quality factor, clamped to [0.1, 1.0].
    pub mobile_quality: f64,
    /// Backbone link quality factor, clamped to [0.1, 1.0].
    pub backbone_quality: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub min_length_mi: f64,
    pub max_length_mi: f64,
    pub min_input_kb: f64,
    pub max_input_kb: f64,
    pub min_output_kb: f64,
    pub max_output_kb: f64,
    /// Deadlines are relative to the task's start time, in seconds.
    pub min_deadline_s: f64,
    pub max_deadline_s: f64,
    pub arrival_pattern: ArrivalPattern,
    /// Mean arrival rate in tasks per second, per device.
    pub arrival_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MobilityConfig {
    pub pattern: MobilityPattern,
    pub area_width_m: f64,
    pub area_height_m: f64,
    pub min_speed_mps: f64,
    pub max_speed_mps: f64,
    pub update_interval_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    pub learning_rate: f64,
    pub discount_factor: f64,
    pub exploration_rate: f64,
    /// Multiplicative epsilon decay applied once per episode.
    pub exploration_decay: f64,
    pub exploration_floor: f64,
    pub batch_size: usize,
    pub replay_capacity: usize,
    /// Hard target-network sync period, in train() calls.
    pub target_update_frequency: usize,
    pub training_episodes: usize,
    /// Train every N offloading decisions during an episode.
    pub train_interval: usize,
    /// Save a model checkpoint every N episodes (0 disables).
    pub checkpoint_interval: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub deadline_bonus: f64,
    pub latency_bonus: f64,
    pub energy_bonus: f64,
    pub load_balance_bonus: f64,
    pub miss_penalty: f64,
    pub miss_ratio_penalty: f64,
    pub invalid_penalty: f64,
    /// Energy normalization cap in Joules for the reward shaping term.
    pub energy_cap_j: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Simulated-time horizon per episode/run, in seconds.
    pub horizon_s: f64,
    /// Expected task count per episode/run; the loop stops at whichever of
    /// horizon or count is reached first.
    pub tasks_per_episode: usize,
    pub evaluation_runs: usize,
    /// Tasks starting before this instant are excluded from metrics.
    pub warmup_s: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            count: 10,
            mips: 1000.0,
            ram_mb: 1024,
            storage_mb: 16384,
            bandwidth_mbps: 100.0,
            idle_power_w: 0.1,
            compute_power_w: 0.9,
            transmit_power_w: 1.3,
            receive_power_w: 1.1,
        }
    }
}

impl Default for EdgeConfig {
    fn default() -> Self {
        EdgeConfig {
            count: 3,
            mips: 4000.0,
            pes: 4,
            bandwidth_mbps: 1000.0,
            coverage_radius_m: 400.0,
            idle_power_w: 50.0,
            compute_power_w: 200.0,
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        CloudConfig {
            hosts: 2,
            pes_per_host: 2,
            mips_per_host: 10000.0,
            bandwidth_mbps: 10000.0,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            mobile_to_edge_bandwidth_mbps: 100.0,
            edge_to_cloud_bandwidth_mbps: 1000.0,
            mobile_to_edge_latency_ms: 10.0,
            edge_to_cloud_latency_ms: 50.0,
            mobile_quality: 0.9,
            backbone_quality: 0.95,
        }
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        TaskConfig {
            min_length_mi: 10.0,
            max_length_mi: 500.0,
            min_input_kb: 10.0,
            max_input_kb: 1000.0,
            min_output_kb: 1.0,
            max_output_kb: 100.0,
            min_deadline_s: 2.0,
            max_deadline_s: 20.0,
            arrival_pattern: ArrivalPattern::Poisson,
            arrival_rate: 5.0,
        }
    }
}

impl Default for MobilityConfig {
    fn default() -> Self {
        MobilityConfig {
            pattern: MobilityPattern::RandomWalk,
            area_width_m: 1000.0,
            area_height_m: 1000.0,
            min_speed_mps: 0.5,
            max_speed_mps: 2.0,
            update_interval_s: 1.0,
        }
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        LearningConfig {
            learning_rate: 0.001,
            discount_factor: 0.95,
            exploration_rate: 1.0,
            exploration_decay: 0.995,
            exploration_floor: 0.01,
            batch_size: 32,
            replay_capacity: 1000,
            target_update_frequency: 100,
            training_episodes: 100,
            train_interval: 10,
            checkpoint_interval: 0,
        }
    }
}

impl Default for RewardConfig {
    fn default() -> Self {
        RewardConfig {
            deadline_bonus: 10.0,
            latency_bonus: 5.0,
            energy_bonus: 3.0,
            load_balance_bonus: 2.0,
            miss_penalty: 5.0,
            miss_ratio_penalty: 10.0,
            invalid_penalty: 20.0,
            energy_cap_j: 5.0,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            horizon_s: 100.0,
            tasks_per_episode: 200,
            evaluation_runs: 1,
            warmup_s: 0.0,
        }
    }
}

impl SimConfig {
    /// Load configuration from a JSON file.
    ///
    /// A missing or unparseable file falls back to defaults with a warning;
    /// a file that parses but violates entity invariants is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let config = match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str::<SimConfig>(&text) {
                Ok(config) => config,
                Err(err) => {
                    warn!(path = %path.display(), %err, "malformed config, using defaults");
                    SimConfig::default()
                }
            },
            Err(err) => {
                warn!(path = %path.display(), %err, "cannot read config, using defaults");
                SimConfig::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that violate entity invariants.
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: f64) -> Result<()> {
            if value > 0.0 {
                Ok(())
            } else {
                Err(EdgesimError::Config(format!(
                    "{name} must be positive, got {value}"
                )))
            }
        }

        positive("devices.mips", self.devices.mips)?;
        positive("devices.bandwidth_mbps", self.devices.bandwidth_mbps)?;
        positive("edge.mips", self.edge.mips)?;
        positive("edge.bandwidth_mbps", self.edge.bandwidth_mbps)?;
        positive("cloud.mips_per_host", self.cloud.mips_per_host)?;
        positive("cloud.bandwidth_mbps", self.cloud.bandwidth_mbps)?;
        positive(
            "network.mobile_to_edge_bandwidth_mbps",
            self.network.mobile_to_edge_bandwidth_mbps,
        )?;
        positive(
            "network.edge_to_cloud_bandwidth_mbps",
            self.network.edge_to_cloud_bandwidth_mbps,
        )?;
        positive("tasks.arrival_rate", self.tasks.arrival_rate)?;
        positive("tasks.min_deadline_s", self.tasks.min_deadline_s)?;
        if self.devices.count == 0 {
            return Err(EdgesimError::Config("devices.count must be at least 1".into()));
        }
        if self.mobility.update_interval_s <= 0.0 {
            return Err(EdgesimError::Config(
                "mobility.update_interval_s must be positive".into(),
            ));
        }
        Ok(())
    }

    /// State-vector dimension for the configured edge-server count.
    pub fn state_space(&self) -> usize {
        3 + 2 + 3 * self.edge.count + 1
    }

    /// Action-space size: local + one per edge server + cloud.
    pub fn action_space(&self) -> usize {
        self.edge.count + 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.state_space(), 3 + 2 + 3 * 3 + 1);
        assert_eq!(config.action_space(), 5);
    }

    #[test]
    fn test_zero_edge_servers_shrinks_spaces() {
        let mut config = SimConfig::default();
        config.edge.count = 0;
        assert_eq!(config.action_space(), 2);
        assert_eq!(config.state_space(), 6);
    }

    #[test]
    fn test_nonpositive_rate_rejected() {
        let mut config = SimConfig::default();
        config.devices.mips = 0.0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.tasks.arrival_rate = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = SimConfig::load(Path::new("/definitely/not/here.json")).unwrap();
        assert_eq!(config.devices.count, SimConfig::default().devices.count);
    }
}
