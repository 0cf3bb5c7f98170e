use serde::{Deserialize, Serialize};

use crate::config::CloudConfig;

/// The remote cloud: effectively unbounded capacity, reached over the
/// backbone through an edge relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudResource {
    pub hosts: u32,
    pub pes_per_host: u32,
    /// Per-host compute rate; a task runs on a single host.
    pub mips_per_host: f64,
    pub bandwidth_mbps: f64,
    pub busy_time_s: f64,
    pub tasks_executed: u64,
}

impl CloudResource {
    pub fn new(config: &CloudConfig) -> Self {
        CloudResource {
            hosts: config.hosts,
            pes_per_host: config.pes_per_host,
            mips_per_host: config.mips_per_host,
            bandwidth_mbps: config.bandwidth_mbps,
            busy_time_s: 0.0,
            tasks_executed: 0,
        }
    }

    /// Processing time on one cloud host.
    pub fn execution_time(&self, length_mi: f64) -> f64 {
        length_mi / self.mips_per_host
    }

    /// Aggregate utilization in [0, 1] across all hosts.
    pub fn utilization(&self, now: f64) -> f64 {
        if now <= 0.0 {
            return 0.0;
        }
        let capacity_s = now * f64::from(self.hosts) * f64::from(self.pes_per_host);
        (self.busy_time_s / capacity_s).min(1.0)
    }

    pub fn register_execution(&mut self, processing_time_s: f64) {
        self.busy_time_s += processing_time_s;
        self.tasks_executed += 1;
    }

    pub fn reset(&mut self) {
        self.busy_time_s = 0.0;
        self.tasks_executed = 0;
    }
}
