use serde::{Deserialize, Serialize};

use crate::config::EdgeConfig;

/// Floor on the usable capacity fraction of a fully loaded server.
const MIN_CAPACITY_FRACTION: f64 = 0.05;

/// An edge server with limited coverage and load-dependent capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeServer {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    /// Per-processing-element compute rate.
    pub mips: f64,
    pub pes: u32,
    pub coverage_radius_m: f64,
    pub idle_power_w: f64,
    pub compute_power_w: f64,
    /// Accumulated busy time across executed tasks, in seconds.
    pub busy_time_s: f64,
    pub energy_consumed_j: f64,
    /// Offloads directed at this server, including failed ones.
    pub tasks_received: u64,
    pub tasks_executed: u64,
    /// Offloads that failed because the device was out of coverage.
    pub tasks_failed: u64,
    pub instructions_executed_mi: f64,
}

impl EdgeServer {
    pub fn new(id: usize, x: f64, y: f64, config: &EdgeConfig) -> Self {
        EdgeServer {
            id,
            x,
            y,
            mips: config.mips,
            pes: config.pes,
            coverage_radius_m: config.coverage_radius_m,
            idle_power_w: config.idle_power_w,
            compute_power_w: config.compute_power_w,
            busy_time_s: 0.0,
            energy_consumed_j: 0.0,
            tasks_received: 0,
            tasks_executed: 0,
            tasks_failed: 0,
            instructions_executed_mi: 0.0,
        }
    }

    /// Total nominal capacity across all processing elements.
    pub fn total_mips(&self) -> f64 {
        self.mips * f64::from(self.pes)
    }

    /// Utilization in [0, 1]: fraction of elapsed time spent busy.
    pub fn load(&self, now: f64) -> f64 {
        if now <= 0.0 {
            return 0.0;
        }
        (self.busy_time_s / now).min(1.0)
    }

    /// Capacity left after load, floored so a saturated server still makes
    /// progress instead of stalling the cost model.
    pub fn effective_mips(&self, now: f64) -> f64 {
        self.total_mips() * (1.0 - self.load(now)).max(MIN_CAPACITY_FRACTION)
    }

    /// Processing time for a task under current load.
    pub fn execution_time(&self, length_mi: f64, now: f64) -> f64 {
        length_mi / self.effective_mips(now)
    }

    pub fn in_coverage(&self, x: f64, y: f64) -> bool {
        self.distance_to(x, y) <= self.coverage_radius_m
    }

    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        ((self.x - x).powi(2) + (self.y - y).powi(2)).sqrt()
    }

    /// Account for one executed task.
    pub fn register_execution(&mut self, processing_time_s: f64, length_mi: f64) {
        self.busy_time_s += processing_time_s;
        self.energy_consumed_j += self.compute_power_w * processing_time_s;
        self.tasks_executed += 1;
        self.instructions_executed_mi += length_mi;
    }

    pub fn reset(&mut self) {
        self.busy_time_s = 0.0;
        self.energy_consumed_j = 0.0;
        self.tasks_received = 0;
        self.tasks_executed = 0;
        self.tasks_failed = 0;
        self.instructions_executed_mi = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> EdgeServer {
        EdgeServer::new(0, 500.0, 500.0, &EdgeConfig::default())
    }

    #[test]
    fn test_load_zero_before_any_work() {
        let srv = server();
        assert_eq!(srv.load(10.0), 0.0);
        assert_eq!(srv.load(0.0), 0.0);
    }

    #[test]
    fn test_load_caps_at_one() {
        let mut srv = server();
        srv.register_execution(50.0, 1000.0);
        assert!((srv.load(100.0) - 0.5).abs() < 1e-12);
        assert_eq!(srv.load(10.0), 1.0);
    }

    #[test]
    fn test_effective_mips_floor() {
        let mut srv = server();
        srv.register_execution(100.0, 1000.0);
        // Fully loaded, capacity floors at 5% of nominal.
        let floor = srv.total_mips() * 0.05;
        assert!((srv.effective_mips(100.0) - floor).abs() < 1e-9);
    }

    #[test]
    fn test_coverage_boundary_inclusive() {
        let srv = server();
        assert!(srv.in_coverage(500.0, 500.0 + srv.coverage_radius_m));
        assert!(!srv.in_coverage(500.0, 500.0 + srv.coverage_radius_m + 0.001));
    }
}
