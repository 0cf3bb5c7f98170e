use serde::{Deserialize, Serialize};

use crate::config::DeviceConfig;
use crate::model::{ExecutionLocation, Task};

/// Battery budget in Joules used to normalize remaining energy.
pub const BATTERY_BUDGET_J: f64 = 100.0;

/// A mobile/IoT device: the origin of tasks and the local execution option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    /// Compute rate in million instructions per second.
    pub mips: f64,
    pub ram_mb: u32,
    pub storage_mb: u32,
    pub bandwidth_mbps: f64,
    pub idle_power_w: f64,
    pub compute_power_w: f64,
    pub transmit_power_w: f64,
    pub receive_power_w: f64,
    /// Cumulative energy drawn since the device was created or reset.
    pub energy_consumed_j: f64,
    pub local_executions: u64,
    pub edge_executions: u64,
    pub cloud_executions: u64,
    /// Outcomes of every task this device originated.
    pub completed_tasks: Vec<Task>,
}

impl Device {
    pub fn new(id: usize, x: f64, y: f64, config: &DeviceConfig) -> Self {
        Device {
            id,
            x,
            y,
            mips: config.mips,
            ram_mb: config.ram_mb,
            storage_mb: config.storage_mb,
            bandwidth_mbps: config.bandwidth_mbps,
            idle_power_w: config.idle_power_w,
            compute_power_w: config.compute_power_w,
            transmit_power_w: config.transmit_power_w,
            receive_power_w: config.receive_power_w,
            energy_consumed_j: 0.0,
            local_executions: 0,
            edge_executions: 0,
            cloud_executions: 0,
            completed_tasks: Vec::new(),
        }
    }

    /// Execution time for a task run on this device, in seconds.
    pub fn local_execution_time(&self, length_mi: f64) -> f64 {
        length_mi / self.mips
    }

    /// Energy drawn by local execution.
    pub fn local_energy(&self, length_mi: f64) -> f64 {
        self.compute_power_w * self.local_execution_time(length_mi)
    }

    /// Radio energy for offloading: transmit the input, receive the output,
    /// both at the device's nominal uplink bandwidth.
    pub fn offloading_energy(&self, input_kb: f64, output_kb: f64) -> f64 {
        let tx_time = input_kb * 8.0 / (self.bandwidth_mbps * 1000.0);
        let rx_time = output_kb * 8.0 / (self.bandwidth_mbps * 1000.0);
        self.transmit_power_w * tx_time + self.receive_power_w * rx_time
    }

    pub fn consume_energy(&mut self, joules: f64) {
        self.energy_consumed_j += joules;
    }

    /// Remaining energy fraction in [0, 1] against the nominal battery budget.
    pub fn remaining_energy_fraction(&self) -> f64 {
        (1.0 - self.energy_consumed_j / BATTERY_BUDGET_J).clamp(0.0, 1.0)
    }

    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        ((self.x - x).powi(2) + (self.y - y).powi(2)).sqrt()
    }

    /// Count one executed task toward its location bucket.
    pub fn record_location(&mut self, location: ExecutionLocation) {
        match location {
            ExecutionLocation::Local => self.local_executions += 1,
            ExecutionLocation::Edge(_) => self.edge_executions += 1,
            ExecutionLocation::Cloud => self.cloud_executions += 1,
        }
    }

    /// Clear per-episode accumulators while keeping identity and position.
    pub fn reset(&mut self) {
        self.energy_consumed_j = 0.0;
        self.local_executions = 0;
        self.edge_executions = 0;
        self.cloud_executions = 0;
        self.completed_tasks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> Device {
        Device::new(0, 100.0, 200.0, &DeviceConfig::default())
    }

    #[test]
    fn test_local_execution_time() {
        let dev = device();
        // 100 MI at 1000 MIPS.
        assert!((dev.local_execution_time(100.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_local_energy_scales_with_time() {
        let dev = device();
        let energy = dev.local_energy(1000.0);
        assert!((energy - dev.compute_power_w * 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_remaining_energy_clamps() {
        let mut dev = device();
        assert!((dev.remaining_energy_fraction() - 1.0).abs() < 1e-12);
        dev.consume_energy(50.0);
        assert!((dev.remaining_energy_fraction() - 0.5).abs() < 1e-12);
        dev.consume_energy(1000.0);
        assert_eq!(dev.remaining_energy_fraction(), 0.0);
    }

    #[test]
    fn test_location_counters() {
        let mut dev = device();
        dev.record_location(ExecutionLocation::Local);
        dev.record_location(ExecutionLocation::Edge(1));
        dev.record_location(ExecutionLocation::Cloud);
        dev.record_location(ExecutionLocation::Cloud);
        assert_eq!(
            (dev.local_executions, dev.edge_executions, dev.cloud_executions),
            (1, 1, 2)
        );
        dev.reset();
        assert_eq!(
            (dev.local_executions, dev.edge_executions, dev.cloud_executions),
            (0, 0, 0)
        );
    }

    #[test]
    fn test_distance() {
        let dev = device();
        assert!((dev.distance_to(100.0, 200.0)).abs() < 1e-12);
        assert!((dev.distance_to(103.0, 204.0) - 5.0).abs() < 1e-12);
    }
}
