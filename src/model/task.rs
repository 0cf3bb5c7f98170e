use serde::{Deserialize, Serialize};

/// Where a task ended up executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionLocation {
    Local,
    Edge(usize),
    Cloud,
}

impl ExecutionLocation {
    /// Stable label used for per-location metric buckets.
    pub fn label(&self) -> String {
        match self {
            ExecutionLocation::Local => "local".to_string(),
            ExecutionLocation::Edge(idx) => format!("edge{idx}"),
            ExecutionLocation::Cloud => "cloud".to_string(),
        }
    }
}

/// A single offloadable unit of work.
///
/// The deadline is relative: a task meets its deadline when realized
/// end-to-end latency stays at or below `deadline_s`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub device_id: usize,
    /// Compute demand in million instructions.
    pub length_mi: f64,
    pub input_kb: f64,
    pub output_kb: f64,
    pub deadline_s: f64,
    pub start_time: f64,
    pub finish_time: Option<f64>,
    pub latency_s: Option<f64>,
    pub energy_j: Option<f64>,
    pub reward: Option<f64>,
    pub location: Option<ExecutionLocation>,
}

impl Task {
    pub fn new(
        id: u64,
        device_id: usize,
        length_mi: f64,
        input_kb: f64,
        output_kb: f64,
        deadline_s: f64,
        start_time: f64,
    ) -> Self {
        Task {
            id,
            device_id,
            length_mi,
            input_kb,
            output_kb,
            deadline_s,
            start_time,
            finish_time: None,
            latency_s: None,
            energy_j: None,
            reward: None,
            location: None,
        }
    }

    /// Record the execution outcome.
    pub fn complete(&mut self, location: ExecutionLocation, latency_s: f64, energy_j: f64) {
        self.location = Some(location);
        self.latency_s = Some(latency_s);
        self.finish_time = Some(self.start_time + latency_s);
        self.energy_j = Some(energy_j);
    }

    pub fn is_completed(&self) -> bool {
        self.latency_s.is_some()
    }

    pub fn deadline_met(&self) -> bool {
        match self.latency_s {
            Some(latency) => latency <= self.deadline_s,
            None => false,
        }
    }
}
