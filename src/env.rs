//! Offloading environment: world state, the agent-facing state vector,
//! action execution against the analytic cost model, and the reward.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{RewardConfig, SimConfig};
use crate::model::{CloudResource, Device, EdgeServer, ExecutionLocation, Task};
use crate::network::{NetworkModel, nearest_in_coverage};

// State normalization divisors.
const LENGTH_SCALE_MI: f64 = 10_000.0;
const INPUT_SCALE_KB: f64 = 1_000.0;
const OUTPUT_SCALE_KB: f64 = 200.0;
const MIPS_SCALE: f64 = 5_000.0;
const DISTANCE_SCALE_M: f64 = 1_000.0;
const CAPACITY_SCALE_MIPS: f64 = 50_000.0;

/// Outcome of executing one offloading action.
#[derive(Debug, Clone, Copy)]
pub struct ActionOutcome {
    pub latency_s: f64,
    pub energy_j: f64,
    pub location: ExecutionLocation,
    pub valid: bool,
}

/// The simulated world: devices, edge servers, cloud, and the link model.
#[derive(Debug)]
pub struct OffloadingEnv {
    devices: Vec<Device>,
    edges: Vec<EdgeServer>,
    cloud: CloudResource,
    network: NetworkModel,
    reward: RewardConfig,
    initial_positions: Vec<(f64, f64)>,
}

impl OffloadingEnv {
    /// Build the world from configuration. Edge servers go on an even grid
    /// over the area; devices start at seeded random positions.
    pub fn new(config: &SimConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(0x9e3779b9));
        let width = config.mobility.area_width_m;
        let height = config.mobility.area_height_m;

        let devices: Vec<Device> = (0..config.devices.count)
            .map(|id| {
                let x = rng.gen_range(0.0..width);
                let y = rng.gen_range(0.0..height);
                Device::new(id, x, y, &config.devices)
            })
            .collect();
        let initial_positions = devices.iter().map(|d| (d.x, d.y)).collect();

        let edges = grid_positions(config.edge.count, width, height)
            .into_iter()
            .enumerate()
            .map(|(id, (x, y))| EdgeServer::new(id, x, y, &config.edge))
            .collect();

        OffloadingEnv {
            devices,
            edges,
            cloud: CloudResource::new(&config.cloud),
            network: NetworkModel::new(&config.network),
            reward: config.reward.clone(),
            initial_positions,
        }
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut [Device] {
        &mut self.devices
    }

    pub fn edges(&self) -> &[EdgeServer] {
        &self.edges
    }

    pub fn cloud(&self) -> &CloudResource {
        &self.cloud
    }

    pub fn network(&self) -> &NetworkModel {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut NetworkModel {
        &mut self.network
    }

    /// Number of available actions: local, each edge server, cloud.
    pub fn action_space(&self) -> usize {
        self.edges.len() + 2
    }

    /// State-vector length for this world.
    pub fn state_space(&self) -> usize {
        3 + 2 + 3 * self.edges.len() + 1
    }

    /// Clear per-episode accumulators and restore initial device positions.
    pub fn reset(&mut self) {
        for (device, &(x, y)) in self.devices.iter_mut().zip(&self.initial_positions) {
            device.reset();
            device.x = x;
            device.y = y;
        }
        for edge in &mut self.edges {
            edge.reset();
        }
        self.cloud.reset();
    }

    /// Observation for one pending task on one device. Every component is
    /// normalized into [0, 1].
    pub fn state(&self, device_idx: usize, task: &Task, now: f64) -> Vec<f64> {
        let device = &self.devices[device_idx];
        let mut state = Vec::with_capacity(self.state_space());
        state.push(normalize(task.length_mi, LENGTH_SCALE_MI));
        state.push(normalize(task.input_kb, INPUT_SCALE_KB));
        state.push(normalize(task.output_kb, OUTPUT_SCALE_KB));
        state.push(normalize(device.mips, MIPS_SCALE));
        state.push(device.remaining_energy_fraction());
        for edge in &self.edges {
            state.push(edge.load(now));
            state.push(normalize(edge.distance_to(device.x, device.y), DISTANCE_SCALE_M));
            state.push(normalize(edge.total_mips(), CAPACITY_SCALE_MIPS));
        }
        state.push(self.cloud.utilization(now));
        state
    }

    /// Execute the chosen action for the task, record the outcome on the
    /// originating device, and return the reward.
    pub fn execute_action(
        &mut self,
        device_idx: usize,
        task: &mut Task,
        action: usize,
        now: f64,
    ) -> f64 {
        let outcome = self.apply(device_idx, task, action, now);
        task.complete(outcome.location, outcome.latency_s, outcome.energy_j);
        let reward = self.reward_for(task, &outcome);
        task.reward = Some(reward);
        let device = &mut self.devices[device_idx];
        device.record_location(outcome.location);
        device.completed_tasks.push(task.clone());
        reward
    }

    fn apply(&mut self, device_idx: usize, task: &Task, action: usize, now: f64) -> ActionOutcome {
        let n = self.edges.len();
        if action == 0 || action > n + 1 {
            return self.apply_local(device_idx, task, action <= n + 1);
        }
        if action <= n {
            return self.apply_edge(device_idx, task, action - 1, now);
        }
        self.apply_cloud(device_idx, task, now)
    }

    fn apply_local(&mut self, device_idx: usize, task: &Task, valid: bool) -> ActionOutcome {
        let device = &mut self.devices[device_idx];
        let latency = device.local_execution_time(task.length_mi);
        let energy = device.local_energy(task.length_mi);
        device.consume_energy(energy);
        ActionOutcome {
            latency_s: latency,
            energy_j: energy,
            location: ExecutionLocation::Local,
            valid,
        }
    }

    fn apply_edge(
        &mut self,
        device_idx: usize,
        task: &Task,
        edge_idx: usize,
        now: f64,
    ) -> ActionOutcome {
        let device = &self.devices[device_idx];
        let edge = &self.edges[edge_idx];
        let distance = edge.distance_to(device.x, device.y);
        let covered = edge.in_coverage(device.x, device.y);
        let radius = edge.coverage_radius_m;
        self.edges[edge_idx].tasks_received += 1;
        if !covered {
            // Out-of-coverage target: the offload fails after a timeout of
            // twice the deadline and the server does no work.
            self.edges[edge_idx].tasks_failed += 1;
            return ActionOutcome {
                latency_s: 2.0 * task.deadline_s,
                energy_j: 0.0,
                location: ExecutionLocation::Edge(edge_idx),
                valid: false,
            };
        }
        let comm =
            self.network
                .edge_offload_time(task.input_kb, task.output_kb, distance, radius);
        let proc = self.edges[edge_idx].execution_time(task.length_mi, now);
        let energy = self.devices[device_idx].offloading_energy(task.input_kb, task.output_kb);
        self.edges[edge_idx].register_execution(proc, task.length_mi);
        self.devices[device_idx].consume_energy(energy);
        ActionOutcome {
            latency_s: comm + proc,
            energy_j: energy,
            location: ExecutionLocation::Edge(edge_idx),
            valid: true,
        }
    }

    fn apply_cloud(&mut self, device_idx: usize, task: &Task, now: f64) -> ActionOutcome {
        let device = &self.devices[device_idx];
        // Relay through the nearest in-coverage edge server. Without one,
        // the device reaches the cloud directly over the mobile link at
        // nominal bandwidth.
        let comm = match nearest_in_coverage(&self.edges, device.x, device.y) {
            Some(relay) => {
                let edge = &self.edges[relay];
                self.network.cloud_offload_time(
                    task.input_kb,
                    task.output_kb,
                    edge.distance_to(device.x, device.y),
                    edge.coverage_radius_m,
                )
            }
            None => self.network.cloud_offload_time(task.input_kb, task.output_kb, 0.0, 1.0),
        };
        let proc = self.cloud.execution_time(task.length_mi);
        let energy = device.offloading_energy(task.input_kb, task.output_kb);
        self.cloud.register_execution(proc);
        self.devices[device_idx].consume_energy(energy);
        ActionOutcome {
            latency_s: comm + proc,
            energy_j: energy,
            location: ExecutionLocation::Cloud,
            valid: true,
        }
    }

    fn reward_for(&self, task: &Task, outcome: &ActionOutcome) -> f64 {
        let r = &self.reward;
        if !outcome.valid {
            return -r.invalid_penalty;
        }
        let latency = outcome.latency_s;
        let deadline = task.deadline_s;
        if latency <= deadline {
            let mut reward = r.deadline_bonus;
            reward += (1.0 - (latency / deadline).min(1.0)) * r.latency_bonus;
            reward += (1.0 - (outcome.energy_j / r.energy_cap_j).min(1.0)) * r.energy_bonus;
            if matches!(outcome.location, ExecutionLocation::Edge(_)) {
                reward += (1.0 - self.load_imbalance(task.start_time + latency)) * r.load_balance_bonus;
            }
            reward
        } else {
            -r.miss_penalty - (latency - deadline) / deadline * r.miss_ratio_penalty
        }
    }

    /// Load imbalance across edge servers: standard deviation of their
    /// utilizations, capped at 1. Zero when there is at most one server.
    pub fn load_imbalance(&self, now: f64) -> f64 {
        if self.edges.len() <= 1 {
            return 0.0;
        }
        let loads: Vec<f64> = self.edges.iter().map(|e| e.load(now)).collect();
        let mean = loads.iter().sum::<f64>() / loads.len() as f64;
        let variance =
            loads.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / loads.len() as f64;
        variance.sqrt().min(1.0)
    }
}

fn normalize(value: f64, scale: f64) -> f64 {
    (value / scale).clamp(0.0, 1.0)
}

/// Even grid placement for `count` servers over the area.
fn grid_positions(count: usize, width: f64, height: f64) -> Vec<(f64, f64)> {
    if count == 0 {
        return Vec::new();
    }
    let cols = (count as f64).sqrt().ceil() as usize;
    let rows = count.div_ceil(cols);
    (0..count)
        .map(|i| {
            let col = i % cols;
            let row = i / cols;
            let x = (col as f64 + 0.5) * width / cols as f64;
            let y = (row as f64 + 0.5) * height / rows as f64;
            (x, y)
        })
        .collect()
}
