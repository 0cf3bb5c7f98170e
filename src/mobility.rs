//! Device movement models over a bounded rectangular area.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::MobilityConfig;
use crate::model::Device;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MobilityPattern {
    Static,
    RandomWalk,
    RandomWaypoint,
    /// Accepted for compatibility; moves devices like [`Self::RandomWalk`].
    GroupMobility,
}

impl Default for MobilityPattern {
    fn default() -> Self {
        MobilityPattern::RandomWalk
    }
}

#[derive(Debug, Clone)]
struct WalkState {
    heading: f64,
    speed: f64,
}

#[derive(Debug, Clone)]
struct WaypointState {
    target_x: f64,
    target_y: f64,
    speed: f64,
}

/// Moves devices on a fixed interval. Owns its own seeded RNG so movement
/// is reproducible independently of workload generation.
#[derive(Debug)]
pub struct MobilityModel {
    pattern: MobilityPattern,
    width: f64,
    height: f64,
    min_speed: f64,
    max_speed: f64,
    rng: StdRng,
    walk: Vec<WalkState>,
    waypoint: Vec<WaypointState>,
}

impl MobilityModel {
    pub fn new(config: &MobilityConfig, device_count: usize, seed: u64) -> Self {
        if config.pattern == MobilityPattern::GroupMobility {
            warn!("GROUP_MOBILITY is not modeled separately, devices follow RANDOM_WALK");
        }
        let mut model = MobilityModel {
            pattern: config.pattern,
            width: config.area_width_m,
            height: config.area_height_m,
            min_speed: config.min_speed_mps,
            max_speed: config.max_speed_mps,
            rng: StdRng::seed_from_u64(seed),
            walk: Vec::with_capacity(device_count),
            waypoint: Vec::with_capacity(device_count),
        };
        model.draw_states(device_count);
        model
    }

    /// Reinitialize the RNG and per-device movement state. Draws happen in
    /// the same order as construction, so equal seeds replay equal
    /// trajectories.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
        let count = self.walk.len();
        self.draw_states(count);
    }

    fn draw_states(&mut self, device_count: usize) {
        self.walk.clear();
        self.waypoint.clear();
        for _ in 0..device_count {
            self.walk.push(WalkState {
                heading: self.rng.gen_range(0.0..2.0 * PI),
                speed: self.rng.gen_range(self.min_speed..=self.max_speed),
            });
            self.waypoint.push(WaypointState {
                target_x: self.rng.gen_range(0.0..self.width),
                target_y: self.rng.gen_range(0.0..self.height),
                speed: self.rng.gen_range(self.min_speed..=self.max_speed),
            });
        }
    }

    /// Advance every device by one interval of `dt_s` seconds.
    pub fn update(&mut self, devices: &mut [Device], dt_s: f64) {
        match self.pattern {
            MobilityPattern::Static => {}
            MobilityPattern::RandomWalk | MobilityPattern::GroupMobility => {
                for device in devices.iter_mut() {
                    self.step_walk(device, dt_s);
                }
            }
            MobilityPattern::RandomWaypoint => {
                for device in devices.iter_mut() {
                    self.step_waypoint(device, dt_s);
                }
            }
        }
    }

    fn step_walk(&mut self, device: &mut Device, dt_s: f64) {
        let state = &mut self.walk[device.id];
        let mut new_x = device.x + state.speed * state.heading.cos() * dt_s;
        let mut new_y = device.y + state.speed * state.heading.sin() * dt_s;
        let mut bounced = false;

        if new_x < 0.0 {
            new_x = -new_x;
            state.heading = PI - state.heading;
            bounced = true;
        } else if new_x > self.width {
            new_x = 2.0 * self.width - new_x;
            state.heading = PI - state.heading;
            bounced = true;
        }
        if new_y < 0.0 {
            new_y = -new_y;
            state.heading = 2.0 * PI - state.heading;
            bounced = true;
        } else if new_y > self.height {
            new_y = 2.0 * self.height - new_y;
            state.heading = 2.0 * PI - state.heading;
            bounced = true;
        }

        device.x = new_x.clamp(0.0, self.width);
        device.y = new_y.clamp(0.0, self.height);

        // Occasional heading perturbation, skipped on a bounce step.
        if !bounced && self.rng.gen_bool(0.1) {
            state.heading += self.rng.gen_range(-PI / 4.0..=PI / 4.0);
        }
    }

    fn step_waypoint(&mut self, device: &mut Device, dt_s: f64) {
        let state = &mut self.waypoint[device.id];
        let dx = state.target_x - device.x;
        let dy = state.target_y - device.y;
        let distance = (dx * dx + dy * dy).sqrt();
        let step = state.speed * dt_s;

        if distance <= step {
            device.x = state.target_x;
            device.y = state.target_y;
            state.target_x = self.rng.gen_range(0.0..self.width);
            state.target_y = self.rng.gen_range(0.0..self.height);
            if self.rng.gen_bool(0.3) {
                // Pause phase: crawl toward the next target.
                state.speed *= 0.1;
            } else {
                state.speed = self.rng.gen_range(self.min_speed..=self.max_speed);
            }
        } else {
            device.x += dx / distance * step;
            device.y += dy / distance * step;
        }
    }
}
