//! Edge computing task-offloading simulator.
//!
//! Simulates mobile/IoT devices that decide, per generated task, whether to
//! execute locally, offload to a coverage-limited edge server, or send to a
//! remote cloud resource. A DQN agent with experience replay is trained
//! against the analytic cost model and compared with deterministic baseline
//! policies on identical synthetic workloads.

pub mod agent;
pub mod config;
pub mod env;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod mobility;
pub mod model;
pub mod network;
pub mod sim;
pub mod strategy;
