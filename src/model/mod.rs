//! Simulated entities: tasks, mobile devices, edge servers, cloud.

mod cloud;
mod device;
mod edge;
mod task;

pub use cloud::CloudResource;
pub use device::Device;
pub use edge::EdgeServer;
pub use task::{ExecutionLocation, Task};
