pub mod agent;
pub mod config;
pub mod driver;
pub mod registry;
pub mod snapshot;
pub mod steering;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use agent::{AgentHandle, AgentId, AgentWorker, Kind, Liveness};
pub use config::{SimParams, SimulationConfig};
pub use driver::Driver;
pub use registry::{Bounds, Registry};
pub use snapshot::Snapshot;
pub use vecmath::Vec2;
