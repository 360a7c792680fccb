//! Round-robin auto-assignment: rotation pools, the registry snapshot,
//! the per-tick assignment cycle and the engine that drives them.

pub mod cycle;
pub mod engine;
pub mod pool;
pub mod registry;

pub use cycle::{AssignmentCycle, CycleReport};
pub use engine::Engine;
pub use pool::RotationPool;
pub use registry::{Registry, TeamPool};
