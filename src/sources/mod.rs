//! Concrete collaborators for the telemetry core.

pub mod cache;
pub mod simulated;

pub use cache::{FileReadingCache, MemoryReadingCache};
pub use simulated::SimulatedSensor;
