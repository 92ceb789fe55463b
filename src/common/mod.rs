//! Configuration and input shared by the simulator: scenario files and motion traces.

pub mod scenario;
pub mod trace;
