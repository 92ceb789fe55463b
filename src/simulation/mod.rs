//! Link simulation core.
//!
//! ## Module Organization
//!
//! - `types`: Shared data structures (ticks, poses, node kinds, errors)
//! - `geometry`: Polygon construction, intersection and area
//! - `antenna`: Transmit spot and receive aperture footprints
//! - `signal_calculations`: Pointing offset and normalised capacity
//! - `node`: Trace-driven nodes
//! - `link`: Relative pose and beam-alignment bookkeeping
//! - `network`: Node table, distance matrix, channel coherence, per-tick link work
//! - `scheduler`: Tick-driven process scheduler
//! - `experiment`: Process wiring, runs and the alignment-interval sweep

pub mod antenna;
pub mod experiment;
pub mod geometry;
pub mod link;
pub mod network;
pub mod node;
pub mod scheduler;
pub mod signal_calculations;
pub mod types;
