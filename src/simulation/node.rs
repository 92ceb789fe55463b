//! Trace-driven nodes.
//!
//! A node is one endpoint of a link: its pose, its antenna model and, for
//! drone hotspots, the trace channels that move it. The mobility process calls
//! [`Node::advance`] once per tick.

use super::antenna::AntennaModel;
use super::types::{NodeKind, Orientation, Position, SimError, Tick};
use crate::common::trace::TraceFeed;

/// Names of the trace channels driving one node.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceAssignment {
    /// Position displacement channel (meters).
    pub position: String,
    /// Roll/pitch/yaw channel (degrees).
    pub orientation: String,
}

#[derive(Debug, Clone)]
pub struct Node {
    /// Network-wide index, equal to the position in the node table.
    pub index: usize,
    pub kind: NodeKind,
    pub position: Position,
    pub orientation: Orientation,
    pub initial_position: Position,
    pub initial_orientation: Orientation,
    /// Seconds between consecutive trace samples.
    pub sampling_interval: f64,
    pub trace: Option<TraceAssignment>,
    pub antenna: AntennaModel,
    /// Trace sample applied by the last [`Node::advance`].
    pub sample_index: Option<usize>,
}

impl Node {
    /// Create a fixed node. Trace channels are attached separately.
    ///
    /// # Parameters
    ///
    /// * `index` - Network-wide index
    /// * `kind` - Node kind from the registry
    /// * `position` / `orientation` - Initial pose, kept as the base for trace samples
    /// * `sampling_interval` - Seconds between trace samples until a trace is assigned
    /// * `antenna` - Footprint model of this endpoint
    pub fn new(index: usize, kind: NodeKind, position: Position, orientation: Orientation, sampling_interval: f64, antenna: AntennaModel) -> Self {
        Self {
            index,
            kind,
            position,
            orientation,
            initial_position: position,
            initial_orientation: orientation,
            sampling_interval,
            trace: None,
            antenna,
            sample_index: None,
        }
    }

    /// Attach trace channels. The sampling interval follows the position
    /// channel's sampling rate.
    ///
    /// # Returns
    ///
    /// `SimError::UnknownTraceChannel` if `feed` lacks either channel, or
    /// `SimError::Config` for a non-positive sampling rate.
    pub fn assign_trace(&mut self, trace: TraceAssignment, feed: &dyn TraceFeed) -> Result<(), SimError> {
        let position_rate = feed.sampling_rate(&trace.position)?;
        let orientation_rate = feed.sampling_rate(&trace.orientation)?;
        if !(position_rate > 0.0) {
            return Err(SimError::Config(format!("trace channel {} has sampling rate {}", trace.position, position_rate)));
        }
        if (position_rate - orientation_rate).abs() > f64::EPSILON * position_rate {
            log::warn!(
                "Node {}: orientation channel {} samples at {} Hz but position channel {} at {} Hz, indexing both at the position rate",
                self.index,
                trace.orientation,
                orientation_rate,
                trace.position,
                position_rate
            );
        }
        self.sampling_interval = 1.0 / position_rate;
        self.trace = Some(trace);
        Ok(())
    }

    pub fn is_mobile(&self) -> bool {
        self.trace.is_some()
    }

    /// Trace sample index for `tick`, rounding down (no interpolation).
    pub fn sample_index_at(&self, tick: Tick, tick_seconds: f64) -> usize {
        // The epsilon absorbs rounding when tick_seconds is an exact multiple of the interval
        let elapsed = tick as f64 * tick_seconds / self.sampling_interval;
        (elapsed + 1e-9).floor() as usize
    }

    /// Apply the trace samples for `tick`. Fixed nodes are left untouched.
    ///
    /// # Formula
    ///
    /// ```text
    /// pose(t) = initial pose + sample[floor(t × tick_seconds / sampling_interval)]
    /// ```
    pub fn advance(&mut self, tick: Tick, tick_seconds: f64, feed: &dyn TraceFeed) -> Result<(), SimError> {
        let Some(trace) = &self.trace else {
            return Ok(());
        };
        let index = self.sample_index_at(tick, tick_seconds);
        let displacement = feed.sample(&trace.position, index)?;
        let rotation = feed.sample(&trace.orientation, index)?;

        self.position = self.initial_position + Position::from(displacement);
        self.orientation = Orientation {
            roll: self.initial_orientation.roll + rotation[0],
            pitch: self.initial_orientation.pitch + rotation[1],
            yaw: self.initial_orientation.yaw + rotation[2],
        };
        self.sample_index = Some(index);
        Ok(())
    }
}
