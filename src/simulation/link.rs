//! Transmitter/receiver link with beam-alignment bookkeeping.
//!
//! A link refers to its endpoints by network-wide index and never owns them.
//! It tracks three poses of the receiver relative to the transmitter:
//! - current: recomputed every operation tick
//! - reference: captured at the last beam alignment
//! - adjusted: current minus reference, the drift the beam has not followed

use super::node::Node;
use super::types::{Orientation, Position, Tick};

/// Beam-alignment state of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentState {
    /// Reference re-captured and not yet operated on.
    Aligned,
    /// At least one operation tick since the last alignment.
    Drifting,
}

#[derive(Debug, Clone)]
pub struct Link {
    pub tx: usize,
    pub rx: usize,
    pub relative_position: Position,
    pub relative_orientation: Orientation,
    pub reference_position: Position,
    pub reference_orientation: Orientation,
    pub adjusted_position: Position,
    pub adjusted_orientation: Orientation,
    /// Transmitter-receiver distance from the last distance matrix lookup.
    pub comm_dist: f64,
    /// Normalised capacity of the last operation tick.
    pub capacity: f64,
    pub state: AlignmentState,
    pub last_alignment: Option<Tick>,
    pub alignment_count: u64,
}

impl Link {
    /// Unaligned link from node `tx` to node `rx`. All poses start at zero
    /// until the network's pre-processing captures the first reference.
    pub fn new(tx: usize, rx: usize) -> Self {
        Self {
            tx,
            rx,
            relative_position: Position::zeros(),
            relative_orientation: Orientation::default(),
            reference_position: Position::zeros(),
            reference_orientation: Orientation::default(),
            adjusted_position: Position::zeros(),
            adjusted_orientation: Orientation::default(),
            comm_dist: 0.0,
            capacity: 0.0,
            state: AlignmentState::Aligned,
            last_alignment: None,
            alignment_count: 0,
        }
    }

    /// Receiver pose minus transmitter pose.
    pub fn update_relative(&mut self, tx: &Node, rx: &Node) {
        self.relative_position = rx.position - tx.position;
        self.relative_orientation = rx.orientation - tx.orientation;
    }

    /// Capture the current relative pose as the new alignment reference.
    pub fn capture_reference(&mut self, tx: &Node, rx: &Node) {
        self.update_relative(tx, rx);
        self.reference_position = self.relative_position;
        self.reference_orientation = self.relative_orientation;
    }

    /// Beam alignment at `tick`: re-capture the reference and count it.
    ///
    /// # Parameters
    ///
    /// * `tx` / `rx` - Current transmitter and receiver nodes
    /// * `tick` - Alignment time, stored as `last_alignment`
    pub fn realign(&mut self, tx: &Node, rx: &Node, tick: Tick) {
        self.capture_reference(tx, rx);
        self.state = AlignmentState::Aligned;
        self.last_alignment = Some(tick);
        self.alignment_count += 1;
    }

    /// Refresh the current pose and derive the adjusted pose from it.
    pub fn update_adjusted(&mut self, tx: &Node, rx: &Node) {
        self.update_relative(tx, rx);
        self.adjusted_position = self.relative_position - self.reference_position;
        self.adjusted_orientation = self.relative_orientation - self.reference_orientation;
    }

    /// True between a beam alignment and the next operation tick.
    pub fn is_aligned(&self) -> bool {
        self.state == AlignmentState::Aligned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::antenna::AntennaModel;
    use crate::simulation::types::NodeKind;

    fn node(index: usize, x: f64, y: f64) -> Node {
        Node::new(index, NodeKind::GroundStation, Position::new(x, y, 10.0), Orientation::default(), 0.005, AntennaModel::new(5.0, 0.04, 16))
    }

    #[test]
    fn adjusted_pose_is_drift_since_alignment() {
        let tx = node(0, 0.0, 0.0);
        let mut rx = node(1, 7.0, 0.0);
        let mut link = Link::new(0, 1);

        link.realign(&tx, &rx, 0);
        link.update_adjusted(&tx, &rx);
        assert_eq!(link.adjusted_position, Position::zeros());
        assert_eq!(link.adjusted_orientation, Orientation::default());

        rx.position.y += 0.25;
        rx.orientation.yaw = 2.0;
        link.update_adjusted(&tx, &rx);
        assert_eq!(link.adjusted_position, Position::new(0.0, 0.25, 0.0));
        assert_eq!(link.adjusted_orientation.yaw, 2.0);
        assert_eq!(link.reference_position, Position::new(7.0, 0.0, 0.0));
    }

    #[test]
    fn realignment_updates_state_and_counter() {
        let tx = node(0, 0.0, 0.0);
        let rx = node(1, 7.0, 0.0);
        let mut link = Link::new(0, 1);
        link.state = AlignmentState::Drifting;
        link.realign(&tx, &rx, 50);
        assert!(link.is_aligned());
        assert_eq!(link.last_alignment, Some(50));
        assert_eq!(link.alignment_count, 1);
    }
}
