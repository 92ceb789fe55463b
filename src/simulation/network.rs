//! Network state shared by every simulation process.
//!
//! The network owns the node table, the kind-keyed node registry, the
//! pairwise distance matrix, the channel-coherence bookkeeping and the links.
//! Processes registered with the scheduler act on it through the `*_step`
//! methods, each of which performs exactly one period of work.
//!
//! Per-link operation tick:
//! 1) Recompute the receiver pose relative to the transmitter.
//! 2) Adjusted pose = current minus the last alignment reference.
//! 3) Recompute the whole distance matrix and look up the link distance.
//! 4) Project the adjusted pose into a transmit spot and rebuild the aperture.
//! 5) Capacity = overlap area / π·r².

use nalgebra::DMatrix;
use std::collections::BTreeMap;

use super::antenna::AntennaModel;
use super::link::{AlignmentState, Link};
use super::node::{Node, TraceAssignment};
use super::signal_calculations::{normalized_capacity, pointing_offset};
use super::types::{NodeKind, Orientation, Position, SimError, Tick};
use crate::common::trace::TraceFeed;

/// Channel-coherence bookkeeping.
///
/// The two-node link has no fading model, so regeneration only records that
/// it happened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelState {
    pub effective: bool,
    /// Number of regenerations so far.
    pub generation: u64,
    pub last_refresh: Option<Tick>,
}

/// Network area in meters. Stored for reporting only.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NetworkArea {
    pub width: f64,
    pub length: f64,
    pub height: f64,
}

#[derive(Debug)]
pub struct Network {
    nodes: Vec<Node>,
    registry: BTreeMap<NodeKind, Vec<usize>>,
    distances: DMatrix<f64>,
    coherence_interval: Tick,
    tick_seconds: f64,
    channel: ChannelState,
    area: NetworkArea,
    links: Vec<Link>,
}

impl Network {
    /// Empty network. Every node kind starts with an empty registry entry.
    pub fn new(coherence_interval: Tick, tick_seconds: f64) -> Self {
        let registry = NodeKind::ALL.iter().map(|kind| (*kind, Vec::new())).collect();
        log::debug!("Blank network created (coherence interval {} ticks, {} s per tick)", coherence_interval, tick_seconds);
        Self {
            nodes: Vec::new(),
            registry,
            distances: DMatrix::zeros(0, 0),
            coherence_interval,
            tick_seconds,
            channel: ChannelState::default(),
            area: NetworkArea::default(),
            links: Vec::new(),
        }
    }

    /// Record the network dimensions in meters.
    pub fn set_area(&mut self, width: f64, length: f64, height: f64) {
        self.area = NetworkArea { width, length, height };
        log::info!("Network dimension is set to {}x{}x{} in meter", width, length, height);
    }

    pub fn area(&self) -> NetworkArea {
        self.area
    }

    /// Ticks between channel regenerations.
    pub fn coherence_interval(&self) -> Tick {
        self.coherence_interval
    }

    pub fn tick_seconds(&self) -> f64 {
        self.tick_seconds
    }

    /// Add a node of kind `kind` (configuration tag) and return its index.
    ///
    /// # Returns
    ///
    /// The network-wide index, or `SimError::UnsupportedNodeKind` for an unknown tag.
    pub fn add_node(&mut self, kind: &str, position: Position, orientation: Orientation, antenna: AntennaModel) -> Result<usize, SimError> {
        let kind: NodeKind = kind.parse()?;
        let index = self.nodes.len();
        self.nodes.push(Node::new(index, kind, position, orientation, self.tick_seconds, antenna));
        self.registry.entry(kind).or_default().push(index);
        log::debug!("Node {} ({}) added at ({:.3}, {:.3}, {:.3})", index, kind, position.x, position.y, position.z);
        Ok(index)
    }

    /// Drive node `index` from trace channels.
    pub fn assign_trace(&mut self, index: usize, trace: TraceAssignment, feed: &dyn TraceFeed) -> Result<(), SimError> {
        self.node_mut(index)?.assign_trace(trace, feed)
    }

    pub fn node(&self, index: usize) -> Result<&Node, SimError> {
        self.nodes.get(index).ok_or(SimError::UnknownNode(index))
    }

    fn node_mut(&mut self, index: usize) -> Result<&mut Node, SimError> {
        self.nodes.get_mut(index).ok_or(SimError::UnknownNode(index))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Nodes of one kind, in index order.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<&Node> {
        self.registry
            .get(&kind)
            .map(|indices| indices.iter().filter_map(|i| self.nodes.get(*i)).collect())
            .unwrap_or_default()
    }

    /// Link transmitter `tx` to receiver `rx` and return the link index.
    ///
    /// # Returns
    ///
    /// `SimError::UnknownNode` for a missing endpoint, `SimError::SelfLink`
    /// when `tx == rx`.
    pub fn add_link(&mut self, tx: usize, rx: usize) -> Result<usize, SimError> {
        self.node(tx)?;
        self.node(rx)?;
        if tx == rx {
            return Err(SimError::SelfLink(tx));
        }
        self.links.push(Link::new(tx, rx));
        Ok(self.links.len() - 1)
    }

    pub fn link(&self, index: usize) -> Result<&Link, SimError> {
        self.links.get(index).ok_or(SimError::UnknownLink(index))
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn channel(&self) -> &ChannelState {
        &self.channel
    }

    /// One-time setup after all nodes and links exist: distance matrix, then
    /// every link's alignment reference and initial distance.
    pub fn pre_processing(&mut self) -> Result<(), SimError> {
        self.recompute_distance_matrix()?;
        for link in &mut self.links {
            let (tx, rx) = (&self.nodes[link.tx], &self.nodes[link.rx]);
            link.capture_reference(tx, rx);
            link.comm_dist = self.distances[(link.tx, link.rx)];
            log::debug!("Link {}->{} initial distance {:.4} m", link.tx, link.rx, link.comm_dist);
        }
        Ok(())
    }

    /// Discard and rebuild every pairwise Euclidean distance.
    pub fn recompute_distance_matrix(&mut self) -> Result<(), SimError> {
        if self.nodes.is_empty() {
            return Err(SimError::NoNodes);
        }
        let n = self.nodes.len();
        self.distances = DMatrix::from_fn(n, n, |i, j| (self.nodes[i].position - self.nodes[j].position).norm());
        Ok(())
    }

    /// Distance between nodes `a` and `b` at the last recomputation.
    ///
    /// # Returns
    ///
    /// The Euclidean distance in meters, or `SimError::UnknownNode` for an
    /// index outside the matrix.
    pub fn distance(&self, a: usize, b: usize) -> Result<f64, SimError> {
        let n = self.distances.nrows();
        if a >= n {
            return Err(SimError::UnknownNode(a));
        }
        if b >= n {
            return Err(SimError::UnknownNode(b));
        }
        Ok(self.distances[(a, b)])
    }

    pub fn distance_matrix(&self) -> &DMatrix<f64> {
        &self.distances
    }

    /// Mark the channel state ineffective.
    pub fn reset_channels(&mut self) {
        self.channel.effective = false;
    }

    /// Regenerate the channel state.
    pub fn refresh_channels(&mut self, tick: Tick) {
        self.channel.effective = true;
        self.channel.generation += 1;
        self.channel.last_refresh = Some(tick);
    }

    /// One period of the channel-coherence process. Returns the delay until the next period.
    pub fn channel_step(&mut self, tick: Tick) -> Tick {
        log::debug!("Refreshing channel at {}", tick);
        self.reset_channels();
        self.refresh_channels(tick);
        self.coherence_interval
    }

    /// One period of a node mobility process: move node `index` to its trace
    /// sample for `tick`.
    pub fn advance_node(&mut self, index: usize, tick: Tick, feed: &dyn TraceFeed) -> Result<(), SimError> {
        let tick_seconds = self.tick_seconds;
        self.node_mut(index)?.advance(tick, tick_seconds, feed)
    }

    /// One period of a beam-alignment process.
    ///
    /// # Parameters
    ///
    /// * `index` - Link to realign
    /// * `tick` - Current tick
    pub fn align_link(&mut self, index: usize, tick: Tick) -> Result<(), SimError> {
        let link = self.links.get_mut(index).ok_or(SimError::UnknownLink(index))?;
        link.realign(&self.nodes[link.tx], &self.nodes[link.rx], tick);
        log::debug!("Link {} realigned at tick {} ({} alignments)", index, tick, link.alignment_count);
        Ok(())
    }

    /// One period of a link operation process.
    ///
    /// # Parameters
    ///
    /// * `index` - Link to operate
    /// * `tick` - Current tick, used for logging only
    ///
    /// # Returns
    ///
    /// The normalised capacity of the link at `tick`.
    pub fn operate_link(&mut self, index: usize, tick: Tick) -> Result<f64, SimError> {
        let (tx, rx) = {
            let link = self.links.get_mut(index).ok_or(SimError::UnknownLink(index))?;
            link.update_adjusted(&self.nodes[link.tx], &self.nodes[link.rx]);
            (link.tx, link.rx)
        };

        self.recompute_distance_matrix()?;
        let distance = self.distance(tx, rx)?;

        let link = &mut self.links[index];
        link.comm_dist = distance;
        let (center, roll) = pointing_offset(&link.reference_position, &link.adjusted_position, &link.adjusted_orientation, distance);
        let range_drift = distance - link.reference_position.norm();
        let realigned = link.is_aligned();

        self.nodes[tx].antenna.update_wavefront(center, roll, range_drift);
        self.nodes[rx].antenna.update_aperture();
        let receiver = &self.nodes[rx].antenna;
        let capacity = normalized_capacity(self.nodes[tx].antenna.footprint(), receiver.footprint(), receiver.aperture_area());

        link.capacity = capacity;
        link.state = AlignmentState::Drifting;
        log::debug!(
            "Tick {}: link {}{} distance {:.4} m, spot offset ({:.5}, {:.5}), range drift {:.5} m, capacity {:.6}",
            tick,
            index,
            if realigned { " (realigned)" } else { "" },
            distance,
            center.x,
            center.y,
            range_drift,
            capacity
        );
        Ok(capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::trace::{TraceBoundary, TraceChannel, TraceSet};

    fn antenna() -> AntennaModel {
        AntennaModel::new(1.0, 0.04, 64)
    }

    fn pair() -> Network {
        let mut network = Network::new(10, 0.005);
        network.add_node("ground", Position::new(0.0, 0.0, 10.0), Orientation::default(), antenna()).unwrap();
        network.add_node("dhs", Position::new(7.0, 0.0, 10.0), Orientation::default(), antenna()).unwrap();
        network.add_link(0, 1).unwrap();
        network
    }

    #[test]
    fn distance_matrix_is_symmetric_and_idempotent() {
        let mut network = pair();
        network.add_node("dhs", Position::new(3.0, 4.0, -2.0), Orientation::default(), antenna()).unwrap();
        network.recompute_distance_matrix().unwrap();
        let first = network.distance_matrix().clone();
        assert_eq!(first, first.transpose());
        assert_eq!(network.distance(0, 1).unwrap(), 7.0);
        assert_eq!(network.distance(2, 2).unwrap(), 0.0);
        network.recompute_distance_matrix().unwrap();
        assert_eq!(&first, network.distance_matrix());
    }

    #[test]
    fn distance_needs_nodes() {
        let mut network = Network::new(10, 0.005);
        assert_eq!(network.recompute_distance_matrix(), Err(SimError::NoNodes));
        assert_eq!(network.pre_processing(), Err(SimError::NoNodes));
    }

    #[test]
    fn registry_covers_every_kind() {
        let network = pair();
        assert_eq!(network.nodes_of_kind(NodeKind::GroundStation).len(), 1);
        assert_eq!(network.nodes_of_kind(NodeKind::DroneHotspot)[0].index, 1);
        let empty = Network::new(1, 0.005);
        for kind in NodeKind::ALL {
            assert!(empty.nodes_of_kind(kind).is_empty());
        }
    }

    #[test]
    fn invalid_nodes_and_links_are_rejected() {
        let mut network = pair();
        assert_eq!(
            network.add_node("lte", Position::zeros(), Orientation::default(), antenna()),
            Err(SimError::UnsupportedNodeKind("lte".into()))
        );
        assert_eq!(network.add_link(1, 1), Err(SimError::SelfLink(1)));
        assert_eq!(network.add_link(0, 5), Err(SimError::UnknownNode(5)));
        assert!(network.link(3).is_err());
    }

    #[test]
    fn channel_step_counts_generations() {
        let mut network = pair();
        assert_eq!(network.channel_step(0), 10);
        assert_eq!(network.channel_step(10), 10);
        assert_eq!(
            network.channel(),
            &ChannelState {
                effective: true,
                generation: 2,
                last_refresh: Some(10)
            }
        );
    }

    #[test]
    fn aligned_link_has_unit_capacity() {
        let mut network = pair();
        network.pre_processing().unwrap();
        assert_eq!(network.link(0).unwrap().comm_dist, 7.0);
        network.align_link(0, 0).unwrap();
        let capacity = network.operate_link(0, 0).unwrap();
        assert!((capacity - 1.0).abs() < 1e-9);
        assert_eq!(network.link(0).unwrap().state, AlignmentState::Drifting);
    }

    #[test]
    fn receiver_drift_reduces_capacity() {
        let mut feed = TraceSet::new(TraceBoundary::Clamp);
        feed.insert("drift", TraceChannel::linear_drift(200.0, [0.0, 0.02, 0.0], 10));
        feed.insert("still", TraceChannel::constant(200.0, [0.0; 3], 1));
        let mut network = pair();
        network
            .assign_trace(
                1,
                TraceAssignment {
                    position: "drift".into(),
                    orientation: "still".into(),
                },
                &feed,
            )
            .unwrap();
        network.pre_processing().unwrap();
        network.align_link(0, 0).unwrap();
        network.advance_node(1, 3, &feed).unwrap();
        let capacity = network.operate_link(0, 3).unwrap();
        assert!(capacity < 1.0 && capacity > 0.0, "capacity {capacity}");
        let adjusted = network.link(0).unwrap().adjusted_position;
        assert!((adjusted - Position::new(0.0, 0.06, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn range_drift_along_boresight_keeps_full_capacity() {
        let mut feed = TraceSet::new(TraceBoundary::Clamp);
        feed.insert("recede", TraceChannel::linear_drift(200.0, [0.01, 0.0, 0.0], 10));
        feed.insert("still", TraceChannel::constant(200.0, [0.0; 3], 1));
        let mut network = pair();
        let trace = TraceAssignment {
            position: "recede".into(),
            orientation: "still".into(),
        };
        network.assign_trace(1, trace, &feed).unwrap();
        network.pre_processing().unwrap();
        network.align_link(0, 0).unwrap();
        network.advance_node(1, 5, &feed).unwrap();

        let capacity = network.operate_link(0, 5).unwrap();
        assert!((network.link(0).unwrap().comm_dist - 7.05).abs() < 1e-12);
        // The defocused spot stays centred and covers the whole aperture
        assert!((capacity - 1.0).abs() < 1e-9, "capacity {capacity}");
        let spot = network.node(0).unwrap().antenna.footprint().area();
        assert!(spot > network.node(1).unwrap().antenna.aperture_area());
    }
}
