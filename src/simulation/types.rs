//! Type definitions for the simulation.
//!
//! Contains the data structures shared across the simulation core:
//! - Tick axis and 2-D points used by the footprint geometry
//! - Orientation triples (roll, pitch, yaw in degrees)
//! - The closed set of node kinds
//! - The error type reported by the core

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Sub;
use std::str::FromStr;

/// One discrete unit of simulated time.
pub type Tick = u64;

/// Position or displacement in meters (x, y, z).
pub type Position = Vector3<f64>;

/// Simple 2D point on the receive plane, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Roll, pitch and yaw in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Orientation {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }

    pub fn from_sample(sample: [f64; 3]) -> Self {
        Self::new(sample[0], sample[1], sample[2])
    }
}

impl Sub for Orientation {
    type Output = Orientation;

    fn sub(self, rhs: Orientation) -> Orientation {
        Orientation {
            roll: self.roll - rhs.roll,
            pitch: self.pitch - rhs.pitch,
            yaw: self.yaw - rhs.yaw,
        }
    }
}

/// Closed set of node kinds the network knows how to host.
///
/// Configuration refers to kinds by their short tag; anything else is rejected
/// as an unsupported node type before the simulation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    /// Drone hotspot: moves according to its assigned trace channels.
    #[serde(rename = "dhs")]
    DroneHotspot,
    /// Fixed station: keeps its configured pose for the whole run.
    #[serde(rename = "ground")]
    GroundStation,
}

impl NodeKind {
    pub const ALL: [NodeKind; 2] = [NodeKind::DroneHotspot, NodeKind::GroundStation];

    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::DroneHotspot => "dhs",
            NodeKind::GroundStation => "ground",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for NodeKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.tag() == s)
            .ok_or_else(|| SimError::UnsupportedNodeKind(s.to_string()))
    }
}

/// Errors raised by the simulation core.
///
/// Every variant is fatal for the run in progress: the simulation is
/// deterministic, so nothing here is retried.
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// A node kind tag outside the supported set.
    UnsupportedNodeKind(String),
    /// Distance computation requested before any node was registered.
    NoNodes,
    /// A node index that does not exist in the network.
    UnknownNode(usize),
    /// A link between a node and itself.
    SelfLink(usize),
    /// A link index that does not exist in the network.
    UnknownLink(usize),
    /// A trace channel name that the feed does not provide.
    UnknownTraceChannel(String),
    /// Sample index past the end of a channel under the `fail` boundary policy.
    TraceExhausted { channel: String, index: usize, len: usize },
    /// A scheduler process asked to be resumed zero ticks later.
    ZeroDelay { process: String, tick: Tick },
    /// More sweep variants than output series.
    TooManyVariants(usize),
    /// Any other wiring mistake detected before or during setup.
    Config(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::UnsupportedNodeKind(kind) => write!(f, "Node type not supported: {}", kind),
            SimError::NoNodes => write!(f, "There are no nodes in the network"),
            SimError::UnknownNode(index) => write!(f, "No node with network-wide index {}", index),
            SimError::SelfLink(index) => write!(f, "Node {} cannot be linked to itself", index),
            SimError::UnknownLink(index) => write!(f, "No link with index {}", index),
            SimError::UnknownTraceChannel(name) => write!(f, "Trace channel not found: {}", name),
            SimError::TraceExhausted { channel, index, len } => {
                write!(f, "Trace channel {} exhausted: sample {} requested, {} available", channel, index, len)
            }
            SimError::ZeroDelay { process, tick } => write!(f, "Process {} requested a zero-tick wait at tick {}", process, tick),
            SimError::TooManyVariants(count) => write!(f, "{} alignment intervals given, at most 3 series are supported", count),
            SimError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for SimError {}
