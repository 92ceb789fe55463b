//! Scenario loading, parsing, and validation logic.
//!
//! A scenario describes one experiment setup: network timing, the antenna
//! model, the two link endpoints, the alignment intervals to sweep, where the
//! motion traces come from, and optional figure presets that override the
//! trace assignment, sweep and beamwidth. Scenarios are TOML files; the
//! built-in [`Scenario::default`] reproduces the reference drone experiment.

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::trace::TraceBoundary;
use crate::simulation::antenna::DEFAULT_FOOTPRINT_SEGMENTS;
use crate::simulation::types::NodeKind;

/// Error type for scenario and trace loading failures.
#[derive(Debug)]
pub enum ScenarioLoadError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for ScenarioLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScenarioLoadError::FileReadError(msg) => write!(f, "Failed to read file: {}", msg),
            ScenarioLoadError::ParseError(msg) => write!(f, "Failed to parse file: {}", msg),
            ScenarioLoadError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ScenarioLoadError {}

/// Network-wide timing and area settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkParameters {
    /// Area width in meters (informational for the two-node core).
    pub width: f64,
    /// Area length in meters.
    pub length: f64,
    /// Area height in meters.
    pub height: f64,
    /// Ticks between channel-state regenerations.
    pub coherence_interval: u64,
    /// Simulated seconds per tick.
    pub tick_seconds: f64,
    /// Number of ticks simulated per run.
    pub horizon: u64,
    /// Policy for sample indices past the end of a trace channel.
    pub trace_boundary: TraceBoundary,
}

impl Default for NetworkParameters {
    fn default() -> Self {
        Self {
            width: 3000.0,
            length: 3000.0,
            height: 100.0,
            coherence_interval: 10,
            tick_seconds: 0.005,
            horizon: 1000,
            trace_boundary: TraceBoundary::Clamp,
        }
    }
}

/// Antenna parameters shared by both endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AntennaParameters {
    /// Transmit beamwidth in degrees.
    pub beamwidth_deg: f64,
    /// Receive aperture radius in meters.
    pub radius: f64,
    /// Vertices used to approximate circular footprints.
    pub footprint_segments: usize,
}

impl Default for AntennaParameters {
    fn default() -> Self {
        Self {
            beamwidth_deg: 5.0,
            radius: 0.04,
            footprint_segments: DEFAULT_FOOTPRINT_SEGMENTS,
        }
    }
}

/// One link endpoint. The first node is the transmitter, the second the receiver.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Node kind tag (`dhs` or `ground`).
    pub kind: String,
    /// Initial coordinates in meters.
    pub position: [f64; 3],
    /// Initial roll, pitch, yaw in degrees.
    #[serde(default)]
    pub orientation: [f64; 3],
    /// Channel holding position displacement samples (drone hotspots only).
    #[serde(default)]
    pub position_channel: Option<String>,
    /// Channel holding roll/pitch/yaw samples (drone hotspots only).
    #[serde(default)]
    pub orientation_channel: Option<String>,
}

/// Named override of trace assignment, sweep and beamwidth.
#[derive(Debug, Clone, Deserialize)]
pub struct FigurePreset {
    pub id: String,
    /// Position channel per node, in node order.
    pub position_channels: Vec<String>,
    /// Orientation channel per node, in node order.
    pub orientation_channels: Vec<String>,
    pub alignment_intervals: Vec<u64>,
    #[serde(default)]
    pub beamwidth_deg: Option<f64>,
}

/// Channel generated at startup instead of being read from a trace file.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyntheticTrace {
    Constant {
        name: String,
        sampling_rate: f64,
        value: [f64; 3],
        samples: usize,
    },
    LinearDrift {
        name: String,
        sampling_rate: f64,
        /// Displacement added per sample.
        step: [f64; 3],
        samples: usize,
    },
    Jitter {
        name: String,
        sampling_rate: f64,
        sigma: f64,
        samples: usize,
        #[serde(default)]
        seed: u64,
    },
    RandomWalk {
        name: String,
        sampling_rate: f64,
        sigma: f64,
        samples: usize,
        #[serde(default)]
        seed: u64,
    },
}

/// Root structure representing a whole experiment setup.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub network: NetworkParameters,
    #[serde(default)]
    pub antenna: AntennaParameters,
    pub nodes: Vec<NodeConfig>,
    /// Alignment intervals in ticks, swept in order as ideal, adaptive, none.
    pub alignment_intervals: Vec<u64>,
    /// Optional JSON trace file, relative paths resolved against the scenario file.
    #[serde(default)]
    pub trace_file: Option<PathBuf>,
    #[serde(default)]
    pub synthetic_traces: Vec<SyntheticTrace>,
    #[serde(default)]
    pub figures: Vec<FigurePreset>,
}

impl Scenario {
    /// Load a scenario from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Scenario, ScenarioLoadError> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file: {}", path.display()))
            .map_err(|e| ScenarioLoadError::FileReadError(format!("{:#}", e)))?;

        let mut scenario = Scenario::parse(&data)?;

        // If trace_file is specified, prepend the scenario file's directory
        if let Some(trace_file) = scenario.trace_file.take() {
            let resolved = match path.parent() {
                Some(parent_dir) if trace_file.is_relative() => parent_dir.join(trace_file),
                _ => trace_file,
            };
            scenario.trace_file = Some(resolved);
        }

        log::info!("Loaded scenario {} ({} nodes, {} figure presets)", path.display(), scenario.nodes.len(), scenario.figures.len());
        Ok(scenario)
    }

    /// Parse and validate scenario TOML text.
    pub fn parse(data: &str) -> Result<Scenario, ScenarioLoadError> {
        let scenario: Scenario = toml::from_str(data)
            .context("Invalid TOML format")
            .map_err(|e| ScenarioLoadError::ParseError(format!("{:#}", e)))?;
        validate_scenario(&scenario).map_err(ScenarioLoadError::ValidationError)?;
        Ok(scenario)
    }

    /// Copy of this scenario with figure preset `id` applied.
    pub fn with_figure(&self, id: &str) -> Result<Scenario, ScenarioLoadError> {
        let preset = self.figures.iter().find(|f| f.id == id).ok_or_else(|| {
            let known: Vec<&str> = self.figures.iter().map(|f| f.id.as_str()).collect();
            ScenarioLoadError::ValidationError(format!("Unknown figure {}, available: [{}]", id, known.join(", ")))
        })?;

        let mut scenario = self.clone();
        for (idx, node) in scenario.nodes.iter_mut().enumerate() {
            node.position_channel = preset.position_channels.get(idx).cloned();
            node.orientation_channel = preset.orientation_channels.get(idx).cloned();
        }
        scenario.alignment_intervals = preset.alignment_intervals.clone();
        if let Some(beamwidth) = preset.beamwidth_deg {
            scenario.antenna.beamwidth_deg = beamwidth;
        }

        validate_scenario(&scenario).map_err(ScenarioLoadError::ValidationError)?;
        log::info!(
            "Figure {} selected: intervals {:?}, beamwidth {} deg",
            id,
            scenario.alignment_intervals,
            scenario.antenna.beamwidth_deg
        );
        Ok(scenario)
    }
}

const GYR_TRACES: [&str; 10] = [
    "gyr_micro_1000_inst1",
    "gyr_micro_1000_inst2",
    "gyr_micro_1000_inst3",
    "gyr_micro_1000_inst4",
    "gyr_small_1000_inst1",
    "gyr_small_1000_inst2",
    "gyr_small_1000_inst3",
    "gyr_small_1000_inst4",
    "gyr_large_75_inst1",
    "gyr_large_75_inst2",
];

const LAC_TRACES: [&str; 6] = [
    "lac_micro_1000_inst1",
    "lac_micro_1000_inst2",
    "lac_small_1000_inst1",
    "lac_small_1000_inst2",
    "lac_large_inst1",
    "lac_large_inst2",
];

/// Sampling rate of every reference trace (samples per second).
const REFERENCE_SAMPLING_RATE: f64 = 200.0;

fn reference_synthetic_traces() -> Vec<SyntheticTrace> {
    let mut traces = Vec::new();
    for (seed, name) in GYR_TRACES.iter().enumerate() {
        let (sigma, samples) = if name.contains("micro") {
            (0.002, 1000)
        } else if name.contains("small") {
            (0.02, 1000)
        } else {
            (0.2, 75)
        };
        traces.push(SyntheticTrace::Jitter {
            name: name.to_string(),
            sampling_rate: REFERENCE_SAMPLING_RATE,
            sigma,
            samples,
            seed: seed as u64,
        });
    }
    for (seed, name) in LAC_TRACES.iter().enumerate() {
        let sigma = if name.contains("micro") {
            1e-5
        } else if name.contains("small") {
            1e-4
        } else {
            1e-3
        };
        traces.push(SyntheticTrace::RandomWalk {
            name: name.to_string(),
            sampling_rate: REFERENCE_SAMPLING_RATE,
            sigma,
            samples: 1000,
            seed: 100 + seed as u64,
        });
    }
    traces
}

fn reference_figure(id: &str, gyr: (usize, usize), lac: (usize, usize), beamwidth_deg: f64) -> FigurePreset {
    FigurePreset {
        id: id.to_string(),
        position_channels: vec![LAC_TRACES[lac.0].to_string(), LAC_TRACES[lac.1].to_string()],
        orientation_channels: vec![GYR_TRACES[gyr.0].to_string(), GYR_TRACES[gyr.1].to_string()],
        alignment_intervals: vec![1, 100, 5000],
        beamwidth_deg: Some(beamwidth_deg),
    }
}

impl Default for Scenario {
    /// Two drone hotspots roughly ten meters apart with synthetic traces.
    fn default() -> Self {
        let dhs = |position: [f64; 3], inst: usize| NodeConfig {
            kind: NodeKind::DroneHotspot.tag().to_string(),
            position,
            orientation: [0.0; 3],
            position_channel: Some(LAC_TRACES[inst].to_string()),
            orientation_channel: Some(GYR_TRACES[inst].to_string()),
        };
        Self {
            network: NetworkParameters::default(),
            antenna: AntennaParameters::default(),
            nodes: vec![dhs([100.0, 100.0, 10.0], 0), dhs([107.0, 107.0, 10.0], 1)],
            alignment_intervals: vec![1, 50, 5000],
            trace_file: None,
            synthetic_traces: reference_synthetic_traces(),
            figures: vec![
                reference_figure("1", (0, 1), (0, 1), 10.0),
                reference_figure("2", (4, 5), (2, 3), 10.0),
                reference_figure("3", (8, 9), (4, 5), 10.0),
                reference_figure("4", (0, 4), (0, 2), 5.0),
                reference_figure("5", (6, 7), (2, 3), 5.0),
                reference_figure("6", (8, 9), (4, 5), 5.0),
            ],
        }
    }
}

/// Validate a scenario.
///
/// # Returns
///
/// `Ok(())` if validation passes, `Err(String)` with error description otherwise.
pub fn validate_scenario(scenario: &Scenario) -> Result<(), String> {
    const MAX_VARIANTS: usize = 3;

    let network = &scenario.network;
    if network.coherence_interval == 0 {
        return Err("Invalid coherence_interval, must be at least 1 tick".to_string());
    }
    if !(network.tick_seconds > 0.0) {
        return Err(format!("Invalid tick_seconds {}, must be positive", network.tick_seconds));
    }
    if network.horizon == 0 {
        return Err("Invalid horizon, must be at least 1 tick".to_string());
    }
    if network.width < 0.0 || network.length < 0.0 || network.height < 0.0 {
        return Err("Network area dimensions must be non-negative".to_string());
    }

    let antenna = &scenario.antenna;
    if !(antenna.beamwidth_deg > 0.0 && antenna.beamwidth_deg < 180.0) {
        return Err(format!("Invalid beamwidth_deg {}, must be within (0, 180)", antenna.beamwidth_deg));
    }
    if !(antenna.radius > 0.0) {
        return Err(format!("Invalid radius {}, must be positive", antenna.radius));
    }
    if antenna.footprint_segments < 3 {
        return Err(format!("Invalid footprint_segments {}, must be at least 3", antenna.footprint_segments));
    }

    // Exactly one transmitter and one receiver
    if scenario.nodes.len() != 2 {
        return Err(format!(
            "Scenario must contain exactly two nodes (transmitter and receiver), found {}",
            scenario.nodes.len()
        ));
    }
    for (idx, node) in scenario.nodes.iter().enumerate() {
        let kind: NodeKind = node.kind.parse().map_err(|e| format!("Node {}: {}", idx, e))?;
        if node.position.iter().chain(node.orientation.iter()).any(|v| !v.is_finite()) {
            return Err(format!("Node {} has non-finite coordinates", idx));
        }
        let traced = node.position_channel.is_some() || node.orientation_channel.is_some();
        match kind {
            NodeKind::DroneHotspot if node.position_channel.is_none() || node.orientation_channel.is_none() => {
                return Err(format!("Node {} (dhs) requires both position_channel and orientation_channel", idx));
            }
            NodeKind::GroundStation if traced => {
                return Err(format!("Node {} (ground) is fixed and cannot have trace channels", idx));
            }
            _ => {}
        }
    }

    validate_intervals("alignment_intervals", &scenario.alignment_intervals, MAX_VARIANTS)?;

    let mut figure_ids = HashSet::new();
    for figure in &scenario.figures {
        if !figure_ids.insert(figure.id.as_str()) {
            return Err(format!("Duplicate figure id found: {}", figure.id));
        }
        if figure.position_channels.len() != scenario.nodes.len() || figure.orientation_channels.len() != scenario.nodes.len() {
            return Err(format!("Figure {} must name one position and one orientation channel per node", figure.id));
        }
        validate_intervals(&format!("figure {} alignment_intervals", figure.id), &figure.alignment_intervals, MAX_VARIANTS)?;
        if let Some(beamwidth) = figure.beamwidth_deg {
            if !(beamwidth > 0.0 && beamwidth < 180.0) {
                return Err(format!("Figure {} has invalid beamwidth_deg {}", figure.id, beamwidth));
            }
        }
    }

    let mut trace_names = HashSet::new();
    for trace in &scenario.synthetic_traces {
        let (name, sampling_rate, samples, sigma) = match trace {
            SyntheticTrace::Constant {
                name, sampling_rate, samples, ..
            }
            | SyntheticTrace::LinearDrift {
                name, sampling_rate, samples, ..
            } => (name, *sampling_rate, *samples, 0.0),
            SyntheticTrace::Jitter {
                name,
                sampling_rate,
                samples,
                sigma,
                ..
            }
            | SyntheticTrace::RandomWalk {
                name,
                sampling_rate,
                samples,
                sigma,
                ..
            } => (name, *sampling_rate, *samples, *sigma),
        };
        if !trace_names.insert(name.as_str()) {
            return Err(format!("Duplicate synthetic trace name found: {}", name));
        }
        if !(sampling_rate > 0.0) {
            return Err(format!("Synthetic trace {} has invalid sampling_rate {}", name, sampling_rate));
        }
        if samples == 0 {
            return Err(format!("Synthetic trace {} must have at least one sample", name));
        }
        if !(sigma >= 0.0) {
            return Err(format!("Synthetic trace {} has invalid sigma {}", name, sigma));
        }
    }

    Ok(())
}

fn validate_intervals(field: &str, intervals: &[u64], max: usize) -> Result<(), String> {
    if intervals.is_empty() {
        return Err(format!("{} must contain at least one interval", field));
    }
    if intervals.len() > max {
        return Err(format!("{} has {} entries, at most {} series are supported", field, intervals.len(), max));
    }
    if intervals.contains(&0) {
        return Err(format!("{} must only contain intervals of at least 1 tick", field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        alignment_intervals = [1, 50]

        [network]
        horizon = 200

        [[nodes]]
        kind = "ground"
        position = [0.0, 0.0, 10.0]

        [[nodes]]
        kind = "dhs"
        position = [7.0, 0.0, 10.0]
        position_channel = "drift"
        orientation_channel = "still"

        [[synthetic_traces]]
        kind = "linear_drift"
        name = "drift"
        sampling_rate = 200.0
        step = [0.0, 0.01, 0.0]
        samples = 200

        [[synthetic_traces]]
        kind = "constant"
        name = "still"
        sampling_rate = 200.0
        value = [0.0, 0.0, 0.0]
        samples = 1
    "#;

    #[test]
    fn parses_minimal_scenario_with_defaults() {
        let scenario = Scenario::parse(MINIMAL).unwrap();
        assert_eq!(scenario.network.horizon, 200);
        assert_eq!(scenario.network.coherence_interval, 10);
        assert_eq!(scenario.network.trace_boundary, TraceBoundary::Clamp);
        assert_eq!(scenario.antenna.footprint_segments, DEFAULT_FOOTPRINT_SEGMENTS);
        assert_eq!(scenario.synthetic_traces.len(), 2);
        assert_eq!(scenario.synthetic_traces[0].name(), "drift");
    }

    #[test]
    fn default_scenario_is_valid_and_every_figure_applies() {
        let scenario = Scenario::default();
        assert!(validate_scenario(&scenario).is_ok());
        for id in ["1", "2", "3", "4", "5", "6"] {
            let figure = scenario.with_figure(id).unwrap();
            assert_eq!(figure.alignment_intervals, vec![1, 100, 5000]);
        }
        let fig4 = scenario.with_figure("4").unwrap();
        assert_eq!(fig4.antenna.beamwidth_deg, 5.0);
        assert_eq!(fig4.nodes[1].orientation_channel.as_deref(), Some("gyr_small_1000_inst1"));
        assert_eq!(fig4.nodes[1].position_channel.as_deref(), Some("lac_small_1000_inst1"));
    }

    #[test]
    fn unknown_figure_is_rejected() {
        let err = Scenario::default().with_figure("9").unwrap_err();
        assert!(err.to_string().contains("Unknown figure 9"));
    }

    #[test]
    fn unsupported_node_kind_is_rejected() {
        let data = MINIMAL.replace("kind = \"ground\"", "kind = \"wifi\"");
        let err = Scenario::parse(&data).unwrap_err();
        assert!(matches!(err, ScenarioLoadError::ValidationError(ref msg) if msg.contains("Node type not supported: wifi")));
    }

    #[test]
    fn too_many_intervals_are_rejected() {
        let mut scenario = Scenario::default();
        scenario.alignment_intervals = vec![1, 2, 3, 4];
        assert!(validate_scenario(&scenario).unwrap_err().contains("at most 3"));
        scenario.alignment_intervals = vec![0];
        assert!(validate_scenario(&scenario).is_err());
    }

    #[test]
    fn node_count_must_be_two() {
        let mut scenario = Scenario::default();
        scenario.nodes.pop();
        assert!(validate_scenario(&scenario).unwrap_err().contains("exactly two nodes"));
    }

    #[test]
    fn drone_hotspots_need_trace_channels() {
        let mut scenario = Scenario::default();
        scenario.nodes[0].orientation_channel = None;
        assert!(validate_scenario(&scenario).unwrap_err().contains("requires both"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(Scenario::parse("nodes = ["), Err(ScenarioLoadError::ParseError(_))));
    }
}
