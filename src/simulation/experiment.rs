//! Experiment driver.
//!
//! One experiment sweeps up to three beam-alignment intervals over the same
//! scenario. Every interval gets a fresh network and scheduler; its capacity
//! samples land in the series named after its sweep position:
//! first `ideal`, second `adaptive`, third `none`.

use serde::Serialize;

use super::antenna::AntennaModel;
use super::network::Network;
use super::node::TraceAssignment;
use super::scheduler::{Scheduler, Step};
use super::types::{NodeKind, Orientation, Position, SimError, Tick};
use crate::common::scenario::Scenario;
use crate::common::trace::TraceFeed;

/// Series an alignment interval is recorded into, by sweep position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentVariant {
    Ideal,
    Adaptive,
    #[serde(rename = "none")]
    NoAlignment,
}

impl AlignmentVariant {
    pub const SWEEP: [AlignmentVariant; 3] = [AlignmentVariant::Ideal, AlignmentVariant::Adaptive, AlignmentVariant::NoAlignment];

    pub fn from_sweep_index(index: usize) -> Result<Self, SimError> {
        Self::SWEEP.get(index).copied().ok_or(SimError::TooManyVariants(index + 1))
    }

    pub fn label(&self) -> &'static str {
        match self {
            AlignmentVariant::Ideal => "ideal",
            AlignmentVariant::Adaptive => "adaptive",
            AlignmentVariant::NoAlignment => "none",
        }
    }
}

/// Capacity of the link at one operation tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacitySample {
    pub tick: Tick,
    /// Simulated seconds since start.
    pub time: f64,
    pub capacity: f64,
    pub variant: AlignmentVariant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub variant: AlignmentVariant,
    pub alignment_interval: Tick,
    pub samples: usize,
    pub mean_capacity: f64,
    pub min_capacity: f64,
    pub alignments: u64,
    /// Tick of the most recent beam alignment, if any happened.
    pub last_alignment: Option<Tick>,
    pub channel_generations: u64,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub samples: Vec<CapacitySample>,
    pub summary: RunSummary,
}

/// State shared by every process of one run.
pub struct Simulation<'a> {
    pub network: Network,
    pub feed: &'a dyn TraceFeed,
    pub variant: AlignmentVariant,
    pub samples: Vec<CapacitySample>,
}

impl Simulation<'_> {
    fn record(&mut self, tick: Tick, capacity: f64) {
        self.samples.push(CapacitySample {
            tick,
            time: tick as f64 * self.network.tick_seconds(),
            capacity,
            variant: self.variant,
        });
    }
}

fn step<'a>(f: impl FnMut(&mut Simulation<'a>, Tick) -> Result<Tick, SimError> + 'static) -> Step<Simulation<'a>> {
    Box::new(f)
}

/// Build the network described by `scenario`: nodes in order, traces
/// attached, the first node linked to the second, pre-processing done.
pub fn build_network(scenario: &Scenario, feed: &dyn TraceFeed) -> Result<Network, SimError> {
    let params = &scenario.network;
    let mut network = Network::new(params.coherence_interval, params.tick_seconds);
    network.set_area(params.width, params.length, params.height);

    for config in &scenario.nodes {
        let antenna = AntennaModel::new(scenario.antenna.beamwidth_deg, scenario.antenna.radius, scenario.antenna.footprint_segments);
        let index = network.add_node(&config.kind, Position::from(config.position), Orientation::from_sample(config.orientation), antenna)?;
        match (&config.position_channel, &config.orientation_channel) {
            (Some(position), Some(orientation)) => {
                let trace = TraceAssignment {
                    position: position.clone(),
                    orientation: orientation.clone(),
                };
                network.assign_trace(index, trace, feed)?;
            }
            (None, None) => {}
            _ => return Err(SimError::Config(format!("node {} needs both a position and an orientation channel", index))),
        }
    }

    if network.nodes().len() < 2 {
        return Err(SimError::Config(format!("a link needs two nodes, {} configured", network.nodes().len())));
    }
    network.add_link(0, 1)?;
    network.pre_processing()?;

    let area = network.area();
    log::info!(
        "Network built: {} nodes in {}x{}x{} m, channel coherence every {} ticks",
        network.nodes().len(),
        area.width,
        area.length,
        area.height,
        network.coherence_interval()
    );
    for kind in NodeKind::ALL {
        let members: Vec<String> = network.nodes_of_kind(kind).iter().map(|n| format!("{} ({})", n.index, n.kind)).collect();
        if !members.is_empty() {
            log::debug!("Registry {}: {}", kind, members.join(", "));
        }
    }
    log::debug!("Initial distance matrix:{}", network.distance_matrix());
    Ok(network)
}

/// Register the processes of one run in their resumption order: channel
/// coherence, node mobility (traced nodes, index order), then alignment and
/// operation for each link.
pub fn schedule_processes<'a>(network: &Network, alignment_interval: Tick) -> Scheduler<Simulation<'a>> {
    let mut scheduler = Scheduler::new();

    scheduler.spawn("channel", step(|sim, now| Ok(sim.network.channel_step(now))));

    for node in network.nodes().iter().filter(|n| n.is_mobile()) {
        let index = node.index;
        scheduler.spawn(
            format!("mobility-{}", index),
            step(move |sim, now| {
                let feed = sim.feed;
                sim.network.advance_node(index, now, feed)?;
                Ok(1)
            }),
        );
    }

    for index in 0..network.links().len() {
        scheduler.spawn(
            format!("alignment-{}", index),
            step(move |sim, now| {
                sim.network.align_link(index, now)?;
                Ok(alignment_interval)
            }),
        );
        scheduler.spawn(
            format!("operation-{}", index),
            step(move |sim, now| {
                let capacity = sim.network.operate_link(index, now)?;
                sim.record(now, capacity);
                Ok(1)
            }),
        );
    }
    scheduler
}

/// Simulate `horizon` ticks with beam alignment every `alignment_interval` ticks.
pub fn run_net(scenario: &Scenario, feed: &dyn TraceFeed, variant: AlignmentVariant, alignment_interval: Tick) -> Result<RunOutcome, SimError> {
    if alignment_interval == 0 {
        return Err(SimError::Config("alignment interval must be at least one tick".to_string()));
    }
    let horizon = scenario.network.horizon;
    let network = build_network(scenario, feed)?;
    let mut scheduler = schedule_processes(&network, alignment_interval);
    let mut sim = Simulation {
        network,
        feed,
        variant,
        samples: Vec::new(),
    };
    log::debug!("Processes: {}", scheduler.process_names().collect::<Vec<_>>().join(", "));

    scheduler.run_until(&mut sim, horizon)?;
    log::debug!("Run stopped after tick {}, {} samples", scheduler.now(), sim.samples.len());

    let (sum, min) = sim.samples.iter().fold((0.0, f64::INFINITY), |(sum, min), s| (sum + s.capacity, min.min(s.capacity)));
    let count = sim.samples.len();
    let summary = RunSummary {
        variant,
        alignment_interval,
        samples: count,
        mean_capacity: if count > 0 { sum / count as f64 } else { 0.0 },
        min_capacity: if count > 0 { min } else { 0.0 },
        alignments: sim.network.links().iter().map(|l| l.alignment_count).sum(),
        last_alignment: sim.network.links().iter().filter_map(|l| l.last_alignment).max(),
        channel_generations: sim.network.channel().generation,
    };
    Ok(RunOutcome {
        samples: sim.samples,
        summary,
    })
}

/// Output of one sweep: a shared time axis and one capacity series per variant.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExperimentSeries {
    pub sim_time: Vec<f64>,
    pub ideal: Vec<f64>,
    pub adaptive: Vec<f64>,
    pub none: Vec<f64>,
    pub summaries: Vec<RunSummary>,
    /// Sweep position of the next run to record.
    #[serde(skip)]
    pub sim_index: usize,
}

impl ExperimentSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a run in the series for the current sweep position. The time
    /// axis is taken from the first run.
    pub fn record_run(&mut self, outcome: RunOutcome) -> Result<(), SimError> {
        let variant = AlignmentVariant::from_sweep_index(self.sim_index)?;
        if self.sim_index == 0 {
            self.sim_time = outcome.samples.iter().map(|s| s.time).collect();
        }
        let capacities = outcome.samples.iter().map(|s| s.capacity);
        match variant {
            AlignmentVariant::Ideal => self.ideal.extend(capacities),
            AlignmentVariant::Adaptive => self.adaptive.extend(capacities),
            AlignmentVariant::NoAlignment => self.none.extend(capacities),
        }
        self.summaries.push(outcome.summary);
        self.sim_index += 1;
        Ok(())
    }

    pub fn series(&self, variant: AlignmentVariant) -> &[f64] {
        match variant {
            AlignmentVariant::Ideal => &self.ideal,
            AlignmentVariant::Adaptive => &self.adaptive,
            AlignmentVariant::NoAlignment => &self.none,
        }
    }
}

/// Run every alignment interval of `scenario` in sweep order.
pub fn run_experiment(scenario: &Scenario, feed: &dyn TraceFeed) -> Result<ExperimentSeries, SimError> {
    let intervals = &scenario.alignment_intervals;
    if intervals.len() > AlignmentVariant::SWEEP.len() {
        return Err(SimError::TooManyVariants(intervals.len()));
    }

    let mut series = ExperimentSeries::new();
    for (index, interval) in intervals.iter().enumerate() {
        let variant = AlignmentVariant::from_sweep_index(index)?;
        log::info!(
            "Simulation {} ({}): alignment every {} ticks over {} ticks",
            index,
            variant.label(),
            interval,
            scenario.network.horizon
        );
        let outcome = run_net(scenario, feed, variant, *interval)?;
        let summary = &outcome.summary;
        log::info!(
            "Simulation {} ({}) done: mean capacity {:.4}, min {:.4}, {} alignments, {} channel refreshes",
            index,
            variant.label(),
            summary.mean_capacity,
            summary.min_capacity,
            summary.alignments,
            summary.channel_generations
        );
        series.record_run(outcome)?;
    }
    Ok(series)
}
