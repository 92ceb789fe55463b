//! Motion trace feed.
//!
//! A trace set is a collection of named channels, each an ordered sequence of
//! 3-component samples recorded at a fixed sampling rate: position
//! displacement triples (meters) or roll/pitch/yaw triples (degrees). The
//! simulation core reads samples by index through the [`TraceFeed`] trait and
//! never interpolates.
//!
//! Channels are loaded from a JSON file or synthesized (linear drift,
//! Gaussian jitter, Gaussian random walk). Large-scale acceleration traces were
//! never recorded, so the reference scenario generates them randomly.

use anyhow::Context;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::scenario::{Scenario, ScenarioLoadError, SyntheticTrace};
use crate::simulation::types::SimError;

/// What to do when a sample index runs past the end of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceBoundary {
    /// Start over from the first sample.
    Wrap,
    /// Hold the last sample.
    #[default]
    Clamp,
    /// Abort the run.
    Fail,
}

impl TraceBoundary {
    /// Map a requested index onto a channel of `len` samples.
    pub fn resolve(&self, channel: &str, index: usize, len: usize) -> Result<usize, SimError> {
        let exhausted = || SimError::TraceExhausted {
            channel: channel.to_string(),
            index,
            len,
        };
        if len == 0 {
            return Err(exhausted());
        }
        if index < len {
            return Ok(index);
        }
        match self {
            TraceBoundary::Wrap => Ok(index % len),
            TraceBoundary::Clamp => Ok(len - 1),
            TraceBoundary::Fail => Err(exhausted()),
        }
    }
}

/// Source of per-tick pose samples.
pub trait TraceFeed {
    /// Sample `index` of `channel`, after applying the boundary policy.
    fn sample(&self, channel: &str, index: usize) -> Result<[f64; 3], SimError>;

    /// Sampling rate of `channel` in samples per second.
    fn sampling_rate(&self, channel: &str) -> Result<f64, SimError>;
}

/// A single named channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceChannel {
    /// Samples per second.
    pub sampling_rate: f64,
    pub samples: Vec<[f64; 3]>,
}

impl TraceChannel {
    pub fn new(sampling_rate: f64, samples: Vec<[f64; 3]>) -> Self {
        Self { sampling_rate, samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Same value at every sample.
    pub fn constant(sampling_rate: f64, value: [f64; 3], len: usize) -> Self {
        Self::new(sampling_rate, vec![value; len])
    }

    /// Sample `k` equals `k * step`.
    pub fn linear_drift(sampling_rate: f64, step: [f64; 3], len: usize) -> Self {
        let samples = (0..len)
            .map(|k| {
                let k = k as f64;
                [step[0] * k, step[1] * k, step[2] * k]
            })
            .collect();
        Self::new(sampling_rate, samples)
    }

    /// Independent zero-mean Gaussian samples on each axis.
    pub fn jitter(sampling_rate: f64, sigma: f64, len: usize, seed: u64) -> Result<Self, SimError> {
        let normal = gaussian(sigma)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let samples = (0..len)
            .map(|_| [normal.sample(&mut rng), normal.sample(&mut rng), normal.sample(&mut rng)])
            .collect();
        Ok(Self::new(sampling_rate, samples))
    }

    /// Cumulative sum of Gaussian increments, starting at the origin.
    pub fn random_walk(sampling_rate: f64, sigma: f64, len: usize, seed: u64) -> Result<Self, SimError> {
        let normal = gaussian(sigma)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut current = [0.0; 3];
        let mut samples = Vec::with_capacity(len);
        for _ in 0..len {
            samples.push(current);
            for axis in current.iter_mut() {
                *axis += normal.sample(&mut rng);
            }
        }
        Ok(Self::new(sampling_rate, samples))
    }
}

fn gaussian(sigma: f64) -> Result<Normal<f64>, SimError> {
    // Normal::new accepts a negative standard deviation and mirrors the samples
    if !(sigma >= 0.0) {
        return Err(SimError::Config(format!("invalid trace sigma {}, must be non-negative", sigma)));
    }
    Normal::new(0.0, sigma).map_err(|e| SimError::Config(format!("invalid trace sigma {}: {}", sigma, e)))
}

/// Named channels plus the boundary policy applied when reading them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceSet {
    pub channels: BTreeMap<String, TraceChannel>,
    #[serde(skip)]
    pub boundary: TraceBoundary,
}

impl TraceSet {
    pub fn new(boundary: TraceBoundary) -> Self {
        Self {
            channels: BTreeMap::new(),
            boundary,
        }
    }

    /// Load channels from a JSON file of the form
    /// `{"channels": {"name": {"sampling_rate": 200.0, "samples": [[x, y, z], ...]}}}`.
    pub fn load(path: &Path) -> Result<Self, ScenarioLoadError> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read trace file: {}", path.display()))
            .map_err(|e| ScenarioLoadError::FileReadError(format!("{:#}", e)))?;

        let set: TraceSet = serde_json::from_str(&data)
            .context("Invalid trace JSON format")
            .map_err(|e| ScenarioLoadError::ParseError(format!("{:#}", e)))?;

        validate_traces(&set).map_err(ScenarioLoadError::ValidationError)?;
        log::info!("Loaded {} trace channels from {}", set.channels.len(), path.display());
        Ok(set)
    }

    /// Assemble the trace set for a scenario: the trace file (the explicit
    /// `file` argument wins over the scenario's own entry), then every synthetic
    /// channel the file does not already provide.
    pub fn for_scenario(scenario: &Scenario, file: Option<&Path>) -> Result<Self, ScenarioLoadError> {
        let file = file.map(Path::to_path_buf).or_else(|| scenario.trace_file.clone());
        let mut set = match file {
            Some(path) => TraceSet::load(&path)?,
            None => TraceSet::default(),
        }
        .with_boundary(scenario.network.trace_boundary);

        for synthetic in &scenario.synthetic_traces {
            if set.contains(synthetic.name()) {
                log::debug!("Trace channel {} provided by file, skipping synthetic generation", synthetic.name());
                continue;
            }
            let channel = synthetic.generate().map_err(|e| ScenarioLoadError::ValidationError(e.to_string()))?;
            set.insert(synthetic.name(), channel);
        }
        Ok(set)
    }

    pub fn with_boundary(mut self, boundary: TraceBoundary) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, channel: TraceChannel) {
        self.channels.insert(name.into(), channel);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    fn channel(&self, name: &str) -> Result<&TraceChannel, SimError> {
        self.channels.get(name).ok_or_else(|| SimError::UnknownTraceChannel(name.to_string()))
    }
}

impl TraceFeed for TraceSet {
    fn sample(&self, channel: &str, index: usize) -> Result<[f64; 3], SimError> {
        let trace = self.channel(channel)?;
        let resolved = self.boundary.resolve(channel, index, trace.len())?;
        Ok(trace.samples[resolved])
    }

    fn sampling_rate(&self, channel: &str) -> Result<f64, SimError> {
        Ok(self.channel(channel)?.sampling_rate)
    }
}

impl SyntheticTrace {
    pub fn name(&self) -> &str {
        match self {
            SyntheticTrace::Constant { name, .. } | SyntheticTrace::LinearDrift { name, .. } | SyntheticTrace::Jitter { name, .. } | SyntheticTrace::RandomWalk { name, .. } => name.as_str(),
        }
    }

    pub fn generate(&self) -> Result<TraceChannel, SimError> {
        match self {
            SyntheticTrace::Constant {
                sampling_rate, value, samples, ..
            } => Ok(TraceChannel::constant(*sampling_rate, *value, *samples)),
            SyntheticTrace::LinearDrift {
                sampling_rate, step, samples, ..
            } => Ok(TraceChannel::linear_drift(*sampling_rate, *step, *samples)),
            SyntheticTrace::Jitter {
                sampling_rate,
                sigma,
                samples,
                seed,
                ..
            } => TraceChannel::jitter(*sampling_rate, *sigma, *samples, *seed),
            SyntheticTrace::RandomWalk {
                sampling_rate,
                sigma,
                samples,
                seed,
                ..
            } => TraceChannel::random_walk(*sampling_rate, *sigma, *samples, *seed),
        }
    }
}

fn validate_traces(set: &TraceSet) -> Result<(), String> {
    for (name, channel) in &set.channels {
        if !(channel.sampling_rate > 0.0) {
            return Err(format!("Trace channel {} has invalid sampling_rate {}, must be positive", name, channel.sampling_rate));
        }
        if channel.is_empty() {
            return Err(format!("Trace channel {} has no samples", name));
        }
        if channel.samples.iter().flatten().any(|v| !v.is_finite()) {
            return Err(format!("Trace channel {} contains non-finite samples", name));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_set(boundary: TraceBoundary) -> TraceSet {
        let mut set = TraceSet::new(boundary);
        set.insert("x", TraceChannel::linear_drift(200.0, [1.0, 0.0, 0.0], 3));
        set
    }

    #[test]
    fn in_range_samples_are_returned_verbatim() {
        let set = counting_set(TraceBoundary::Fail);
        assert_eq!(set.sample("x", 2).unwrap(), [2.0, 0.0, 0.0]);
        assert_eq!(set.sampling_rate("x").unwrap(), 200.0);
    }

    #[test]
    fn boundary_policies() {
        assert_eq!(counting_set(TraceBoundary::Wrap).sample("x", 4).unwrap(), [1.0, 0.0, 0.0]);
        assert_eq!(counting_set(TraceBoundary::Clamp).sample("x", 40).unwrap(), [2.0, 0.0, 0.0]);
        assert_eq!(
            counting_set(TraceBoundary::Fail).sample("x", 3),
            Err(SimError::TraceExhausted {
                channel: "x".into(),
                index: 3,
                len: 3
            })
        );
    }

    #[test]
    fn empty_channel_is_exhausted_under_every_policy() {
        for boundary in [TraceBoundary::Wrap, TraceBoundary::Clamp, TraceBoundary::Fail] {
            let mut set = TraceSet::new(boundary);
            set.insert("empty", TraceChannel::new(200.0, Vec::new()));
            assert!(matches!(set.sample("empty", 0), Err(SimError::TraceExhausted { .. })));
        }
    }

    #[test]
    fn unknown_channel_is_reported() {
        let set = counting_set(TraceBoundary::Clamp);
        assert_eq!(set.sample("nope", 0), Err(SimError::UnknownTraceChannel("nope".into())));
    }

    #[test]
    fn random_walk_is_seeded_and_starts_at_origin() {
        let a = TraceChannel::random_walk(200.0, 0.01, 50, 7).unwrap();
        let b = TraceChannel::random_walk(200.0, 0.01, 50, 7).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.samples[0], [0.0, 0.0, 0.0]);
        assert!(a.samples.iter().skip(1).any(|s| s[0] != 0.0));
    }

    #[test]
    fn jitter_rejects_negative_sigma() {
        assert!(matches!(TraceChannel::jitter(200.0, -1.0, 10, 1), Err(SimError::Config(_))));
        assert!(TraceChannel::random_walk(200.0, -1e-3, 10, 1).is_err());
        assert!(TraceChannel::jitter(200.0, f64::NAN, 10, 1).is_err());
        let still = TraceChannel::jitter(200.0, 0.0, 10, 1).unwrap();
        assert!(still.samples.iter().all(|s| *s == [0.0; 3]));
    }

    #[test]
    fn trace_json_parses() {
        let json = r#"{"channels": {"gyr": {"sampling_rate": 15.0, "samples": [[0.1, 0.2, 0.3], [0.0, 0.0, 0.0]]}}}"#;
        let set: TraceSet = serde_json::from_str(json).unwrap();
        assert!(validate_traces(&set).is_ok());
        assert_eq!(set.sample("gyr", 0).unwrap(), [0.1, 0.2, 0.3]);
        assert_eq!(set.boundary, TraceBoundary::Clamp);
    }
}
