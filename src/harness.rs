// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Monte-Carlo harness: sweep execution and outcome aggregation.
//!
//! A [`SweepSpec`] fixes `(mu, lam)` and a scenario, and sweeps either the
//! round count `m` or the noise probability `p` over a list of values, with
//! a trial budget per point. For each point the executor splits the budget
//! into per-worker chunks (even split, remainder to the first workers) and
//! runs the chunks in parallel with [`rayon`]; within a chunk, sessions run
//! sequentially. Workers own disjoint counters that are summed at the end,
//! never mutated concurrently.
//!
//! Per-trial seeds derive from the sweep's base seed, the point index and
//! the trial index, so a whole sweep replays bit-identically.

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::bounds;
use crate::params::{ConfigError, Params};
use crate::roles::sender::SenderVerdict;
use crate::session::{Scenario, Session, mix};

/// Which protocol parameter a sweep varies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SweepParameter {
    /// Sweep the round count, noiseless.
    RoundCount { values: Vec<usize> },
    /// Sweep the noise probability at a fixed round count.
    Noise { m: usize, values: Vec<f64> },
}

/// A full sweep specification: scenario, fixed fractions, points and budget.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepSpec {
    pub scenario: Scenario,
    pub mu: f64,
    pub lam: f64,
    /// Trials per sweep point.
    pub trials: usize,
    /// Base seed; the default gives a fixed, reproducible run.
    #[serde(default)]
    pub seed: u64,
    // kept last so the TOML table form serializes cleanly
    pub parameter: SweepParameter,
}

/// One resolved sweep point.
#[derive(Clone, Copy, Debug)]
struct SweepPoint {
    /// The swept value, as reported in the outcome row.
    value: f64,
    params: Params,
    noise: f64,
}

impl SweepSpec {
    /// Validates the sweep before any trial executes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trials == 0 {
            return Err(ConfigError::ZeroTrials);
        }
        let points = self.points();
        if points.is_empty() {
            return Err(ConfigError::EmptySweep);
        }
        for point in &points {
            point.params.validate()?;
            if !(0.0..=1.0).contains(&point.noise) {
                return Err(ConfigError::NoiseOutOfRange(point.noise));
            }
        }
        Ok(())
    }

    fn points(&self) -> Vec<SweepPoint> {
        match &self.parameter {
            SweepParameter::RoundCount { values } => values
                .iter()
                .map(|&m| SweepPoint {
                    value: m as f64,
                    params: Params::new(m, self.mu, self.lam),
                    noise: 0.0,
                })
                .collect(),
            SweepParameter::Noise { m, values } => values
                .iter()
                .map(|&p| SweepPoint {
                    value: p,
                    params: Params::new(*m, self.mu, self.lam),
                    noise: p,
                })
                .collect(),
        }
    }
}

/// Disjoint per-chunk counters, summed into per-point totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PointStats {
    pub failures: usize,
    /// Trials where the sender declared its own strategy infeasible.
    pub sender_declared: usize,
    pub total: usize,
}

impl PointStats {
    /// Empirical failure probability `failures / total`.
    #[must_use]
    pub fn probability(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.failures as f64 / self.total as f64
    }

    /// Standard error `sqrt(p * (1 - p) / total)` of the empirical rate.
    #[must_use]
    pub fn standard_error(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let p = self.probability();
        (p * (1.0 - p) / self.total as f64).sqrt()
    }

    fn merge(self, other: Self) -> Self {
        Self {
            failures: self.failures + other.failures,
            sender_declared: self.sender_declared + other.sender_declared,
            total: self.total + other.total,
        }
    }
}

/// One row of the outcome report, per sweep point.
#[derive(Clone, Copy, Debug)]
pub struct ReportRow {
    /// The swept parameter value (round count or noise probability).
    pub value: f64,
    pub failures: usize,
    pub total: usize,
    pub probability: f64,
    pub standard_error: f64,
    /// Closed-form bound for the point's `(m, mu, lam)`.
    pub bound: f64,
    /// Sender-declared infeasibility count (faulty-sender sweeps only).
    pub sender_declared: usize,
}

/// Splits `total` trials evenly over `workers`, remainder to the first ones.
///
/// Zero-sized chunks are dropped, so the result may be shorter than
/// `workers`; zero workers yields no chunks.
#[must_use]
pub fn chunk_sizes(total: usize, workers: usize) -> Vec<usize> {
    if workers == 0 {
        return Vec::new();
    }
    let base = total / workers;
    let remainder = total % workers;
    (0..workers)
        .map(|i| base + usize::from(i < remainder))
        .filter(|&len| len > 0)
        .collect()
}

/// The closed-form comparison bound for a scenario at given parameters.
#[must_use]
pub fn theoretical_bound(scenario: Scenario, params: Params) -> f64 {
    match scenario {
        Scenario::AllHonest => bounds::agreement_failure_exact(params),
        Scenario::FaultyReceiver => bounds::forged_checkset_upper_bound(params),
        Scenario::FaultySender => bounds::equivocation_upper_bound(params),
    }
}

/// Runs a full sweep and returns one report row per point.
///
/// Aborted trials are logged and counted as failures; they never propagate.
pub fn run_sweep(spec: &SweepSpec) -> Result<Vec<ReportRow>, ConfigError> {
    spec.validate()?;
    let workers = rayon::current_num_threads();
    let mut rows = Vec::new();

    for (point_idx, point) in spec.points().into_iter().enumerate() {
        let session = Session::new(point.params, spec.scenario, point.noise);
        let point_seed = mix(spec.seed, point_idx as u64);

        let mut offset = 0;
        let mut chunks = Vec::new();
        for len in chunk_sizes(spec.trials, workers) {
            chunks.push((offset, len));
            offset += len;
        }

        let stats = chunks
            .into_par_iter()
            .map(|(start, len)| {
                let mut acc = PointStats::default();
                for trial in start..start + len {
                    acc.total += 1;
                    match session.run(mix(point_seed, trial as u64)) {
                        Ok(result) => {
                            if spec.scenario.classifies_failure(&result) {
                                acc.failures += 1;
                            }
                            if result.sender == SenderVerdict::Failed {
                                acc.sender_declared += 1;
                            }
                        }
                        Err(abort) => {
                            warn!("trial {trial} aborted: {abort}");
                            acc.failures += 1;
                        }
                    }
                }
                acc
            })
            .reduce(PointStats::default, PointStats::merge);

        let row = ReportRow {
            value: point.value,
            failures: stats.failures,
            total: stats.total,
            probability: stats.probability(),
            standard_error: stats.standard_error(),
            bound: theoretical_bound(spec.scenario, point.params),
            sender_declared: stats.sender_declared,
        };
        debug!(
            "point {}: value={} failures={}/{}",
            point_idx, row.value, row.failures, row.total
        );
        info!(
            "value={} empirical={:.4} +- {:.4} bound={:.4}",
            row.value, row.probability, row.standard_error, row.bound
        );
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(scenario: Scenario, trials: usize) -> SweepSpec {
        SweepSpec {
            scenario,
            mu: 0.272,
            lam: 0.94,
            trials,
            parameter: SweepParameter::RoundCount { values: vec![20] },
            seed: 7,
        }
    }

    #[test]
    fn chunking_is_even_with_remainder_first() {
        assert_eq!(chunk_sizes(10, 4), vec![3, 3, 2, 2]);
        assert_eq!(chunk_sizes(8, 4), vec![2, 2, 2, 2]);
        assert_eq!(chunk_sizes(3, 8), vec![1, 1, 1]);
        assert_eq!(chunk_sizes(1000, 7).iter().sum::<usize>(), 1000);
        let sizes = chunk_sizes(1000, 7);
        let max = sizes.iter().max().unwrap();
        let min = sizes.iter().min().unwrap();
        assert!(max - min <= 1);
    }

    #[test]
    fn chunking_degenerate_inputs() {
        assert!(chunk_sizes(10, 0).is_empty());
        assert!(chunk_sizes(0, 4).is_empty());
    }

    #[test]
    fn stats_reference_values() {
        let stats = PointStats {
            failures: 50,
            sender_declared: 0,
            total: 1000,
        };
        assert!((stats.probability() - 0.05).abs() < 1e-12);
        assert!((stats.standard_error() - 0.006892024376045111).abs() < 1e-12);
    }

    #[test]
    fn empty_stats_are_zero() {
        let stats = PointStats::default();
        assert_eq!(stats.probability(), 0.0);
        assert_eq!(stats.standard_error(), 0.0);
    }

    #[test]
    fn rejects_invalid_sweeps() {
        assert_eq!(
            spec(Scenario::AllHonest, 0).validate(),
            Err(ConfigError::ZeroTrials)
        );

        let mut empty = spec(Scenario::AllHonest, 10);
        empty.parameter = SweepParameter::RoundCount { values: vec![] };
        assert_eq!(empty.validate(), Err(ConfigError::EmptySweep));

        let mut noisy = spec(Scenario::AllHonest, 10);
        noisy.parameter = SweepParameter::Noise {
            m: 20,
            values: vec![1.5],
        };
        assert_eq!(noisy.validate(), Err(ConfigError::NoiseOutOfRange(1.5)));
    }

    #[test]
    fn sweep_totals_match_requested_trials() {
        let rows = run_sweep(&spec(Scenario::AllHonest, 64)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total, 64);
        assert!(rows[0].failures <= rows[0].total);
    }

    #[test]
    fn sweeps_replay_identically() {
        let spec = spec(Scenario::FaultyReceiver, 32);
        let a = run_sweep(&spec).unwrap();
        let b = run_sweep(&spec).unwrap();
        assert_eq!(a[0].failures, b[0].failures);
        assert_eq!(a[0].sender_declared, b[0].sender_declared);
    }

    #[test]
    fn sweep_spec_roundtrips_through_toml() {
        let spec = SweepSpec {
            scenario: Scenario::FaultySender,
            mu: 0.272,
            lam: 0.94,
            trials: 100,
            parameter: SweepParameter::Noise {
                m: 300,
                values: vec![0.0, 5e-5, 1e-4],
            },
            seed: 3,
        };
        let text = toml::to_string(&spec).unwrap();
        let parsed: SweepSpec = toml::from_str(&text).unwrap();
        assert_eq!(parsed, spec);
    }
}
