// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Monte-Carlo sweep runner for the detectable-broadcast protocol.
//!
//! Runs one sweep (round count or noise probability) for one scenario and
//! writes per-point outcome rows as CSV: the empirical failure probability
//! with its standard error next to the closed-form bound. Default grids
//! match the published experiments (`mu = 0.272`, `lam = 0.94`, 1000 trials
//! per point).

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use color_eyre::Result;
use color_eyre::eyre::Context;
use log::info;
use singlet::{ReportRow, Scenario, SweepParameter, SweepSpec, logging, run_sweep};
use static_assertions::const_assert_eq;

const MU: f64 = 0.272;
const LAM: f64 = 0.94;
const DEFAULT_TRIALS: usize = 1000;

/// Round-count sweep grid, end exclusive.
const M_SWEEP_START: usize = 20;
const M_SWEEP_END: usize = 400;
const M_SWEEP_STEP: usize = 20;
const_assert_eq!((M_SWEEP_END - M_SWEEP_START) % M_SWEEP_STEP, 0);

/// Noise sweep grid: `p = i / NOISE_DIV` for `i` in `0..=NOISE_GRID_MAX`.
const NOISE_M: usize = 300;
const NOISE_GRID_MAX: usize = 100;
const NOISE_GRID_STEP: usize = 5;
const NOISE_DIV: f64 = 1_000_000.0;
const_assert_eq!(NOISE_GRID_MAX % NOISE_GRID_STEP, 0);

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScenarioArg {
    AllHonest,
    FaultyReceiver,
    FaultySender,
}

impl From<ScenarioArg> for Scenario {
    fn from(arg: ScenarioArg) -> Self {
        match arg {
            ScenarioArg::AllHonest => Self::AllHonest,
            ScenarioArg::FaultyReceiver => Self::FaultyReceiver,
            ScenarioArg::FaultySender => Self::FaultySender,
        }
    }
}

/// Monte-Carlo sweep runner for the singlet detectable-broadcast protocol.
#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Scenario to simulate.
    #[arg(long, value_enum)]
    scenario: ScenarioArg,
    /// Sweeps the noise probability instead of the round count.
    #[arg(long)]
    noise: bool,
    /// Trials per sweep point.
    #[arg(long, default_value_t = DEFAULT_TRIALS)]
    trials: usize,
    /// Base seed for reproducible runs.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// TOML sweep specification, overriding the flags above.
    #[arg(long)]
    sweep_file: Option<PathBuf>,
    /// Output CSV file.
    #[arg(long, default_value = "sweep.csv")]
    output: PathBuf,
}

fn main() -> Result<()> {
    // enable fancy `color_eyre` error messages
    color_eyre::install()?;
    logging::enable_logforth();

    let args = Args::parse();
    let spec = match &args.sweep_file {
        Some(path) => {
            let text = fs::read_to_string(path).context("cannot read sweep file")?;
            toml::from_str(&text).context("cannot parse sweep file")?
        }
        None => default_spec(&args),
    };

    info!(
        "sweeping {:?} with {} trials per point",
        spec.scenario, spec.trials
    );
    let rows = run_sweep(&spec)?;
    write_csv(&args.output, &rows)?;
    info!("wrote {} rows to {}", rows.len(), args.output.display());
    Ok(())
}

fn default_spec(args: &Args) -> SweepSpec {
    let parameter = if args.noise {
        SweepParameter::Noise {
            m: NOISE_M,
            values: (0..=NOISE_GRID_MAX)
                .step_by(NOISE_GRID_STEP)
                .map(|i| i as f64 / NOISE_DIV)
                .collect(),
        }
    } else {
        SweepParameter::RoundCount {
            values: (M_SWEEP_START..M_SWEEP_END).step_by(M_SWEEP_STEP).collect(),
        }
    };
    SweepSpec {
        scenario: args.scenario.into(),
        mu: MU,
        lam: LAM,
        trials: args.trials,
        seed: args.seed,
        parameter,
    }
}

fn write_csv(path: &Path, rows: &[ReportRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "value",
        "failures",
        "trials",
        "failure_probability",
        "standard_error",
        "theoretical_bound",
        "sender_declared",
    ])?;
    for row in rows {
        writer.write_record(&[
            row.value.to_string(),
            row.failures.to_string(),
            row.total.to_string(),
            row.probability.to_string(),
            row.standard_error.to_string(),
            row.bound.to_string(),
            row.sender_declared.to_string(),
        ])?;
        writer.flush()?;
    }
    Ok(())
}
