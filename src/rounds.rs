// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The round generator: per-round correlated randomness for the three roles.
//!
//! Each protocol round consumes one four-qubit singlet state. The sender
//! measures the first two qubits locally (`r0`, `r1`) and the receivers
//! measure the delivered halves (`r2`, `r3`). The protocol logic only relies
//! on the statistical contract of the source, not on how the correlation is
//! produced, so the seam is the [`RoundSource`] trait.
//!
//! [`SingletSource`] is the simulated resource. In the computational basis
//! the singlet state yields `0011` and `1100` with probability 1/3 each and
//! the four mixed outcomes (`0101`, `0110`, `1001`, `1010`) with probability
//! 1/12 each. In particular, whenever the sender's two local outcomes agree,
//! both delivered outcomes are their complement with certainty.

use rand::prelude::*;
use rand::rngs::StdRng;
use thiserror::Error;

/// Classical measurement outcomes of one round, for all four qubits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundOutcome {
    /// Sender's first local outcome.
    pub r0: bool,
    /// Sender's second local outcome.
    pub r1: bool,
    /// Outcome delivered to the first receiver.
    pub r2: bool,
    /// Outcome delivered to the second receiver.
    pub r3: bool,
}

/// Failures of the correlated-randomness resource. Fatal to one trial.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RoundError {
    #[error("round source exhausted after {0} rounds")]
    ResourceExhausted(usize),
    #[error("correlated randomness channel unavailable")]
    ChannelUnavailable,
}

/// Source of per-round correlated randomness.
///
/// Callable exactly as many times as the round budget it was set up with.
pub trait RoundSource {
    /// Produces the next round's outcomes, or fails the trial.
    fn next_round(&mut self) -> Result<RoundOutcome, RoundError>;
}

/// Simulated four-qubit singlet source with per-bit depolarizing noise.
///
/// Deterministic for a fixed seed. With noise probability `p`, each of the
/// four outcome bits is independently replaced by a fresh uniform bit, so
/// `p = 0` reproduces the ideal contract exactly.
#[derive(Debug)]
pub struct SingletSource {
    rng: StdRng,
    noise: f64,
    budget: usize,
    rounds_left: usize,
}

impl SingletSource {
    /// Creates a source dispensing exactly `m` rounds.
    #[must_use]
    pub fn new(m: usize, noise: f64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            noise,
            budget: m,
            rounds_left: m,
        }
    }

    /// Samples one ideal (noiseless) singlet measurement record.
    fn sample_ideal(&mut self) -> RoundOutcome {
        // 12 equally likely cells: 4x `0011`, 4x `1100`, one per mixed outcome
        let (r0, r1, r2, r3) = match self.rng.random_range(0..12u8) {
            0..=3 => (false, false, true, true),
            4..=7 => (true, true, false, false),
            8 => (false, true, false, true),
            9 => (false, true, true, false),
            10 => (true, false, false, true),
            _ => (true, false, true, false),
        };
        RoundOutcome { r0, r1, r2, r3 }
    }
}

impl RoundSource for SingletSource {
    fn next_round(&mut self) -> Result<RoundOutcome, RoundError> {
        if self.rounds_left == 0 {
            return Err(RoundError::ResourceExhausted(self.budget));
        }
        self.rounds_left -= 1;
        let mut outcome = self.sample_ideal();
        if self.noise > 0.0 {
            for bit in [
                &mut outcome.r0,
                &mut outcome.r1,
                &mut outcome.r2,
                &mut outcome.r3,
            ] {
                if self.rng.random_bool(self.noise) {
                    *bit = self.rng.random();
                }
            }
        }
        Ok(outcome)
    }
}
