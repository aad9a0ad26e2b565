// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Protocol parameters and the threshold policy derived from them.
//!
//! All three roles and the bound calculators derive the checkset-size
//! threshold `T` and the forgery margin `Q` from the same immutable
//! [`Params`] value. No role may cache these across sessions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors detected when validating a configuration, before any trial runs.
#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("round count m must be positive")]
    ZeroRounds,
    #[error("checkset fraction mu={0} must lie in (0, 1)")]
    MuOutOfRange(f64),
    #[error("consistency fraction lam={0} must lie in (0, 1]")]
    LamOutOfRange(f64),
    #[error("threshold T={t} out of range for m={m}")]
    ThresholdOutOfRange { t: usize, m: usize },
    #[error("noise probability p={0} must lie in [0, 1]")]
    NoiseOutOfRange(f64),
    #[error("sweep point has non-positive trial count")]
    ZeroTrials,
    #[error("sweep specification has no parameter values")]
    EmptySweep,
}

/// Immutable parameters of one protocol session.
///
/// `m` is the number of rounds (singlet states consumed), `mu` the required
/// checkset fraction, and `lam` the cross-check consistency fraction.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Number of protocol rounds.
    pub m: usize,
    /// Required checkset fraction, in `(0, 1)`.
    pub mu: f64,
    /// Cross-check consistency fraction, in `(0, 1]`.
    pub lam: f64,
}

impl Params {
    /// Creates a new parameter set. Call [`Params::validate`] before use.
    #[must_use]
    pub const fn new(m: usize, mu: f64, lam: f64) -> Self {
        Self { m, mu, lam }
    }

    /// Checkset-size threshold `T = ceil(mu * m)`.
    ///
    /// A receiver only trusts a transmitted bit backed by a checkset of at
    /// least this size.
    #[must_use]
    pub fn check_threshold(&self) -> usize {
        (self.mu * self.m as f64).ceil() as usize
    }

    /// Forgery margin `Q = T - ceil(T * lam) + 1`.
    ///
    /// The number of mixed-outcome rounds a faulty sender needs to pad a
    /// split checkset with. Only the equivocating sender strategy and the
    /// bound calculators consume this.
    #[must_use]
    pub fn forgery_margin(&self) -> usize {
        let t = self.check_threshold();
        t + 1 - (t as f64 * self.lam).ceil() as usize
    }

    /// Checks that the parameters describe a runnable session.
    ///
    /// Rejects degenerate values of `m`, `mu` and `lam`, as well as any
    /// combination yielding a threshold outside `1..=m`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.m == 0 {
            return Err(ConfigError::ZeroRounds);
        }
        if !(self.mu > 0.0 && self.mu < 1.0) {
            return Err(ConfigError::MuOutOfRange(self.mu));
        }
        if !(self.lam > 0.0 && self.lam <= 1.0) {
            return Err(ConfigError::LamOutOfRange(self.lam));
        }
        let t = self.check_threshold();
        if t < 1 || t > self.m {
            return Err(ConfigError::ThresholdOutOfRange { t, m: self.m });
        }
        Ok(())
    }
}
