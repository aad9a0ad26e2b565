// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Closed-form failure-probability bounds for the three scenarios.
//!
//! All functions here are pure in `(m, mu, lam)` and independent of any
//! trial; the harness only uses them as a comparison column next to the
//! empirical rate, never inside the protocol logic.
//!
//! Combinatorial sums are evaluated in log space (cumulative ln-factorials)
//! so that round counts of several hundred stay finite in `f64`.

use crate::params::Params;

/// Cumulative `ln(n!)` table for binomial and multinomial coefficients.
struct LnFactorial(Vec<f64>);

impl LnFactorial {
    fn new(n: usize) -> Self {
        let mut table = Vec::with_capacity(n + 1);
        let mut acc = 0.0;
        table.push(0.0);
        for i in 1..=n {
            acc += (i as f64).ln();
            table.push(acc);
        }
        Self(table)
    }

    /// `ln C(n, k)`; negative infinity for `k > n`.
    fn ln_choose(&self, n: usize, k: usize) -> f64 {
        if k > n {
            return f64::NEG_INFINITY;
        }
        self.0[n] - self.0[k] - self.0[n - k]
    }

    /// `ln [C(m, l1) * C(m - l1, l2)]`, the three-bucket multinomial.
    fn ln_multinomial(&self, m: usize, l1: usize, l2: usize) -> f64 {
        self.ln_choose(m, l1) + self.ln_choose(m - l1, l2)
    }
}

/// All-honest exact failure probability: `P[Binom(m, 1/3) <= T - 1]`.
///
/// With honest roles and an ideal source, a trial fails exactly when the
/// sender's checkset stays below the threshold; each round enters the
/// checkset independently with probability 1/3.
#[must_use]
pub fn agreement_failure_exact(params: Params) -> f64 {
    let m = params.m;
    let t = params.check_threshold();
    let lf = LnFactorial::new(m);
    let ln_p = (1.0f64 / 3.0).ln();
    let ln_1p = (2.0f64 / 3.0).ln();
    (0..t)
        .map(|k| (lf.ln_choose(m, k) + k as f64 * ln_p + (m - k) as f64 * ln_1p).exp())
        .sum()
}

/// Upper bound on the failure probability under a forged-checkset receiver.
///
/// Sums over the sender-side bucket sizes `(l1, l2, l3)` with per-round
/// weights `(1/3, 1/6, 1/2)`, the binomial tail of the forgery passing the
/// cross-check, and the two threshold tails in `l1`.
#[must_use]
pub fn forged_checkset_upper_bound(params: Params) -> f64 {
    let m = params.m;
    let t = params.check_threshold();
    let q = params.forgery_margin();
    let lf = LnFactorial::new(m);
    let ln_third = (1.0f64 / 3.0).ln();
    let ln_sixth = (1.0f64 / 6.0).ln();
    let ln_half = 0.5f64.ln();
    let ln_two_thirds = (2.0f64 / 3.0).ln();

    let mut first = 0.0;
    for l1 in t..=m.saturating_sub(t) {
        for l2 in 0..=(t - q) {
            let l3 = m - l1 - l2;
            let ln_weight = lf.ln_multinomial(m, l1, l2)
                + l1 as f64 * ln_third
                + l2 as f64 * ln_sixth
                + l3 as f64 * ln_half;
            let mut tail = 0.0;
            for k in (t - q + 1 - l2)..=(t - l2) {
                tail += (lf.ln_choose(t - l2, k)
                    + k as f64 * ln_two_thirds
                    + (t - l2 - k) as f64 * ln_third)
                    .exp();
            }
            first += ln_weight.exp() * tail;
        }
        for l2 in (t - q + 1)..=(m - l1) {
            let l3 = m - l1 - l2;
            first += (lf.ln_multinomial(m, l1, l2)
                + l1 as f64 * ln_third
                + l2 as f64 * ln_sixth
                + l3 as f64 * ln_half)
                .exp();
        }
    }
    for l1 in 0..t {
        first +=
            (lf.ln_choose(m, l1) + l1 as f64 * ln_third + (m - l1) as f64 * ln_two_thirds).exp();
    }

    let mut second = 0.0;
    for i in (m - t + 1)..=m {
        second +=
            (lf.ln_choose(m, i) + i as f64 * ln_third + (m - i) as f64 * ln_two_thirds).exp();
    }

    first + second
}

/// Upper bound on the failure probability under an equivocating sender.
///
/// Sums the probability mass of bucket splits feasible for the attack,
/// discounted by the `(1/2)^Q` chance that the mixed padding survives the
/// first receiver's check, and adds the whole infeasible mass (where the
/// sender declares failure) on top.
#[must_use]
pub fn equivocation_upper_bound(params: Params) -> f64 {
    let m = params.m;
    let t = params.check_threshold();
    let q = params.forgery_margin();
    let lf = LnFactorial::new(m);
    let ln_third = (1.0f64 / 3.0).ln();
    let ln_half = 0.5f64.ln();

    let mut feasible_failure = 0.0;
    let mut feasible_total = 0.0;
    for l3 in t..=m.saturating_sub(q) {
        for l1 in (t - q)..=(m - q - l3) {
            let l2 = m - l1 - l3;
            let ln_prob = lf.ln_multinomial(m, l1, l2) + m as f64 * ln_third;
            feasible_failure += (ln_prob + q as f64 * ln_half).exp();
            feasible_total += ln_prob.exp();
        }
    }
    feasible_failure + (1.0 - feasible_total)
}
