// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sender state machine and its honest/adversarial strategies.
//!
//! The sender assigns a bit to each receiver before the first round, records
//! its own two local outcomes per round, and closes with one evidence
//! checkset per receiver. What varies between strategies is only which bits
//! are assigned and how the checksets are built; the message-exchange shape
//! is fixed in [`Sender`].

use std::sync::mpsc;

use log::debug;
use rand::Rng;

use crate::params::Params;
use crate::roles::{CheckSet, Message, ProtocolAbort, send};
use crate::rounds::RoundSource;

/// The sender's own output at session end.
///
/// [`SenderVerdict::Failed`] is the canonical failure marker of the
/// equivocating strategy, distinct from a receiver's "no value".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SenderVerdict {
    /// The bit the sender considers itself to have sent.
    Bit(bool),
    /// The adversarial strategy's bucket constraints could not be met.
    Failed,
}

/// Per-phase decisions of a sender variant.
pub trait SenderStrategy {
    /// Bits assigned to the first and second receiver, in that order.
    fn assignments(&self) -> (bool, bool);

    /// Records the sender's two local outcomes for round `idx`.
    fn record(&mut self, idx: usize, r0: bool, r1: bool);

    /// Closes the round phase.
    ///
    /// Yields the evidence checksets for the first and second receiver and
    /// the sender's verdict.
    fn finish(self, params: &Params) -> (CheckSet, CheckSet, SenderVerdict);
}

/// Honest sender: one uniformly random bit, the same to both receivers.
///
/// A round enters the checkset iff both local outcomes equal the chosen bit,
/// which under the ideal source pins both delivered outcomes to the
/// complement.
#[derive(Clone, Debug)]
pub struct HonestSender {
    bit: bool,
    checkset: CheckSet,
}

impl HonestSender {
    /// Creates an honest sender with a uniformly random bit.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::with_bit(rng.random())
    }

    #[must_use]
    pub fn with_bit(bit: bool) -> Self {
        Self {
            bit,
            checkset: CheckSet::new(),
        }
    }
}

impl SenderStrategy for HonestSender {
    fn assignments(&self) -> (bool, bool) {
        (self.bit, self.bit)
    }

    fn record(&mut self, idx: usize, r0: bool, r1: bool) {
        if r0 == self.bit && r1 == self.bit {
            self.checkset.insert(idx);
        }
    }

    fn finish(self, _params: &Params) -> (CheckSet, CheckSet, SenderVerdict) {
        (
            self.checkset.clone(),
            self.checkset,
            SenderVerdict::Bit(self.bit),
        )
    }
}

/// Faulty sender: assigns different bits to the two receivers and tries to
/// back both with individually valid checksets.
///
/// Rounds are bucketed by the local outcome pair into both-zero, mixed and
/// both-one (sizes `l1`, `l2`, `l3`). The checkset for the receiver assigned
/// `0` takes `T - Q` both-zero rounds padded with `Q` mixed rounds; the
/// receiver assigned `1` gets the whole both-one bucket. If
/// `T - Q <= l1 && Q <= l2 && T <= l3` fails, the strategy is infeasible and
/// the verdict is the canonical failure marker.
#[derive(Clone, Debug, Default)]
pub struct EquivocatingSender {
    both_zero: Vec<usize>,
    mixed: Vec<usize>,
    both_one: Vec<usize>,
}

impl EquivocatingSender {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SenderStrategy for EquivocatingSender {
    fn assignments(&self) -> (bool, bool) {
        (false, true)
    }

    fn record(&mut self, idx: usize, r0: bool, r1: bool) {
        match (r0, r1) {
            (false, false) => self.both_zero.push(idx),
            (true, true) => self.both_one.push(idx),
            _ => self.mixed.push(idx),
        }
    }

    fn finish(self, params: &Params) -> (CheckSet, CheckSet, SenderVerdict) {
        let t = params.check_threshold();
        let q = params.forgery_margin();
        let (l1, l2, l3) = (self.both_zero.len(), self.mixed.len(), self.both_one.len());
        if t - q <= l1 && q <= l2 && t <= l3 {
            let first = self
                .both_zero
                .iter()
                .take(t - q)
                .chain(self.mixed.iter().take(q))
                .copied()
                .collect();
            let second = self.both_one.into_iter().collect();
            (first, second, SenderVerdict::Bit(false))
        } else {
            debug!("equivocation infeasible: l1={l1} l2={l2} l3={l3} T={t} Q={q}");
            (CheckSet::new(), CheckSet::new(), SenderVerdict::Failed)
        }
    }
}

/// Sender state machine: bit assignment, round loop, checkset exchange.
#[derive(Debug)]
pub struct Sender<S: SenderStrategy> {
    params: Params,
    strategy: S,
    to_first: mpsc::Sender<Message>,
    to_second: mpsc::Sender<Message>,
}

impl<S: SenderStrategy> Sender<S> {
    #[must_use]
    pub fn new(
        params: Params,
        strategy: S,
        to_first: mpsc::Sender<Message>,
        to_second: mpsc::Sender<Message>,
    ) -> Self {
        Self {
            params,
            strategy,
            to_first,
            to_second,
        }
    }

    /// Drives the sender to completion, forwarding each receiver's delivered
    /// outcome as it is produced by the round source.
    pub fn run<R: RoundSource>(mut self, mut source: R) -> Result<SenderVerdict, ProtocolAbort> {
        let (x0, x1) = self.strategy.assignments();
        send(&self.to_first, Message::Assign(x0))?;
        send(&self.to_second, Message::Assign(x1))?;

        for idx in 0..self.params.m {
            let out = source.next_round()?;
            self.strategy.record(idx, out.r0, out.r1);
            send(&self.to_first, Message::Round(out.r2))?;
            send(&self.to_second, Message::Round(out.r3))?;
        }

        let (first, second, verdict) = self.strategy.finish(&self.params);
        send(&self.to_first, Message::Evidence(first))?;
        send(&self.to_second, Message::Evidence(second))?;
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: Params = Params::new(20, 0.272, 0.94);

    #[test]
    fn honest_checkset_collects_agreeing_rounds() {
        let mut strategy = HonestSender::with_bit(true);
        strategy.record(0, true, true);
        strategy.record(1, true, false);
        strategy.record(2, false, false);
        strategy.record(3, true, true);
        let (first, second, verdict) = strategy.finish(&PARAMS);
        assert_eq!(first, second);
        assert_eq!(first.iter().collect::<Vec<_>>(), vec![0, 3]);
        assert_eq!(verdict, SenderVerdict::Bit(true));
    }

    #[test]
    fn equivocation_succeeds_when_buckets_suffice() {
        // T = 6, Q = 1: need l1 >= 5, l2 >= 1, l3 >= 6
        let mut strategy = EquivocatingSender::new();
        for idx in 0..5 {
            strategy.record(idx, false, false);
        }
        for idx in 5..8 {
            strategy.record(idx, false, true);
        }
        for idx in 8..15 {
            strategy.record(idx, true, true);
        }
        let (first, second, verdict) = strategy.finish(&PARAMS);
        assert_eq!(verdict, SenderVerdict::Bit(false));
        // T - Q both-zero rounds plus Q mixed rounds
        assert_eq!(first.iter().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4, 5]);
        // the whole both-one bucket
        assert_eq!(second.len(), 7);
        assert!(second.iter().all(|i| (8..15).contains(&i)));
    }

    #[test]
    fn equivocation_fails_when_buckets_insufficient() {
        // no mixed rounds at all: Q <= l2 cannot hold
        let mut strategy = EquivocatingSender::new();
        for idx in 0..10 {
            strategy.record(idx, false, false);
        }
        for idx in 10..20 {
            strategy.record(idx, true, true);
        }
        let (first, second, verdict) = strategy.finish(&PARAMS);
        assert_eq!(verdict, SenderVerdict::Failed);
        assert!(first.is_empty());
        assert!(second.is_empty());
    }
}
