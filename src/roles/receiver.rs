// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Receiver state machines: check phase, cross-calling and cross-check.
//!
//! Both receivers collect their delivered outcome per round and then run the
//! check phase against the sender's evidence. The first receiver afterwards
//! cross-calls its output and checkset to the second; the second reconciles
//! a conflicting peer report against its own evidence in the cross-check
//! phase and may override its local value.
//!
//! The first receiver's response to the cross-call is the
//! [`ResponseStrategy`] seam: honest forwarding of the check-phase result,
//! or the forged-checkset attack of a Byzantine receiver.

use std::sync::mpsc;

use log::trace;

use crate::params::Params;
use crate::roles::{CheckSet, Message, Peer, ProtocolAbort, send};

/// Check phase: accept the assigned bit as trusted iff the evidence checkset
/// is large enough and every recorded outcome it points at differs from the
/// bit.
///
/// Returns "no value" (`None`) otherwise. Single-shot, never retried.
/// Checkset indices outside the recorded range count as failed evidence.
#[must_use]
pub fn check_phase(
    params: &Params,
    bit: bool,
    outcomes: &[bool],
    checkset: &CheckSet,
) -> Option<bool> {
    let t = params.check_threshold();
    let valid = checkset.len() >= t
        && checkset
            .iter()
            .all(|i| outcomes.get(i).is_some_and(|&out| out != bit));
    valid.then_some(bit)
}

/// Cross-check phase of the second receiver.
///
/// If the peer's report conflicts with the local trusted value, both are
/// defined, and the peer's checkset meets the size threshold, the local
/// value is overridden iff the count of own outcomes disagreeing with the
/// peer's bit over the peer's checkset reaches `lam*T + (|checkset| - T)`.
#[must_use]
pub fn cross_check(
    params: &Params,
    local: Option<bool>,
    peer: Option<bool>,
    peer_checkset: &CheckSet,
    outcomes: &[bool],
) -> Option<bool> {
    let (Some(mine), Some(theirs)) = (local, peer) else {
        return local;
    };
    if mine == theirs {
        return local;
    }
    let t = params.check_threshold();
    if peer_checkset.len() < t {
        return local;
    }
    let opposite = peer_checkset
        .iter()
        .filter(|&i| outcomes.get(i).is_some_and(|&out| out != theirs))
        .count();
    let needed = params.lam * t as f64 + (peer_checkset.len() - t) as f64;
    if opposite as f64 >= needed {
        trace!("cross-check override: {opposite} opposite outcomes >= {needed}");
        peer
    } else {
        local
    }
}

/// The first receiver's reaction to the sender's evidence.
pub trait ResponseStrategy {
    /// Produces the output to report and the checkset to cross-call.
    fn respond(
        &self,
        params: &Params,
        bit: bool,
        outcomes: &[bool],
        checkset: &CheckSet,
    ) -> (Option<bool>, CheckSet);
}

/// Honest response: run the check phase and forward the sender's checkset
/// unmodified.
#[derive(Clone, Copy, Debug, Default)]
pub struct HonestResponse;

impl ResponseStrategy for HonestResponse {
    fn respond(
        &self,
        params: &Params,
        bit: bool,
        outcomes: &[bool],
        checkset: &CheckSet,
    ) -> (Option<bool>, CheckSet) {
        (
            check_phase(params, bit, outcomes, checkset),
            checkset.clone(),
        )
    }
}

/// Byzantine response: report the complement of the assigned bit, backed by
/// a fabricated checkset built from the received measurements.
///
/// Indices whose outcome equals the forged bit but lie outside the sender's
/// checkset form the credible core; if fewer than `T`, the checkset is
/// padded with indices whose outcome equals the assigned bit. If the
/// padding pool is too small the forgery is infeasible and the report is
/// "no value".
#[derive(Clone, Copy, Debug, Default)]
pub struct ForgedResponse;

impl ResponseStrategy for ForgedResponse {
    fn respond(
        &self,
        params: &Params,
        bit: bool,
        outcomes: &[bool],
        checkset: &CheckSet,
    ) -> (Option<bool>, CheckSet) {
        let target = !bit;
        let mut outside = Vec::new();
        let mut rest = Vec::new();
        for (i, &out) in outcomes.iter().enumerate() {
            if out == target {
                if !checkset.contains(i) {
                    outside.push(i);
                }
            } else {
                rest.push(i);
            }
        }
        let t = params.check_threshold();
        let need = t.saturating_sub(outside.len());
        if need <= rest.len() {
            let mut fake: CheckSet = outside.into_iter().collect();
            fake.extend(rest.into_iter().take(need));
            (Some(target), fake)
        } else {
            (None, outside.into_iter().collect())
        }
    }
}

/// First receiver: collects rounds, then answers the cross-call according to
/// its [`ResponseStrategy`].
#[derive(Debug)]
pub struct FirstReceiver<S: ResponseStrategy> {
    params: Params,
    strategy: S,
    from_sender: Peer,
    to_peer: mpsc::Sender<Message>,
}

impl<S: ResponseStrategy> FirstReceiver<S> {
    #[must_use]
    pub fn new(
        params: Params,
        strategy: S,
        from_sender: Peer,
        to_peer: mpsc::Sender<Message>,
    ) -> Self {
        Self {
            params,
            strategy,
            from_sender,
            to_peer,
        }
    }

    /// Drives the first receiver to completion, returning its output.
    pub fn run(self) -> Result<Option<bool>, ProtocolAbort> {
        let bit = self.from_sender.expect_assign()?;
        let mut outcomes = Vec::with_capacity(self.params.m);
        for _ in 0..self.params.m {
            outcomes.push(self.from_sender.expect_round()?);
        }
        let checkset = self.from_sender.expect_evidence()?;

        let (output, reported) = self.strategy.respond(&self.params, bit, &outcomes, &checkset);
        send(&self.to_peer, Message::Report(output))?;
        send(&self.to_peer, Message::Evidence(reported))?;
        Ok(output)
    }
}

/// Second receiver: always honest, runs check phase plus cross-check.
#[derive(Debug)]
pub struct SecondReceiver {
    params: Params,
    from_sender: Peer,
    from_peer: Peer,
}

impl SecondReceiver {
    #[must_use]
    pub fn new(params: Params, from_sender: Peer, from_peer: Peer) -> Self {
        Self {
            params,
            from_sender,
            from_peer,
        }
    }

    /// Drives the second receiver to completion, returning its final
    /// (possibly overridden) output.
    pub fn run(self) -> Result<Option<bool>, ProtocolAbort> {
        let bit = self.from_sender.expect_assign()?;
        let mut outcomes = Vec::with_capacity(self.params.m);
        for _ in 0..self.params.m {
            outcomes.push(self.from_sender.expect_round()?);
        }
        let checkset = self.from_sender.expect_evidence()?;
        let local = check_phase(&self.params, bit, &outcomes, &checkset);

        let peer_output = self.from_peer.expect_report()?;
        let peer_checkset = self.from_peer.expect_evidence()?;
        Ok(cross_check(
            &self.params,
            local,
            peer_output,
            &peer_checkset,
            &outcomes,
        ))
    }
}
