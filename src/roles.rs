// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The three role state machines and their message plumbing.
//!
//! Each role runs strictly sequentially: round loop, then checkset exchange,
//! then cross-calling. Roles communicate over point-to-point FIFO channels,
//! one per peer pair, blocking only at explicit receive points. The typed
//! [`Message`] enum keeps the phase ordering honest: receiving a message of
//! the wrong variant is a [`ProtocolAbort`], fatal to the trial.
//!
//! Honest and adversarial behavior are the strategy seams
//! [`sender::SenderStrategy`] and [`receiver::ResponseStrategy`]; the round
//! loop and message-exchange shape are fixed in the state machines.

pub mod receiver;
pub mod sender;

use std::collections::BTreeSet;
use std::sync::mpsc;

use thiserror::Error;

use crate::rounds::RoundError;

/// A set of round indices claimed as verifiable evidence for a bit value.
///
/// Built once by a role from its local outcomes and never mutated after
/// being sent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckSet(BTreeSet<usize>);

impl CheckSet {
    /// Creates an empty checkset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a round index; returns whether it was newly inserted.
    pub fn insert(&mut self, idx: usize) -> bool {
        self.0.insert(idx)
    }

    #[must_use]
    pub fn contains(&self, idx: usize) -> bool {
        self.0.contains(&idx)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the contained round indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<usize> for CheckSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<usize> for CheckSet {
    fn extend<I: IntoIterator<Item = usize>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

/// Messages exchanged between roles, in mandatory phase order.
#[derive(Clone, Debug)]
pub enum Message {
    /// Bit assignment, sent by the sender before any round.
    Assign(bool),
    /// One delivered measurement outcome.
    Round(bool),
    /// Evidence checkset, closing the round phase.
    Evidence(CheckSet),
    /// Cross-called output of the peer receiver.
    Report(Option<bool>),
}

/// Fatal per-trial protocol errors.
///
/// These are caught at the session boundary and classified as a failed
/// trial; they never crash the executor.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProtocolAbort {
    #[error("peer channel closed before the protocol completed")]
    ChannelClosed,
    #[error("unexpected peer message, expected {0}")]
    UnexpectedMessage(&'static str),
    #[error("role thread panicked")]
    RolePanicked,
    #[error(transparent)]
    Round(#[from] RoundError),
}

/// Receiving end of a point-to-point peer channel.
///
/// The `expect_*` accessors enforce the phase ordering of [`Message`].
#[derive(Debug)]
pub struct Peer {
    rx: mpsc::Receiver<Message>,
}

impl Peer {
    #[must_use]
    pub fn new(rx: mpsc::Receiver<Message>) -> Self {
        Self { rx }
    }

    fn recv(&self) -> Result<Message, ProtocolAbort> {
        self.rx.recv().map_err(|_| ProtocolAbort::ChannelClosed)
    }

    /// Receives the peer's bit assignment.
    pub fn expect_assign(&self) -> Result<bool, ProtocolAbort> {
        match self.recv()? {
            Message::Assign(bit) => Ok(bit),
            _ => Err(ProtocolAbort::UnexpectedMessage("bit assignment")),
        }
    }

    /// Receives one delivered round outcome.
    pub fn expect_round(&self) -> Result<bool, ProtocolAbort> {
        match self.recv()? {
            Message::Round(outcome) => Ok(outcome),
            _ => Err(ProtocolAbort::UnexpectedMessage("round outcome")),
        }
    }

    /// Receives the peer's evidence checkset.
    pub fn expect_evidence(&self) -> Result<CheckSet, ProtocolAbort> {
        match self.recv()? {
            Message::Evidence(checkset) => Ok(checkset),
            _ => Err(ProtocolAbort::UnexpectedMessage("evidence checkset")),
        }
    }

    /// Receives the peer receiver's cross-called output.
    pub fn expect_report(&self) -> Result<Option<bool>, ProtocolAbort> {
        match self.recv()? {
            Message::Report(output) => Ok(output),
            _ => Err(ProtocolAbort::UnexpectedMessage("cross-called output")),
        }
    }
}

/// Sends a message to a peer, mapping a disconnected channel to an abort.
pub(crate) fn send(tx: &mpsc::Sender<Message>, msg: Message) -> Result<(), ProtocolAbort> {
    tx.send(msg).map_err(|_| ProtocolAbort::ChannelClosed)
}
