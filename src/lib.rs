// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Singlet: Detectable Broadcast from Four-Qubit Singlet States
//!
//! Research simulation of a three-party bit-agreement protocol.
//! A sender distributes a secret bit to two receivers, consuming one
//! four-qubit singlet state per round as a source of correlated randomness.
//! The receivers validate the sender's evidence against their own
//! measurements and must either agree on the bit or detectably abort.
//!
//! The crate has two halves:
//! - The per-role protocol state machines, including the adversarial
//!   strategies a faulty sender or receiver may run ([`roles`], [`session`]).
//! - A Monte-Carlo harness that runs many independent protocol sessions
//!   and compares empirical failure rates against closed-form bounds
//!   ([`harness`], [`bounds`]).

#![deny(rustdoc::broken_intra_doc_links)]

pub mod bounds;
pub mod harness;
pub mod logging;
pub mod params;
pub mod roles;
pub mod rounds;
pub mod session;

pub use self::harness::{ReportRow, SweepParameter, SweepSpec, run_sweep};
pub use self::params::{ConfigError, Params};
pub use self::roles::CheckSet;
pub use self::roles::sender::SenderVerdict;
pub use self::session::{Scenario, Session, TrialResult};
