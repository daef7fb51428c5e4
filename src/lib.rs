//! Pairing engines, a match lifecycle and standings for multiplayer pod
//! tournaments.
//!
//! ## Pairing
//!
//! Two engines share the [`pairing::PairingEngine`] contract:
//!
//! * [`queue::ContinuousQueuePairing`] - the "fluid round", an always open
//!   priority queue that pairs whenever enough competitors are waiting
//! * [`swiss::RoundBasedPairing`] - Swiss rounds paired from a ranked snapshot
//!
//! Both respect [`opponents::OpponentHistory`]: nobody is paired against a
//! competitor they already played.
//!
//! ## Matches
//!
//! A [`pod_match::Match`] moves `Open -> Uncertified -> Certified`, or to
//! `Dead` when an administrator kills it. [`standings::Standings`] ranks
//! competitors on the certified results.
//!
//! [`tournament::Tournament`] ties the pieces together and
//! [`worker::Worker`] runs one tournament on a single writer thread.

// This file is part of pod-pairings.
//
// pod-pairings is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// pod-pairings is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

#![deny(clippy::panic)]

pub mod competitor;
pub mod config;
pub mod event;
pub mod opponents;
pub mod outcome;
pub mod pairing;
pub mod pod_match;
pub mod queue;
pub mod standings;
pub mod swiss;
pub mod time;
pub mod tournament;
pub mod utils;
pub mod worker;

/// A competitor id.
pub type Id = u64;

/// A match id, also its slot in the match arena.
pub type MatchId = u64;

pub const HOME: &str = "pod-pairings";

pub const COPYRIGHT: &str = r".SH COPYRIGHT
Copyright (C) 2026 Pod Pairings Developers

This program is free software: you can redistribute it and/or modify
it under the terms of the GNU Affero General Public License as published by
the Free Software Foundation, either version 3 of the License, or
(at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
GNU Affero General Public License for more details.

You should have received a copy of the GNU Affero General Public License
along with this program.  If not, see <https://www.gnu.org/licenses/>.
";

pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "
Copyright (c) 2026 Pod Pairings Developers
Licensed under the AGPLv3"
);
