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

//! What every pairing engine promises.
//!
//! An engine reads a pool and the opponent history and proposes groups of
//! exactly `group_size` competitors with no rematches in them. It never
//! records anything: the caller records the history once it commits the
//! groups.

use std::{
    collections::{BTreeMap, btree_map::Entry},
    fmt,
};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Id, opponents::OpponentHistory};

/// How the search went.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Search {
    /// Everybody who could be paired was.
    #[default]
    Complete,
    /// The attempt budget ran out with competitors left unpaired.
    Partial,
    /// No attempt satisfied the opponent history, so the groups ignore it.
    Fallback,
}

impl fmt::Display for Search {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::Partial => write!(f, "partial"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pairings<L> {
    pub groups: Vec<Vec<Id>>,
    pub leftover: L,
    pub search: Search,
}

impl<L> Pairings<L> {
    #[must_use]
    pub fn paired(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }
}

pub trait PairingEngine {
    type Pool;
    type Leftover;

    fn attempt_pairing<R: Rng + ?Sized>(
        &self,
        pool: &Self::Pool,
        group_size: usize,
        history: &OpponentHistory,
        rng: &mut R,
    ) -> Pairings<Self::Leftover>;
}

/// Grows a group around `order[anchor]` from the unplaced entries after it,
/// taking every candidate that keeps the group free of rematches. Returns
/// the indices of the members, or `None` if the group could not be filled.
#[must_use]
pub fn grow_group(
    order: &[Id],
    anchor: usize,
    placed: &[bool],
    group_size: usize,
    history: &OpponentHistory,
) -> Option<Vec<usize>> {
    let mut indices = vec![anchor];
    let mut group = vec![*order.get(anchor)?];

    for (index, candidate) in order.iter().enumerate().skip(anchor + 1) {
        if group.len() == group_size {
            break;
        }
        if placed.get(index).copied().unwrap_or(true) {
            continue;
        }

        if history.is_valid_addition(&group, *candidate) {
            group.push(*candidate);
            indices.push(index);
        }
    }

    (group.len() == group_size).then_some(indices)
}

/// Whether `groups` and `leftover` together hold every id of `pool` exactly
/// once, and nothing else.
#[must_use]
pub fn is_partition(pool: &[Id], groups: &[Vec<Id>], leftover: &[Id]) -> bool {
    let mut counts: BTreeMap<Id, usize> = BTreeMap::new();
    for id in pool {
        *counts.entry(*id).or_default() += 1;
    }

    for id in groups.iter().flatten().chain(leftover) {
        match counts.entry(*id) {
            Entry::Occupied(mut entry) if *entry.get() > 0 => *entry.get_mut() -= 1,
            _ => return false,
        }
    }

    counts.values().all(|count| *count == 0)
}
