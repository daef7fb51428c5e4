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

use std::{cmp::Reverse, fmt};

use log::{debug, warn};
use rand::{Rng, seq::SliceRandom};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    Id,
    opponents::OpponentHistory,
    pairing::{PairingEngine, Pairings, Search, grow_group},
};

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum QueueError {
    #[error("queue: you are already in the queue")]
    AlreadyQueued,
    #[error("queue: you are not in the queue")]
    NotQueued,
    #[error("queue: you dropped from the tournament")]
    Dropped,
    #[error("queue: you have to submit a deck first")]
    NoDeck,
    #[error("queue: you are still playing a match")]
    InMatch,
    #[error("queue: there is no such competitor")]
    UnknownCompetitor,
    #[error("queue: this tournament is paired in rounds")]
    NotFluid,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct QueueEntry {
    pub id: Id,
    /// Byes received when the competitor queued.
    pub byes: u32,
}

/// Competitors waiting for a match, in tiers of priority.
///
/// Tier 0 holds the newest arrivals. Someone who fails to pair moves one
/// tier up and is considered earlier next time. Trailing empty tiers are
/// trimmed, but tier 0 always exists.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PriorityQueue {
    tiers: Vec<Vec<QueueEntry>>,
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self {
            tiers: vec![Vec::new()],
        }
    }
}

impl PriorityQueue {
    /// # Errors
    ///
    /// If the competitor is already queued.
    pub fn add(&mut self, entry: QueueEntry) -> Result<(), QueueError> {
        if self.contains(entry.id) {
            return Err(QueueError::AlreadyQueued);
        }

        self.insert_at(0, entry);
        Ok(())
    }

    /// Returns false if the competitor was not queued.
    pub fn remove(&mut self, id: Id) -> bool {
        let removed = self.take(id).is_some();
        self.trim();
        removed
    }

    #[must_use]
    pub fn contains(&self, id: Id) -> bool {
        self.tier_of(id).is_some()
    }

    #[must_use]
    pub fn tier_of(&self, id: Id) -> Option<usize> {
        self.tiers
            .iter()
            .position(|tier| tier.iter().any(|entry| entry.id == id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.iter().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.iter().all(Vec::is_empty)
    }

    #[must_use]
    pub fn tiers(&self) -> &[Vec<QueueEntry>] {
        &self.tiers
    }

    #[must_use]
    pub fn ids(&self) -> Vec<Id> {
        self.tiers.iter().flatten().map(|entry| entry.id).collect()
    }

    /// Takes the paired competitors out of the queue and moves the unpaired
    /// ones up to the tier the search left them in. The queue may have
    /// changed while the search ran: a group with a member who left is
    /// thrown away, and competitors who arrived meanwhile stay where they
    /// are. Returns the groups that were taken.
    pub fn commit(&mut self, pairings: &Pairings<PriorityQueue>) -> Vec<Vec<Id>> {
        let mut committed = Vec::new();

        for group in &pairings.groups {
            if group.iter().all(|id| self.contains(*id)) {
                for id in group {
                    self.take(*id);
                }
                committed.push(group.clone());
            } else {
                warn!("queue: dropping the group {group:?}, someone left during the search");
            }
        }

        for (tier, entries) in pairings.leftover.tiers.iter().enumerate() {
            for entry in entries {
                if self.tier_of(entry.id).is_some_and(|current| current < tier)
                    && let Some(entry) = self.take(entry.id)
                {
                    self.insert_at(tier, entry);
                }
            }
        }

        self.trim();
        self.assert_invariants();
        committed
    }

    fn insert_at(&mut self, tier: usize, entry: QueueEntry) {
        if self.tiers.len() <= tier {
            self.tiers.resize_with(tier + 1, Vec::new);
        }

        self.tiers[tier].push(entry);
    }

    fn take(&mut self, id: Id) -> Option<QueueEntry> {
        let tier = self.tier_of(id)?;
        let index = self.tiers[tier].iter().position(|entry| entry.id == id)?;
        Some(self.tiers[tier].swap_remove(index))
    }

    fn trim(&mut self) {
        while self.tiers.len() > 1 && self.tiers.last().is_some_and(Vec::is_empty) {
            self.tiers.pop();
        }
    }

    /// # Panics
    ///
    /// If a competitor is queued twice or tier 0 is missing.
    pub fn assert_invariants(&self) {
        assert!(!self.tiers.is_empty(), "the queue lost its lowest tier");

        let mut seen = FxHashSet::default();
        for entry in self.tiers.iter().flatten() {
            assert!(
                seen.insert(entry.id),
                "competitor {} is queued twice",
                entry.id
            );
        }
    }
}

impl fmt::Display for PriorityQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tiers: Vec<_> = self
            .tiers
            .iter()
            .map(|tier| {
                let ids: Vec<_> = tier.iter().map(|entry| entry.id.to_string()).collect();
                format!("[{}]", ids.join(" "))
            })
            .collect();

        write!(f, "{}", tiers.join(" "))
    }
}

/// The "fluid round": pairs whoever is waiting, best of `attempts` shuffles.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ContinuousQueuePairing {
    pub attempts: usize,
}

impl Default for ContinuousQueuePairing {
    fn default() -> Self {
        Self { attempts: 25 }
    }
}

impl ContinuousQueuePairing {
    /// One shuffle of the queue. The highest tier is considered first, and
    /// within a tier those with the most byes.
    fn attempt<R: Rng + ?Sized>(
        queue: &PriorityQueue,
        group_size: usize,
        history: &OpponentHistory,
        rng: &mut R,
    ) -> (Vec<Vec<Id>>, PriorityQueue) {
        let mut order = Vec::with_capacity(queue.len());
        for (tier, entries) in queue.tiers.iter().enumerate().rev() {
            let mut entries = entries.clone();
            entries.shuffle(rng);
            entries.sort_by_key(|entry| Reverse(entry.byes));
            order.extend(entries.into_iter().map(|entry| (tier, entry)));
        }

        let ids: Vec<_> = order.iter().map(|(_, entry)| entry.id).collect();
        let mut placed = vec![false; ids.len()];
        let mut groups = Vec::new();
        let mut leftover = PriorityQueue::default();

        for anchor in 0..ids.len() {
            if placed[anchor] {
                continue;
            }

            if let Some(indices) = grow_group(&ids, anchor, &placed, group_size, history) {
                for index in &indices {
                    placed[*index] = true;
                }
                groups.push(indices.iter().map(|index| ids[*index]).collect());
            } else {
                placed[anchor] = true;
                let (tier, entry) = order[anchor];
                leftover.insert_at(tier + 1, entry);
            }
        }

        leftover.trim();
        (groups, leftover)
    }
}

impl PairingEngine for ContinuousQueuePairing {
    type Pool = PriorityQueue;
    type Leftover = PriorityQueue;

    /// # Panics
    ///
    /// If `group_size` is less than 2.
    fn attempt_pairing<R: Rng + ?Sized>(
        &self,
        queue: &PriorityQueue,
        group_size: usize,
        history: &OpponentHistory,
        rng: &mut R,
    ) -> Pairings<PriorityQueue> {
        assert!(group_size >= 2, "a group needs at least two competitors");

        let queued = queue.len();
        let best_possible = queued - queued % group_size;

        let (mut groups, mut leftover) = Self::attempt(queue, group_size, history, rng);
        let mut tries = 1;

        while tries < self.attempts && groups.len() * group_size < best_possible {
            let (next_groups, next_leftover) = Self::attempt(queue, group_size, history, rng);
            if next_groups.len() > groups.len() {
                groups = next_groups;
                leftover = next_leftover;
            }
            tries += 1;
        }

        let paired = groups.len() * group_size;
        let search = if paired < best_possible {
            warn!("queue: paired {paired} of {queued} after {tries} attempts");
            Search::Partial
        } else {
            debug!("queue: paired {paired} of {queued} after {tries} attempts");
            Search::Complete
        };

        Pairings {
            groups,
            leftover,
            search,
        }
    }
}
