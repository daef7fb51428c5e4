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

use std::fmt;

use log::{debug, warn};
use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use crate::{
    Id,
    opponents::OpponentHistory,
    pairing::{PairingEngine, Pairings, Search, grow_group},
};

/// Pairs the whole active field at once.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RoundBasedPairing {
    pub attempts: usize,
}

impl Default for RoundBasedPairing {
    fn default() -> Self {
        Self { attempts: 250 }
    }
}

impl RoundBasedPairing {
    /// One shuffle. Fails as soon as some competitor can't fill a group.
    fn attempt<R: Rng + ?Sized>(
        field: &[Id],
        group_size: usize,
        history: &OpponentHistory,
        rng: &mut R,
    ) -> Option<Vec<Vec<Id>>> {
        let mut order = field.to_vec();
        order.shuffle(rng);

        let mut placed = vec![false; order.len()];
        let mut groups = Vec::with_capacity(order.len() / group_size);

        for anchor in 0..order.len() {
            if placed[anchor] {
                continue;
            }

            let indices = grow_group(&order, anchor, &placed, group_size, history)?;
            for index in &indices {
                placed[*index] = true;
            }
            groups.push(indices.iter().map(|index| order[*index]).collect());
        }

        Some(groups)
    }
}

impl PairingEngine for RoundBasedPairing {
    /// Active competitors ranked best to worst.
    type Pool = Vec<Id>;
    /// The byes.
    type Leftover = Vec<Id>;

    /// The best ranked `ranked.len() % group_size` competitors get byes. If
    /// no attempt keeps everyone away from a rematch, the rest are chunked in
    /// ranked order and the result says [`Search::Fallback`].
    ///
    /// # Panics
    ///
    /// If `group_size` is less than 2.
    fn attempt_pairing<R: Rng + ?Sized>(
        &self,
        ranked: &Vec<Id>,
        group_size: usize,
        history: &OpponentHistory,
        rng: &mut R,
    ) -> Pairings<Vec<Id>> {
        assert!(group_size >= 2, "a group needs at least two competitors");

        let byes = ranked.len() % group_size;
        let (bye_ids, field) = ranked.split_at(byes);

        for attempt in 1..=self.attempts {
            if let Some(groups) = Self::attempt(field, group_size, history, rng) {
                debug!(
                    "swiss: paired {} competitors after {attempt} attempts",
                    field.len()
                );
                return Pairings {
                    groups,
                    leftover: bye_ids.to_vec(),
                    search: Search::Complete,
                };
            }
        }

        warn!(
            "swiss: no pairing without rematches after {} attempts, pairing in ranked order",
            self.attempts
        );

        Pairings {
            groups: field.chunks(group_size).map(<[Id]>::to_vec).collect(),
            leftover: bye_ids.to_vec(),
            search: Search::Fallback,
        }
    }
}

/// A round waiting for the organizer to confirm it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SwissProposal {
    pub round: u32,
    pub groups: Vec<Vec<Id>>,
    pub byes: Vec<Id>,
    pub search: Search,
}

impl SwissProposal {
    #[must_use]
    pub fn new(round: u32, pairings: Pairings<Vec<Id>>) -> Self {
        Self {
            round,
            groups: pairings.groups,
            byes: pairings.leftover,
            search: pairings.search,
        }
    }
}

impl fmt::Display for SwissProposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "round {} ({}):", self.round, self.search)?;
        for (number, group) in self.groups.iter().enumerate() {
            let ids: Vec<_> = group.iter().map(ToString::to_string).collect();
            writeln!(f, "  pod {}: {}", number + 1, ids.join(" "))?;
        }

        let byes: Vec<_> = self.byes.iter().map(ToString::to_string).collect();
        write!(f, "  byes: {}", byes.join(" "))
    }
}
