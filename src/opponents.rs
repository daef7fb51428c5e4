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

use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::Id;

/// Who has already been paired against whom.
///
/// The relation is symmetric and only ever grows. It is the one constraint
/// the pairing engines have to respect: it says nothing about skill.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct OpponentHistory(FxHashMap<Id, FxHashSet<Id>>);

impl OpponentHistory {
    /// Records every unordered pair in `group`. Recording a pair twice is a
    /// no-op.
    pub fn record_pairing(&mut self, group: &[Id]) {
        for (a, b) in group.iter().tuple_combinations() {
            if a == b {
                continue;
            }

            self.0.entry(*a).or_default().insert(*b);
            self.0.entry(*b).or_default().insert(*a);
        }
    }

    /// False iff `a` and `b` have been paired before. Nobody is a valid
    /// opponent of themselves.
    #[must_use]
    pub fn is_valid_opponent(&self, a: Id, b: Id) -> bool {
        if a == b {
            return false;
        }

        self.0
            .get(&a)
            .is_none_or(|opponents| !opponents.contains(&b))
    }

    #[must_use]
    pub fn is_valid_group(&self, group: &[Id]) -> bool {
        group
            .iter()
            .tuple_combinations()
            .all(|(a, b)| self.is_valid_opponent(*a, *b))
    }

    /// Whether `candidate` could join `group` without creating a rematch.
    /// Assumes `group` itself is already valid.
    #[must_use]
    pub fn is_valid_addition(&self, group: &[Id], candidate: Id) -> bool {
        group
            .iter()
            .all(|member| self.is_valid_opponent(*member, candidate))
    }

    pub fn opponents_of(&self, id: Id) -> impl Iterator<Item = Id> + '_ {
        self.0.get(&id).into_iter().flatten().copied()
    }

    /// The number of distinct pairs recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.values().map(FxHashSet::len).sum::<usize>() / 2
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_are_symmetric() {
        let mut history = OpponentHistory::default();
        history.record_pairing(&[1, 2]);

        assert!(!history.is_valid_opponent(1, 2));
        assert!(!history.is_valid_opponent(2, 1));
        assert!(history.is_valid_opponent(1, 3));
    }

    #[test]
    fn recording_is_idempotent() {
        let mut history = OpponentHistory::default();
        history.record_pairing(&[1, 2, 3, 4]);
        let once = history.clone();
        history.record_pairing(&[4, 3, 2, 1]);

        assert_eq!(history, once);
        assert_eq!(history.len(), 6);
    }

    #[test]
    fn one_rematch_spoils_the_group() {
        let mut history = OpponentHistory::default();
        history.record_pairing(&[1, 5]);

        assert!(history.is_valid_group(&[1, 2, 3, 4]));
        assert!(!history.is_valid_group(&[1, 2, 3, 5]));
        assert!(!history.is_valid_addition(&[2, 5], 1));
        assert!(history.is_valid_addition(&[2, 3], 1));
    }

    #[test]
    fn nobody_plays_themselves() {
        let history = OpponentHistory::default();
        assert!(!history.is_valid_opponent(7, 7));
        assert!(!history.is_valid_group(&[7, 8, 7]));
    }

    #[test]
    fn opponents_are_listed() {
        let mut history = OpponentHistory::default();
        history.record_pairing(&[1, 2, 3]);

        let mut opponents: Vec<_> = history.opponents_of(1).collect();
        opponents.sort_unstable();
        assert_eq!(opponents, vec![2, 3]);
        assert_eq!(history.opponents_of(9).count(), 0);
    }

    mod proptests {
        use std::collections::BTreeSet;

        use proptest::prelude::*;

        use super::*;

        proptest! {
            /// A group is valid exactly when none of its pairs were recorded.
            #[test]
            fn valid_group_iff_no_shared_history(
                pairs in prop::collection::vec((0u64..10, 0u64..10), 0..30),
                group in prop::collection::btree_set(0u64..10, 2..6),
            ) {
                let mut history = OpponentHistory::default();
                let mut recorded = BTreeSet::new();

                for (a, b) in pairs {
                    history.record_pairing(&[a, b]);
                    if a != b {
                        recorded.insert((a.min(b), a.max(b)));
                    }
                }

                let group: Vec<_> = group.into_iter().collect();
                let shares_history = group
                    .iter()
                    .tuple_combinations()
                    .any(|(a, b)| recorded.contains(&(*a.min(b), *a.max(b))));

                prop_assert_eq!(history.is_valid_group(&group), !shares_history);
            }
        }
    }
}
