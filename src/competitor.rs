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

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{Id, MatchId};

/// Answers whether a competitor has handed in the deck(s) the event requires.
pub trait DeckCheck {
    fn has_submitted_deck(&self, id: Id) -> bool;
}

impl<F: Fn(Id) -> bool> DeckCheck for F {
    fn has_submitted_deck(&self, id: Id) -> bool {
        self(id)
    }
}

/// Reads the deck straight off the registered competitors.
impl DeckCheck for Competitors {
    fn has_submitted_deck(&self, id: Id) -> bool {
        self.0
            .get(&id)
            .is_some_and(|competitor| competitor.deck.is_some())
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum CompetitorStatus {
    #[default]
    Active,
    Dropped,
}

impl fmt::Display for CompetitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Dropped => write!(f, "dropped"),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Competitor {
    pub id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: CompetitorStatus,
    /// Matches in the order they were assigned.
    #[serde(default)]
    pub matches: Vec<MatchId>,
    #[serde(default)]
    pub byes: u32,
    /// Display string for the submitted deck, if any.
    #[serde(default)]
    pub deck: Option<String>,
}

impl Competitor {
    #[must_use]
    pub fn new(id: Id, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == CompetitorStatus::Active
    }
}

impl fmt::Display for Competitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.id, self.name, self.status)?;

        if let Some(deck) = &self.deck {
            write!(f, " [{deck}]")?;
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Competitors(pub BTreeMap<Id, Competitor>);

impl Competitors {
    pub fn active(&self) -> impl Iterator<Item = &Competitor> {
        self.0.values().filter(|competitor| competitor.is_active())
    }
}

impl fmt::Display for Competitors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let competitors: Vec<_> = self.0.values().map(ToString::to_string).collect();
        write!(f, "{}", competitors.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_deck_checks() {
        let even = |id: Id| id % 2 == 0;
        assert!(even.has_submitted_deck(2));
        assert!(!even.has_submitted_deck(3));
    }

    #[test]
    fn registry_checks_the_deck_field() {
        let mut competitors = Competitors::default();
        let mut ready = Competitor::new(0, "ready");
        ready.deck = Some("Mono Green Elves".to_string());
        competitors.0.insert(0, ready);
        competitors.0.insert(1, Competitor::new(1, "unready"));

        assert!(competitors.has_submitted_deck(0));
        assert!(!competitors.has_submitted_deck(1));
        assert!(!competitors.has_submitted_deck(2));
    }

    #[test]
    fn dropped_competitors_are_not_active() {
        let mut competitors = Competitors::default();
        competitors.0.insert(0, Competitor::new(0, "a"));
        let mut dropped = Competitor::new(1, "b");
        dropped.status = CompetitorStatus::Dropped;
        competitors.0.insert(1, dropped);

        let active: Vec<_> = competitors.active().map(|competitor| competitor.id).collect();
        assert_eq!(active, vec![0]);
        assert_eq!(competitors.to_string(), "0 a active, 1 b dropped");
    }
}
