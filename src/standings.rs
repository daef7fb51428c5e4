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

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use serde::{Deserialize, Serialize};

use crate::{
    Id,
    competitor::Competitors,
    outcome::MatchResult,
    pod_match::{Match, Matches},
};

pub const POINTS_WIN: u32 = 3;
pub const POINTS_BYE: u32 = 3;
pub const POINTS_DRAW: u32 = 1;

/// One competitor's certified results.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Record {
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub byes: u32,
    pub opponents: BTreeSet<Id>,
}

impl Record {
    /// Counts `pod` for `id` if it is certified.
    ///
    /// Conceding is a loss even when the rest of the pod draws, unless
    /// everyone conceded.
    fn add(&mut self, pod: &Match, id: Id) {
        if !pod.is_certified() {
            return;
        }

        match pod.result() {
            MatchResult::Bye => {
                self.byes += 1;
                return;
            }
            MatchResult::Winner => {
                if pod.winner() == Some(id) {
                    self.wins += 1;
                } else {
                    self.losses += 1;
                }
            }
            MatchResult::Draw => {
                if pod.active().is_empty() || pod.active().contains(&id) {
                    self.draws += 1;
                } else {
                    self.losses += 1;
                }
            }
            MatchResult::None | MatchResult::Dead => return,
        }

        self.opponents.extend(
            pod.participants()
                .iter()
                .copied()
                .filter(|participant| *participant != id),
        );
    }

    #[must_use]
    pub fn points(&self, include_byes: bool) -> u32 {
        let mut points = self.wins * POINTS_WIN + self.draws * POINTS_DRAW;
        if include_byes {
            points += self.byes * POINTS_BYE;
        }
        points
    }

    #[must_use]
    pub fn games_count(&self, include_byes: bool) -> u32 {
        let mut games = self.wins + self.draws + self.losses;
        if include_byes {
            games += self.byes;
        }
        games
    }

    /// Wins over certified matches, byes counting as wins when included.
    #[must_use]
    pub fn match_win_rate(&self, include_byes: bool) -> f64 {
        let games = self.games_count(include_byes);
        if games == 0 {
            return 0.0;
        }

        let mut wins = self.wins;
        if include_byes {
            wins += self.byes;
        }

        f64::from(wins) / f64::from(games)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct StandingsRow {
    pub place: usize,
    pub competitor: Id,
    pub points: u32,
    pub match_win_rate: f64,
    pub opponent_win_rate: f64,
}

impl fmt::Display for StandingsRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {:.2}% {:.2}%",
            self.place,
            self.competitor,
            self.points,
            self.match_win_rate * 100.0,
            self.opponent_win_rate * 100.0
        )
    }
}

/// Standings derived from the certified matches. Nothing here is stored;
/// build a fresh one whenever the results change.
#[derive(Clone, Debug, Default)]
pub struct Standings {
    records: BTreeMap<Id, Record>,
    include_byes: bool,
    empty: Record,
}

impl Standings {
    #[must_use]
    pub fn new(competitors: &Competitors, matches: &Matches, include_byes: bool) -> Self {
        let mut records = BTreeMap::new();

        for competitor in competitors.0.values() {
            let mut record = Record::default();

            for id in &competitor.matches {
                if let Some(pod) = matches.get(*id) {
                    record.add(pod, competitor.id);
                }
            }

            records.insert(competitor.id, record);
        }

        Self {
            records,
            include_byes,
            empty: Record::default(),
        }
    }

    #[must_use]
    pub fn record(&self, id: Id) -> &Record {
        self.records.get(&id).unwrap_or(&self.empty)
    }

    #[must_use]
    pub fn points(&self, id: Id) -> u32 {
        self.record(id).points(self.include_byes)
    }

    #[must_use]
    pub fn games_played(&self, id: Id) -> u32 {
        self.record(id).games_count(self.include_byes)
    }

    #[must_use]
    pub fn match_win_rate(&self, id: Id) -> f64 {
        self.record(id).match_win_rate(self.include_byes)
    }

    /// The opponents' match win rate weighted by how many games each
    /// opponent played.
    #[must_use]
    pub fn opponent_win_rate(&self, id: Id) -> f64 {
        let mut weighted_wins = 0.0;
        let mut games = 0.0;

        for opponent in &self.record(id).opponents {
            let opponent_games = f64::from(self.games_played(*opponent));
            weighted_wins += self.match_win_rate(*opponent) * opponent_games;
            games += opponent_games;
        }

        if games > 0.0 {
            weighted_wins / games
        } else {
            0.0
        }
    }

    /// Ranks by points, then match win rate, then opponent win rate, all
    /// descending. Competitors that tie on all three keep their input order.
    #[must_use]
    pub fn rank<I: IntoIterator<Item = Id>>(&self, competitors: I) -> Vec<StandingsRow> {
        let mut rows: Vec<_> = competitors
            .into_iter()
            .map(|competitor| StandingsRow {
                place: 0,
                competitor,
                points: self.points(competitor),
                match_win_rate: self.match_win_rate(competitor),
                opponent_win_rate: self.opponent_win_rate(competitor),
            })
            .collect();

        rows.sort_by(|a, b| {
            b.points
                .cmp(&a.points)
                .then_with(|| b.match_win_rate.total_cmp(&a.match_win_rate))
                .then_with(|| b.opponent_win_rate.total_cmp(&a.opponent_win_rate))
        });

        for (place, row) in (1..).zip(rows.iter_mut()) {
            row.place = place;
        }

        rows
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{competitor::Competitor, outcome::Outcome, time::MatchTime};

    struct Fixture {
        competitors: Competitors,
        matches: Matches,
        next: u64,
    }

    impl Fixture {
        fn new(ids: &[Id]) -> Self {
            let mut competitors = Competitors::default();
            for id in ids {
                competitors
                    .0
                    .insert(*id, Competitor::new(*id, &format!("player-{id}")));
            }

            Self {
                competitors,
                matches: Matches::default(),
                next: 0,
            }
        }

        fn add(&mut self, pod: Match) {
            for id in pod.participants() {
                if let Some(competitor) = self.competitors.0.get_mut(id) {
                    competitor.matches.push(pod.id());
                }
            }
            self.matches.insert(pod);
        }

        fn pod(&mut self, participants: &[Id]) -> Match {
            let id = self.next;
            self.next += 1;
            Match::new(
                id,
                id + 1,
                1,
                participants.to_vec(),
                MatchTime::new(Utc::now(), 50),
            )
        }

        fn win(&mut self, participants: &[Id], winner: Id) {
            let mut pod = self.pod(participants);
            pod.record_result(MatchResult::Winner, Some(winner)).unwrap();
            self.add(pod);
        }

        fn draw(&mut self, participants: &[Id]) {
            let mut pod = self.pod(participants);
            pod.record_result(MatchResult::Draw, None).unwrap();
            self.add(pod);
        }

        fn bye(&mut self, id: Id) {
            let next = self.next;
            self.next += 1;
            self.add(Match::bye(next, next + 1, 1, id, Utc::now()));
        }

        fn standings(&self, include_byes: bool) -> Standings {
            Standings::new(&self.competitors, &self.matches, include_byes)
        }
    }

    #[test]
    fn two_wins_and_a_draw() {
        let mut fixture = Fixture::new(&[1, 2, 3, 4]);
        fixture.win(&[1, 2], 1);
        fixture.win(&[1, 3], 1);
        fixture.draw(&[1, 4]);

        let standings = fixture.standings(true);
        assert_eq!(standings.points(1), 7);
        assert!((standings.match_win_rate(1) - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn open_matches_do_not_count() {
        let mut fixture = Fixture::new(&[1, 2]);
        let mut pod = fixture.pod(&[1, 2]);
        pod.report(1, Outcome::Win).unwrap();
        fixture.add(pod);

        let standings = fixture.standings(true);
        assert_eq!(standings.points(1), 0);
        assert!(standings.match_win_rate(1).abs() < f64::EPSILON);
        assert!(standings.opponent_win_rate(1).abs() < f64::EPSILON);
    }

    #[test]
    fn byes_can_be_left_out() {
        let mut fixture = Fixture::new(&[1, 2]);
        fixture.bye(1);
        fixture.win(&[1, 2], 2);

        let with_byes = fixture.standings(true);
        assert_eq!(with_byes.points(1), 3);
        assert!((with_byes.match_win_rate(1) - 0.5).abs() < f64::EPSILON);

        let without_byes = fixture.standings(false);
        assert_eq!(without_byes.points(1), 0);
        assert!(without_byes.match_win_rate(1).abs() < f64::EPSILON);
    }

    #[test]
    fn conceding_loses_even_when_the_rest_draw() {
        let mut fixture = Fixture::new(&[1, 2, 3]);
        let mut pod = fixture.pod(&[1, 2, 3]);
        pod.report(3, Outcome::Loss).unwrap();
        pod.report(1, Outcome::Draw).unwrap();
        pod.confirm(2).unwrap();
        fixture.add(pod);

        let standings = fixture.standings(true);
        assert_eq!(standings.record(1).draws, 1);
        assert_eq!(standings.record(2).draws, 1);
        assert_eq!(standings.record(3).losses, 1);
    }

    #[test]
    fn opponent_win_rate_is_weighted_by_games() {
        // 1 played 2 and 3. 2 went 1 for 1, 3 went 1 for 4.
        let mut fixture = Fixture::new(&[1, 2, 3, 4, 5, 6, 7]);
        fixture.win(&[1, 2], 2);
        fixture.win(&[1, 3], 3);
        fixture.win(&[3, 4], 4);
        fixture.win(&[3, 5], 5);
        fixture.win(&[3, 6], 6);

        let standings = fixture.standings(true);
        // (1.0 * 1 + 0.25 * 4) / 5, where a simple mean would give 0.625.
        assert!((standings.opponent_win_rate(1) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn ranking_uses_all_three_keys() {
        let mut fixture = Fixture::new(&[1, 2, 3, 4, 5, 6]);
        fixture.win(&[1, 2], 1);
        fixture.win(&[3, 4], 3);
        fixture.win(&[2, 5], 2);
        fixture.win(&[4, 6], 6);
        fixture.win(&[5, 6], 5);

        let standings = fixture.standings(true);
        let ranked: Vec<_> = standings
            .rank([6, 5, 4, 3, 2, 1])
            .iter()
            .map(|row| row.competitor)
            .collect();

        // Everyone but 4 has 3 points. 1 and 3 are undefeated and 1 beat the
        // stronger opponent. 2, 5 and 6 split on opponent win rate.
        assert_eq!(ranked, vec![1, 3, 2, 5, 6, 4]);
    }

    #[test]
    fn long_runs_of_ties_keep_their_order() {
        let fixture = Fixture::new(&[5, 3, 9, 1, 7]);
        let standings = fixture.standings(true);

        let rows = standings.rank([5, 3, 9, 1, 7]);
        let ranked: Vec<_> = rows.iter().map(|row| row.competitor).collect();
        let places: Vec<_> = rows.iter().map(|row| row.place).collect();

        assert_eq!(ranked, vec![5, 3, 9, 1, 7]);
        assert_eq!(places, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn rows_display() {
        let row = StandingsRow {
            place: 1,
            competitor: 4,
            points: 7,
            match_win_rate: 2.0 / 3.0,
            opponent_win_rate: 0.5,
        };

        assert_eq!(row.to_string(), "1 4 7 66.67% 50.00%");
    }
}
