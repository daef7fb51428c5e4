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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    Id, MatchId,
    outcome::{MatchResult, MatchStatus, Outcome},
    time::{MatchTime, TimeWarning},
};

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum LifecycleError {
    #[error("match: the result is already certified")]
    AlreadyCertified,
    #[error("match: the match is dead")]
    Dead,
    #[error("match: you are not playing in this match")]
    NotAParticipant,
    #[error("match: you already dropped from this match")]
    AlreadyDropped,
    #[error("match: there is no result waiting to be confirmed")]
    NotUncertified,
    #[error("match: you already confirmed the result")]
    AlreadyConfirmed,
    #[error("match: a winner has to be a participant and a draw has no winner")]
    InvalidOverride,
}

/// What a successful report or confirmation did to the match.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Transition {
    /// The reporter conceded and the match goes on without them.
    Dropped,
    /// A result was claimed and now waits for confirmations.
    Uncertified,
    Confirmed,
    Certified,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Match {
    id: MatchId,
    number: u64,
    round: u32,
    participants: Vec<Id>,
    active: BTreeSet<Id>,
    dropped: BTreeSet<Id>,
    confirmed: BTreeSet<Id>,
    status: MatchStatus,
    result: MatchResult,
    winner: Option<Id>,
    created: DateTime<Utc>,
    ended: Option<DateTime<Utc>>,
    time: MatchTime,
}

impl Match {
    /// # Panics
    ///
    /// If `participants` is empty or names someone twice.
    #[must_use]
    pub fn new(
        id: MatchId,
        number: u64,
        round: u32,
        participants: Vec<Id>,
        time: MatchTime,
    ) -> Self {
        let active: BTreeSet<Id> = participants.iter().copied().collect();
        assert!(!participants.is_empty(), "a match needs participants");
        assert_eq!(
            active.len(),
            participants.len(),
            "a match can't name a participant twice"
        );

        Self {
            id,
            number,
            round,
            participants,
            active,
            dropped: BTreeSet::new(),
            confirmed: BTreeSet::new(),
            status: MatchStatus::Open,
            result: MatchResult::None,
            winner: None,
            created: time.start,
            ended: None,
            time,
        }
    }

    /// A bye is certified the moment it exists.
    #[must_use]
    pub fn bye(
        id: MatchId,
        number: u64,
        round: u32,
        competitor: Id,
        now: DateTime<Utc>,
    ) -> Self {
        let mut bye = Self::new(
            id,
            number,
            round,
            vec![competitor],
            MatchTime::stopped(now),
        );
        bye.confirmed.insert(competitor);
        bye.status = MatchStatus::Certified;
        bye.result = MatchResult::Bye;
        bye.winner = Some(competitor);
        bye.ended = Some(now);
        bye
    }

    /// # Errors
    ///
    /// If the match is certified or dead, or the reporter is not an active
    /// participant.
    pub fn report(
        &mut self,
        reporter: Id,
        outcome: Outcome,
    ) -> Result<Transition, LifecycleError> {
        self.check_reporter(reporter)?;

        match outcome {
            Outcome::Loss => {
                self.active.remove(&reporter);
                self.confirmed.remove(&reporter);
                self.dropped.insert(reporter);

                // The claimed winner conceding takes their claim with them, the
                // status stays until somebody claims again.
                if self.winner == Some(reporter) {
                    self.result = MatchResult::None;
                    self.winner = None;
                    self.confirmed.clear();
                }

                if self.certify_if_settled() {
                    Ok(Transition::Certified)
                } else {
                    Ok(Transition::Dropped)
                }
            }
            Outcome::Win | Outcome::Draw => {
                if outcome == Outcome::Win {
                    self.result = MatchResult::Winner;
                    self.winner = Some(reporter);
                } else {
                    self.result = MatchResult::Draw;
                    self.winner = None;
                }

                self.confirmed.clear();
                self.confirmed.insert(reporter);
                self.status = MatchStatus::Uncertified;

                if self.certify_if_settled() {
                    Ok(Transition::Certified)
                } else {
                    Ok(Transition::Uncertified)
                }
            }
        }
    }

    /// # Errors
    ///
    /// If no result is waiting for confirmation, the confirmer is not an
    /// active participant, or they already confirmed.
    pub fn confirm(&mut self, confirmer: Id) -> Result<Transition, LifecycleError> {
        if self.status != MatchStatus::Uncertified || self.result == MatchResult::None {
            return Err(LifecycleError::NotUncertified);
        }
        if self.dropped.contains(&confirmer) {
            return Err(LifecycleError::AlreadyDropped);
        }
        if !self.active.contains(&confirmer) {
            return Err(LifecycleError::NotAParticipant);
        }
        if !self.confirmed.insert(confirmer) {
            return Err(LifecycleError::AlreadyConfirmed);
        }

        if self.certify_if_settled() {
            Ok(Transition::Certified)
        } else {
            Ok(Transition::Confirmed)
        }
    }

    /// Sets the result by fiat, certified on the spot. A certified match may
    /// be overridden, a dead one may not.
    ///
    /// # Errors
    ///
    /// If the match is dead, `result` is neither `Winner` nor `Draw`, the
    /// winner is not a participant, or a draw names a winner.
    pub fn record_result(
        &mut self,
        result: MatchResult,
        winner: Option<Id>,
    ) -> Result<(), LifecycleError> {
        if self.status == MatchStatus::Dead {
            return Err(LifecycleError::Dead);
        }

        match (result, winner) {
            (MatchResult::Winner, Some(winner)) if self.participants.contains(&winner) => {
                if self.dropped.remove(&winner) {
                    self.active.insert(winner);
                }
            }
            (MatchResult::Draw, None) => {}
            _ => return Err(LifecycleError::InvalidOverride),
        }

        self.result = result;
        self.winner = winner;
        self.confirmed.clone_from(&self.active);
        self.certify(Utc::now());
        Ok(())
    }

    /// Removes the match from play for good; the number stays taken.
    pub fn kill(&mut self) {
        self.participants.clear();
        self.active.clear();
        self.dropped.clear();
        self.confirmed.clear();
        self.status = MatchStatus::Dead;
        self.result = MatchResult::Dead;
        self.winner = None;
        self.ended = Some(Utc::now());
        self.time.stop();
    }

    /// Returns false when nothing changed: the match is certified, its timer
    /// is stopped, or `seconds` is not positive.
    pub fn give_time_extension(&mut self, seconds: i64, now: DateTime<Utc>) -> bool {
        if self.status == MatchStatus::Certified {
            return false;
        }

        self.time.extend(seconds, now)
    }

    pub fn check_time(&mut self, now: DateTime<Utc>) -> Option<TimeWarning> {
        if !self.status.is_live() {
            return None;
        }

        self.time.check(now)
    }

    /// The match as a text record.
    ///
    /// # Errors
    ///
    /// If serialization fails.
    pub fn to_record(&self) -> anyhow::Result<String> {
        Ok(ron::ser::to_string(self)?)
    }

    /// # Errors
    ///
    /// If the record does not parse or describes an inconsistent match.
    pub fn from_record(record: &str) -> anyhow::Result<Self> {
        let pod: Self = ron::from_str(record)?;
        pod.validate()?;
        Ok(pod)
    }

    /// # Errors
    ///
    /// If the participant sets or the status and result disagree.
    pub fn validate(&self) -> anyhow::Result<()> {
        let participants: BTreeSet<_> = self.participants.iter().copied().collect();
        let union: BTreeSet<_> = self.active.union(&self.dropped).copied().collect();

        if participants.len() != self.participants.len() {
            return Err(anyhow::Error::msg(format!(
                "match {}: a participant is listed twice",
                self.id
            )));
        }
        if !self.active.is_disjoint(&self.dropped) || union != participants {
            return Err(anyhow::Error::msg(format!(
                "match {}: active and dropped participants don't partition the match",
                self.id
            )));
        }
        if !self.confirmed.is_subset(&self.active) {
            return Err(anyhow::Error::msg(format!(
                "match {}: a confirmation comes from an inactive participant",
                self.id
            )));
        }
        if self.status == MatchStatus::Certified && self.result == MatchResult::None {
            return Err(anyhow::Error::msg(format!(
                "match {}: certified without a result",
                self.id
            )));
        }

        Ok(())
    }

    fn check_reporter(&self, reporter: Id) -> Result<(), LifecycleError> {
        match self.status {
            MatchStatus::Dead => Err(LifecycleError::Dead),
            MatchStatus::Certified => Err(LifecycleError::AlreadyCertified),
            MatchStatus::Open | MatchStatus::Uncertified => {
                if self.dropped.contains(&reporter) {
                    Err(LifecycleError::AlreadyDropped)
                } else if self.active.contains(&reporter) {
                    Ok(())
                } else {
                    Err(LifecycleError::NotAParticipant)
                }
            }
        }
    }

    fn certify_if_settled(&mut self) -> bool {
        debug_assert!(self.active.is_disjoint(&self.dropped));
        debug_assert!(self.confirmed.is_subset(&self.active));

        let settled = match self.active.len() {
            0 => {
                self.result = MatchResult::Draw;
                self.winner = None;
                true
            }
            1 => {
                self.result = MatchResult::Winner;
                self.winner = self.active.first().copied();
                self.confirmed.clone_from(&self.active);
                true
            }
            _ => {
                self.status == MatchStatus::Uncertified
                    && self.result != MatchResult::None
                    && self.confirmed.is_superset(&self.active)
            }
        };

        if settled {
            self.certify(Utc::now());
        }

        settled
    }

    fn certify(&mut self, now: DateTime<Utc>) {
        self.status = MatchStatus::Certified;
        self.ended = Some(now);
        self.time.stop();
    }

    #[must_use]
    pub fn id(&self) -> MatchId {
        self.id
    }

    #[must_use]
    pub fn number(&self) -> u64 {
        self.number
    }

    #[must_use]
    pub fn round(&self) -> u32 {
        self.round
    }

    #[must_use]
    pub fn participants(&self) -> &[Id] {
        &self.participants
    }

    #[must_use]
    pub fn active(&self) -> &BTreeSet<Id> {
        &self.active
    }

    #[must_use]
    pub fn dropped(&self) -> &BTreeSet<Id> {
        &self.dropped
    }

    #[must_use]
    pub fn confirmed(&self) -> &BTreeSet<Id> {
        &self.confirmed
    }

    #[must_use]
    pub fn status(&self) -> MatchStatus {
        self.status
    }

    #[must_use]
    pub fn result(&self) -> MatchResult {
        self.result
    }

    #[must_use]
    pub fn winner(&self) -> Option<Id> {
        self.winner
    }

    #[must_use]
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    #[must_use]
    pub fn ended(&self) -> Option<DateTime<Utc>> {
        self.ended
    }

    #[must_use]
    pub fn time(&self) -> &MatchTime {
        &self.time
    }

    #[must_use]
    pub fn is_certified(&self) -> bool {
        self.status == MatchStatus::Certified
    }

    /// Whether `id` is still playing in an open or uncertified match.
    #[must_use]
    pub fn is_playing(&self, id: Id) -> bool {
        self.status.is_live() && self.active.contains(&id)
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let participants: Vec<_> = self.participants.iter().map(ToString::to_string).collect();

        write!(
            f,
            "#{} round {}: {} {} {}",
            self.number,
            self.round,
            participants.join(" "),
            self.status,
            self.result
        )?;

        if let Some(winner) = self.winner {
            write!(f, " {winner}")?;
        }

        Ok(())
    }
}

/// Every match ever created, keyed by id. Matches are never removed.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Matches(pub BTreeMap<MatchId, Match>);

impl Matches {
    #[must_use]
    pub fn get(&self, id: MatchId) -> Option<&Match> {
        self.0.get(&id)
    }

    pub fn get_mut(&mut self, id: MatchId) -> Option<&mut Match> {
        self.0.get_mut(&id)
    }

    /// # Panics
    ///
    /// If a match with the same id already exists.
    pub fn insert(&mut self, pod: Match) {
        let previous = self.0.insert(pod.id, pod);
        assert!(previous.is_none(), "match ids are never reused");
    }

    pub fn live(&self) -> impl Iterator<Item = &Match> {
        self.0.values().filter(|pod| pod.status.is_live())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Id = 10;
    const B: Id = 11;
    const C: Id = 12;
    const D: Id = 13;

    fn four_player_match() -> Match {
        Match::new(0, 1, 1, vec![A, B, C, D], MatchTime::new(Utc::now(), 50))
    }

    #[test]
    fn confirmations_certify_the_claim() -> anyhow::Result<()> {
        let mut pod = four_player_match();

        assert_eq!(pod.report(A, Outcome::Win)?, Transition::Uncertified);
        assert_eq!(pod.status(), MatchStatus::Uncertified);
        assert_eq!(pod.confirmed(), &BTreeSet::from([A]));

        pod.confirm(B)?;
        pod.confirm(C)?;
        assert_eq!(pod.status(), MatchStatus::Uncertified);

        assert_eq!(pod.confirm(D)?, Transition::Certified);
        assert_eq!(pod.status(), MatchStatus::Certified);
        assert_eq!(pod.result(), MatchResult::Winner);
        assert_eq!(pod.winner(), Some(A));
        assert!(pod.ended().is_some());
        assert!(pod.time().stopped);

        Ok(())
    }

    #[test]
    fn three_losses_leave_a_winner() -> anyhow::Result<()> {
        let mut pod = four_player_match();

        assert_eq!(pod.report(B, Outcome::Loss)?, Transition::Dropped);
        assert_eq!(pod.report(C, Outcome::Loss)?, Transition::Dropped);
        assert_eq!(pod.status(), MatchStatus::Open);
        assert_eq!(pod.report(D, Outcome::Loss)?, Transition::Certified);

        assert_eq!(pod.status(), MatchStatus::Certified);
        assert_eq!(pod.result(), MatchResult::Winner);
        assert_eq!(pod.winner(), Some(A));
        assert_eq!(pod.dropped(), &BTreeSet::from([B, C, D]));

        Ok(())
    }

    #[test]
    fn the_last_concession_is_a_draw() -> anyhow::Result<()> {
        let mut pod = Match::new(0, 1, 1, vec![A], MatchTime::new(Utc::now(), 50));

        assert_eq!(pod.report(A, Outcome::Loss)?, Transition::Certified);
        assert_eq!(pod.result(), MatchResult::Draw);
        assert_eq!(pod.winner(), None);
        assert!(pod.active().is_empty());

        Ok(())
    }

    #[test]
    fn a_loss_after_a_claim_can_settle_it() -> anyhow::Result<()> {
        let mut pod = Match::new(0, 1, 1, vec![A, B], MatchTime::new(Utc::now(), 50));
        pod.report(A, Outcome::Win)?;

        assert_eq!(pod.report(B, Outcome::Loss)?, Transition::Certified);
        assert_eq!(pod.winner(), Some(A));

        Ok(())
    }

    #[test]
    fn a_drop_completes_the_confirmations() -> anyhow::Result<()> {
        let mut pod = four_player_match();
        pod.report(A, Outcome::Draw)?;
        pod.confirm(B)?;
        pod.confirm(C)?;

        assert_eq!(pod.report(D, Outcome::Loss)?, Transition::Certified);
        assert_eq!(pod.result(), MatchResult::Draw);
        assert_eq!(pod.winner(), None);

        Ok(())
    }

    #[test]
    fn a_new_claim_overwrites_the_old_one() -> anyhow::Result<()> {
        let mut pod = four_player_match();
        pod.report(A, Outcome::Win)?;
        pod.confirm(B)?;

        assert_eq!(pod.report(C, Outcome::Win)?, Transition::Uncertified);
        assert_eq!(pod.winner(), Some(C));
        assert_eq!(pod.confirmed(), &BTreeSet::from([C]));

        Ok(())
    }

    #[test]
    fn the_claimed_winner_conceding_withdraws_the_claim() -> anyhow::Result<()> {
        let mut pod = four_player_match();
        pod.report(A, Outcome::Win)?;
        pod.confirm(B)?;

        assert_eq!(pod.report(A, Outcome::Loss)?, Transition::Dropped);
        assert_eq!(pod.status(), MatchStatus::Uncertified);
        assert_eq!(pod.result(), MatchResult::None);
        assert_eq!(pod.winner(), None);
        assert!(pod.confirmed().is_empty());
        assert_eq!(pod.confirm(B), Err(LifecycleError::NotUncertified));
        pod.validate()?;

        assert_eq!(pod.report(B, Outcome::Win)?, Transition::Uncertified);
        pod.confirm(C)?;
        assert_eq!(pod.confirm(D)?, Transition::Certified);
        assert_eq!(pod.winner(), Some(B));

        Ok(())
    }

    #[test]
    fn conceding_an_open_match_keeps_it_open() -> anyhow::Result<()> {
        let mut pod = four_player_match();

        assert_eq!(pod.report(A, Outcome::Loss)?, Transition::Dropped);
        assert_eq!(pod.status(), MatchStatus::Open);
        assert_eq!(pod.confirm(B), Err(LifecycleError::NotUncertified));

        Ok(())
    }

    #[test]
    fn a_draw_claimant_conceding_leaves_the_draw_standing() -> anyhow::Result<()> {
        let mut pod = four_player_match();
        pod.report(A, Outcome::Draw)?;
        pod.report(A, Outcome::Loss)?;

        assert_eq!(pod.status(), MatchStatus::Uncertified);
        assert_eq!(pod.result(), MatchResult::Draw);
        pod.confirm(B)?;
        pod.confirm(C)?;
        assert_eq!(pod.confirm(D)?, Transition::Certified);
        assert_eq!(pod.result(), MatchResult::Draw);

        Ok(())
    }

    #[test]
    fn confirming_twice_changes_nothing() -> anyhow::Result<()> {
        let mut pod = four_player_match();
        pod.report(A, Outcome::Win)?;
        pod.confirm(B)?;
        let before = pod.clone();

        assert_eq!(pod.confirm(B), Err(LifecycleError::AlreadyConfirmed));
        assert_eq!(pod, before);

        Ok(())
    }

    #[test]
    fn rejections_leave_the_match_untouched() -> anyhow::Result<()> {
        let mut pod = four_player_match();
        assert_eq!(pod.confirm(A), Err(LifecycleError::NotUncertified));

        pod.report(B, Outcome::Loss)?;
        let before = pod.clone();

        assert_eq!(pod.report(B, Outcome::Win), Err(LifecycleError::AlreadyDropped));
        assert_eq!(pod.report(99, Outcome::Win), Err(LifecycleError::NotAParticipant));
        assert_eq!(pod, before);

        pod.report(A, Outcome::Win)?;
        assert_eq!(pod.confirm(B), Err(LifecycleError::AlreadyDropped));
        assert_eq!(pod.confirm(99), Err(LifecycleError::NotAParticipant));
        pod.confirm(C)?;
        pod.confirm(D)?;

        assert_eq!(pod.report(C, Outcome::Win), Err(LifecycleError::AlreadyCertified));

        Ok(())
    }

    #[test]
    fn killing_is_terminal() {
        let mut pod = four_player_match();
        pod.kill();

        assert_eq!(pod.status(), MatchStatus::Dead);
        assert_eq!(pod.result(), MatchResult::Dead);
        assert!(pod.active().is_empty() && pod.dropped().is_empty());
        assert!(pod.ended().is_some());
        assert_eq!(pod.report(A, Outcome::Win), Err(LifecycleError::Dead));
        assert_eq!(pod.confirm(A), Err(LifecycleError::NotUncertified));
        assert_eq!(
            pod.record_result(MatchResult::Draw, None),
            Err(LifecycleError::Dead)
        );
    }

    #[test]
    fn no_extensions_once_certified() -> anyhow::Result<()> {
        let mut pod = four_player_match();
        assert!(pod.give_time_extension(300, Utc::now()));
        assert_eq!(pod.time().extension_seconds, 300);

        pod.record_result(MatchResult::Winner, Some(C))?;
        assert!(!pod.give_time_extension(300, Utc::now()));
        assert_eq!(pod.time().extension_seconds, 300);

        Ok(())
    }

    #[test]
    fn extensions_can_not_overflow_the_clock() {
        let mut pod = four_player_match();
        let now = pod.created();

        assert!(pod.give_time_extension(i64::MAX / 2, now));
        assert!(pod.give_time_extension(i64::MAX / 2, now));
        assert!(pod.give_time_extension(i64::MAX / 2, now));
        assert!(!pod.give_time_extension(-300, now));
        assert_eq!(pod.time().extension_seconds, i64::MAX);
        assert_eq!(pod.check_time(now), None);
    }

    #[test]
    fn certified_matches_send_no_time_warnings() -> anyhow::Result<()> {
        let mut pod = four_player_match();
        let late = pod.created() + chrono::TimeDelta::minutes(60);
        pod.record_result(MatchResult::Draw, None)?;

        assert_eq!(pod.check_time(late), None);

        Ok(())
    }

    #[test]
    fn overrides_are_validated() -> anyhow::Result<()> {
        let mut pod = four_player_match();
        pod.report(B, Outcome::Loss)?;

        assert_eq!(
            pod.record_result(MatchResult::Winner, Some(99)),
            Err(LifecycleError::InvalidOverride)
        );
        assert_eq!(
            pod.record_result(MatchResult::Draw, Some(A)),
            Err(LifecycleError::InvalidOverride)
        );
        assert_eq!(
            pod.record_result(MatchResult::Bye, None),
            Err(LifecycleError::InvalidOverride)
        );

        pod.record_result(MatchResult::Winner, Some(B))?;
        assert!(pod.is_certified());
        assert_eq!(pod.winner(), Some(B));
        assert!(pod.active().contains(&B));
        pod.validate()?;

        Ok(())
    }

    #[test]
    fn byes_are_born_certified() -> anyhow::Result<()> {
        let bye = Match::bye(4, 5, 2, A, Utc::now());

        assert!(bye.is_certified());
        assert_eq!(bye.result(), MatchResult::Bye);
        assert_eq!(bye.winner(), Some(A));
        bye.validate()?;

        Ok(())
    }

    #[test]
    fn records_round_trip() -> anyhow::Result<()> {
        let mut pod = four_player_match();
        pod.report(D, Outcome::Loss)?;
        pod.report(A, Outcome::Win)?;
        pod.confirm(C)?;
        pod.give_time_extension(120, Utc::now());

        let record = pod.to_record()?;
        let loaded = Match::from_record(&record)?;

        assert_eq!(loaded.status(), pod.status());
        assert_eq!(loaded.result(), pod.result());
        assert_eq!(loaded.winner(), pod.winner());
        assert_eq!(loaded.active(), pod.active());
        assert_eq!(loaded.dropped(), pod.dropped());
        assert_eq!(loaded.confirmed(), pod.confirmed());
        assert_eq!(loaded, pod);

        Ok(())
    }

    #[test]
    fn inconsistent_records_are_rejected() -> anyhow::Result<()> {
        let pod = four_player_match();
        let record = pod.to_record()?.replace("dropped:[]", "dropped:[10]");

        assert!(Match::from_record(&record).is_err());

        Ok(())
    }

    #[test]
    fn the_arena_lists_live_matches() {
        let mut matches = Matches::default();
        matches.insert(four_player_match());
        matches.insert(Match::bye(1, 2, 1, 20, Utc::now()));

        let live: Vec<_> = matches.live().map(Match::id).collect();
        assert_eq!(live, vec![0]);
        assert!(matches.get(0).is_some_and(|pod| pod.is_playing(A)));
    }
}
