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

use std::{fs, path::Path, time::Duration};

use chrono::Utc;
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    Id, MatchId,
    competitor::{Competitor, CompetitorStatus, Competitors, DeckCheck},
    config::{Config, PairingMode},
    event::{Event, Messenger},
    opponents::OpponentHistory,
    outcome::{MatchResult, Outcome},
    pairing::{PairingEngine, Pairings},
    pod_match::{LifecycleError, Match, Matches, Transition},
    queue::{PriorityQueue, QueueEntry, QueueError},
    standings::{Standings, StandingsRow},
    swiss::SwissProposal,
    time::{MatchTime, TimeWarning},
};

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum TournamentError {
    #[error("tournament: there is no match {0}")]
    UnknownMatch(MatchId),
    #[error("tournament: there is no competitor {0}")]
    UnknownCompetitor(Id),
    #[error("tournament: competitor {0} is already registered")]
    AlreadyRegistered(Id),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("tournament: there is no round waiting for confirmation")]
    NoPendingRound,
    #[error("tournament: round {0} is still being played")]
    RoundInProgress(u32),
    #[error("tournament: this tournament is paired from a queue")]
    NotSwiss,
}

/// Everything one tournament knows: who plays, every match so far, and who
/// has already met whom.
///
/// The queue, a pending Swiss round and the messenger are not saved. Only
/// committed matches and the opponent history survive a restart.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Tournament {
    config: Config,
    competitors: Competitors,
    matches: Matches,
    history: OpponentHistory,
    next_match: MatchId,
    round: u32,
    #[serde(skip)]
    queue: PriorityQueue,
    #[serde(skip)]
    pending: Option<SwissProposal>,
    #[serde(skip)]
    messenger: Messenger,
}

impl Tournament {
    /// # Errors
    ///
    /// If the config can't pair anyone, see [`Config::validate`].
    pub fn new(config: Config) -> anyhow::Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            ..Self::default()
        })
    }

    pub fn set_messenger(&mut self, messenger: Messenger) {
        self.messenger = messenger;
    }

    /// # Errors
    ///
    /// If the id is taken.
    pub fn register(&mut self, id: Id, name: &str) -> Result<(), TournamentError> {
        if self.competitors.0.contains_key(&id) {
            return Err(TournamentError::AlreadyRegistered(id));
        }

        info!("{id} {name} registered");
        self.competitors.0.insert(id, Competitor::new(id, name));
        Ok(())
    }

    /// # Errors
    ///
    /// If the competitor is unknown.
    pub fn set_deck(&mut self, id: Id, deck: Option<String>) -> Result<(), TournamentError> {
        let competitor = self.competitor_mut(id)?;
        competitor.deck = deck;
        Ok(())
    }

    /// Drops the competitor from the tournament. They leave the queue and
    /// concede every match they are still playing. Returns those matches.
    ///
    /// # Errors
    ///
    /// If the competitor is unknown.
    pub fn drop_competitor(&mut self, id: Id) -> Result<Vec<MatchId>, TournamentError> {
        let competitor = self.competitor_mut(id)?;
        if competitor.status == CompetitorStatus::Dropped {
            return Ok(Vec::new());
        }
        competitor.status = CompetitorStatus::Dropped;
        info!("{id} dropped from the tournament");

        if self.queue.remove(id) {
            self.announce_queue();
        }

        let conceded: Vec<_> = self
            .matches
            .live()
            .filter(|pod| pod.is_playing(id))
            .map(Match::id)
            .collect();

        for match_id in &conceded {
            self.report(*match_id, id, Outcome::Loss)?;
        }

        Ok(conceded)
    }

    /// Returns how many are queued now.
    ///
    /// # Errors
    ///
    /// If the tournament is not fluid, or the competitor is unknown, dropped,
    /// has no deck, is still playing, or is already queued.
    pub fn join_queue<D: DeckCheck + ?Sized>(
        &mut self,
        id: Id,
        decks: &D,
    ) -> Result<usize, TournamentError> {
        let checked = self.check_queue_entry(id, decks);
        self.enqueue(id, checked)
    }

    /// [`Tournament::join_queue`] with the decks the competitors registered.
    ///
    /// # Errors
    ///
    /// As for [`Tournament::join_queue`].
    pub fn join_queue_with_registered_decks(&mut self, id: Id) -> Result<usize, TournamentError> {
        let checked = self.check_queue_entry(id, &self.competitors);
        self.enqueue(id, checked)
    }

    fn enqueue(
        &mut self,
        id: Id,
        checked: Result<u32, TournamentError>,
    ) -> Result<usize, TournamentError> {
        let result = checked.and_then(|byes| {
            self.queue.add(QueueEntry { id, byes })?;
            Ok(self.queue.len())
        });

        match &result {
            Ok(queued) => {
                debug!("{id} joined the queue, {queued} waiting");
                self.announce_queue();
            }
            Err(err) => debug!("{id} can't join the queue: {err}"),
        }

        result
    }

    fn check_queue_entry<D: DeckCheck + ?Sized>(
        &self,
        id: Id,
        decks: &D,
    ) -> Result<u32, TournamentError> {
        if self.config.mode != PairingMode::Fluid {
            return Err(QueueError::NotFluid.into());
        }

        let competitor = self
            .competitors
            .0
            .get(&id)
            .ok_or(QueueError::UnknownCompetitor)?;

        if !competitor.is_active() {
            return Err(QueueError::Dropped.into());
        }
        if !decks.has_submitted_deck(id) {
            return Err(QueueError::NoDeck.into());
        }
        if self.is_playing(id) {
            return Err(QueueError::InMatch.into());
        }

        Ok(competitor.byes)
    }

    /// # Errors
    ///
    /// If the competitor is not queued.
    pub fn leave_queue(&mut self, id: Id) -> Result<usize, TournamentError> {
        if !self.queue.remove(id) {
            return Err(QueueError::NotQueued.into());
        }

        debug!("{id} left the queue");
        self.announce_queue();
        Ok(self.queue.len())
    }

    /// Whether enough competitors wait for a fluid pass.
    #[must_use]
    pub fn should_pair(&self) -> bool {
        self.config.mode == PairingMode::Fluid && self.queue.len() >= self.config.queue_threshold
    }

    /// Searches a copy of the queue. Nothing changes until the result is
    /// handed to [`Tournament::commit_queue`].
    pub fn search_queue<R: Rng + ?Sized>(&self, rng: &mut R) -> Pairings<PriorityQueue> {
        let snapshot = self.queue.clone();
        self.config
            .queue_engine()
            .attempt_pairing(&snapshot, self.config.group_size, &self.history, rng)
    }

    /// Creates a match for every group whose members are all still queued.
    pub fn commit_queue(&mut self, pairings: &Pairings<PriorityQueue>) -> Vec<MatchId> {
        let groups = self.queue.commit(pairings);
        let matches: Vec<_> = groups
            .into_iter()
            .map(|group| self.create_match(group))
            .collect();

        if !matches.is_empty() {
            info!(
                "fluid pass: {} matches, {} still queued",
                matches.len(),
                self.queue.len()
            );
        }

        self.messenger.send(Event::PairingCommitted {
            matches: matches.clone(),
            search: pairings.search,
        });
        self.announce_queue();

        matches
    }

    /// One search and commit of the queue.
    pub fn fluid_pass<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<MatchId> {
        let pairings = self.search_queue(rng);
        self.commit_queue(&pairings)
    }

    /// Pairs the active field for the next round and holds the result until
    /// [`Tournament::confirm_round`]. Proposing again replaces the pending
    /// round.
    ///
    /// # Errors
    ///
    /// If the tournament is fluid, or a match of the current round is still
    /// being played.
    pub fn propose_round<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<SwissProposal, TournamentError> {
        if self.config.mode != PairingMode::Swiss {
            return Err(TournamentError::NotSwiss);
        }
        if self.matches.live().next().is_some() {
            return Err(TournamentError::RoundInProgress(self.round));
        }

        let ranked: Vec<_> = self
            .standings(true)
            .into_iter()
            .map(|row| row.competitor)
            .collect();

        let pairings = self.config.swiss_engine().attempt_pairing(
            &ranked,
            self.config.group_size,
            &self.history,
            rng,
        );
        let proposal = SwissProposal::new(self.round + 1, pairings);

        info!(
            "round {} proposed: {} pods, {} byes, {}",
            proposal.round,
            proposal.groups.len(),
            proposal.byes.len(),
            proposal.search
        );
        self.messenger.send(Event::RoundProposed {
            round: proposal.round,
            groups: proposal.groups.clone(),
            byes: proposal.byes.clone(),
            search: proposal.search,
        });

        self.pending = Some(proposal.clone());
        Ok(proposal)
    }

    /// Turns the pending round into matches and byes. Someone who dropped
    /// since the proposal concedes their match and gets no bye.
    ///
    /// # Errors
    ///
    /// If no round is pending.
    pub fn confirm_round(&mut self) -> Result<Vec<MatchId>, TournamentError> {
        let proposal = self.pending.take().ok_or(TournamentError::NoPendingRound)?;
        self.round = proposal.round;

        let mut matches = Vec::new();
        for id in &proposal.byes {
            if self.competitors.0.get(id).is_some_and(Competitor::is_active) {
                matches.push(self.create_bye(*id));
            }
        }

        for group in proposal.groups {
            let dropped: Vec<_> = group
                .iter()
                .copied()
                .filter(|id| !self.competitors.0.get(id).is_some_and(Competitor::is_active))
                .collect();

            let match_id = self.create_match(group);
            for id in dropped {
                if self.matches.get(match_id).is_some_and(|pod| pod.is_playing(id)) {
                    self.report(match_id, id, Outcome::Loss)?;
                }
            }
            matches.push(match_id);
        }

        info!("round {} confirmed: {} matches", self.round, matches.len());
        self.messenger.send(Event::PairingCommitted {
            matches: matches.clone(),
            search: proposal.search,
        });

        Ok(matches)
    }

    /// # Errors
    ///
    /// If no round is pending.
    pub fn cancel_round(&mut self) -> Result<SwissProposal, TournamentError> {
        let proposal = self.pending.take().ok_or(TournamentError::NoPendingRound)?;
        info!("round {} cancelled", proposal.round);
        Ok(proposal)
    }

    /// Opens a match and records everyone in it as having met.
    pub fn create_match(&mut self, group: Vec<Id>) -> MatchId {
        let id = self.take_match_id();
        self.history.record_pairing(&group);

        for competitor in &group {
            if let Some(competitor) = self.competitors.0.get_mut(competitor) {
                competitor.matches.push(id);
            }
        }

        let time = MatchTime::new(Utc::now(), self.config.match_minutes);
        let pod = Match::new(id, id + 1, self.round, group, time);
        info!("match {pod} created");
        self.matches.insert(pod);

        id
    }

    pub fn create_bye(&mut self, competitor: Id) -> MatchId {
        let id = self.take_match_id();

        if let Some(competitor) = self.competitors.0.get_mut(&competitor) {
            competitor.byes += 1;
            competitor.matches.push(id);
        }

        let pod = Match::bye(id, id + 1, self.round, competitor, Utc::now());
        info!("match {pod} created");
        self.matches.insert(pod);

        id
    }

    fn take_match_id(&mut self) -> MatchId {
        let id = self.next_match;
        self.next_match += 1;
        id
    }

    /// # Errors
    ///
    /// If the match is unknown or rejects the report.
    pub fn report(
        &mut self,
        match_id: MatchId,
        reporter: Id,
        outcome: Outcome,
    ) -> Result<Transition, TournamentError> {
        let transition = self
            .match_mut(match_id)?
            .report(reporter, outcome)
            .inspect_err(|err| debug!("{reporter} can't report on match {match_id}: {err}"))?;

        self.announce(match_id, reporter, transition);
        Ok(transition)
    }

    /// # Errors
    ///
    /// If the match is unknown or rejects the confirmation.
    pub fn confirm(
        &mut self,
        match_id: MatchId,
        confirmer: Id,
    ) -> Result<Transition, TournamentError> {
        let transition = self
            .match_mut(match_id)?
            .confirm(confirmer)
            .inspect_err(|err| debug!("{confirmer} can't confirm match {match_id}: {err}"))?;

        self.announce(match_id, confirmer, transition);
        Ok(transition)
    }

    /// # Errors
    ///
    /// If the match is unknown or the override is invalid.
    pub fn record_result(
        &mut self,
        match_id: MatchId,
        result: MatchResult,
        winner: Option<Id>,
    ) -> Result<(), TournamentError> {
        self.match_mut(match_id)?.record_result(result, winner)?;
        info!("match {match_id} result set to {result}");
        self.announce_certified(match_id);
        Ok(())
    }

    /// # Errors
    ///
    /// If the match is unknown.
    pub fn kill_match(&mut self, match_id: MatchId) -> Result<(), TournamentError> {
        self.match_mut(match_id)?.kill();
        info!("match {match_id} killed");
        self.messenger.send(Event::MatchKilled { id: match_id });
        Ok(())
    }

    /// Returns false when the match is certified, its timer stopped, or
    /// `seconds` is not positive.
    ///
    /// # Errors
    ///
    /// If the match is unknown.
    pub fn give_time_extension(
        &mut self,
        match_id: MatchId,
        seconds: i64,
    ) -> Result<bool, TournamentError> {
        let extended = self
            .match_mut(match_id)?
            .give_time_extension(seconds, Utc::now());

        if extended {
            info!("match {match_id} extended by {seconds} seconds");
        }
        Ok(extended)
    }

    /// # Errors
    ///
    /// If the match is unknown.
    pub fn check_time(&mut self, match_id: MatchId) -> Result<Option<TimeWarning>, TournamentError> {
        let warning = self.match_mut(match_id)?.check_time(Utc::now());

        if let Some(warning) = warning {
            info!("match {match_id}: {warning}");
            self.messenger.send(Event::TimeWarning {
                id: match_id,
                warning,
            });
        }

        Ok(warning)
    }

    /// How long until the match's next time warning is due, if it is still
    /// being played.
    #[must_use]
    pub fn next_time_check(&self, match_id: MatchId) -> Option<Duration> {
        let pod = self.matches.get(match_id)?;
        if !pod.status().is_live() {
            return None;
        }

        pod.time().next_check(Utc::now())
    }

    #[must_use]
    pub fn standings(&self, active_only: bool) -> Vec<StandingsRow> {
        let standings = Standings::new(&self.competitors, &self.matches, self.config.include_byes);

        let competitors = self
            .competitors
            .0
            .values()
            .filter(|competitor| !active_only || competitor.is_active())
            .map(|competitor| competitor.id);

        standings.rank(competitors)
    }

    /// # Errors
    ///
    /// If the snapshot can't be encoded or written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let data = postcard::to_allocvec(self)?;
        fs::write(path.as_ref(), data)?;
        debug!("saved the tournament to {}", path.as_ref().display());
        Ok(())
    }

    /// # Errors
    ///
    /// If the snapshot can't be read, decoded, or holds an inconsistent
    /// match.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read(path.as_ref())?;
        let tournament: Self = postcard::from_bytes(&data)?;

        for pod in tournament.matches.0.values() {
            pod.validate()?;
        }
        tournament.config.validate()?;

        Ok(tournament)
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn competitors(&self) -> &Competitors {
        &self.competitors
    }

    #[must_use]
    pub fn competitor(&self, id: Id) -> Option<&Competitor> {
        self.competitors.0.get(&id)
    }

    #[must_use]
    pub fn matches(&self) -> &Matches {
        &self.matches
    }

    #[must_use]
    pub fn history(&self) -> &OpponentHistory {
        &self.history
    }

    #[must_use]
    pub fn queue(&self) -> &PriorityQueue {
        &self.queue
    }

    #[must_use]
    pub fn pending_round(&self) -> Option<&SwissProposal> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn round(&self) -> u32 {
        self.round
    }

    #[must_use]
    pub fn is_playing(&self, id: Id) -> bool {
        self.matches.live().any(|pod| pod.is_playing(id))
    }

    fn competitor_mut(&mut self, id: Id) -> Result<&mut Competitor, TournamentError> {
        self.competitors
            .0
            .get_mut(&id)
            .ok_or(TournamentError::UnknownCompetitor(id))
    }

    fn match_mut(&mut self, id: MatchId) -> Result<&mut Match, TournamentError> {
        self.matches
            .get_mut(id)
            .ok_or(TournamentError::UnknownMatch(id))
    }

    fn announce(&self, match_id: MatchId, competitor: Id, transition: Transition) {
        match transition {
            Transition::Uncertified => {
                if let Some(pod) = self.matches.get(match_id) {
                    info!("match {match_id}: {competitor} claims {}", pod.result());
                    self.messenger.send(Event::MatchUncertified {
                        id: match_id,
                        claimant: competitor,
                        result: pod.result(),
                    });
                }
            }
            Transition::Certified => self.announce_certified(match_id),
            Transition::Dropped => debug!("match {match_id}: {competitor} conceded"),
            Transition::Confirmed => debug!("match {match_id}: {competitor} confirmed"),
        }
    }

    fn announce_certified(&self, match_id: MatchId) {
        if let Some(pod) = self.matches.get(match_id) {
            info!("match {pod} certified");
            self.messenger.send(Event::MatchCertified {
                id: match_id,
                result: pod.result(),
                winner: pod.winner(),
            });
        }
    }

    fn announce_queue(&self) {
        self.messenger.send(Event::QueueChanged {
            queued: self.queue.len(),
        });
    }
}
