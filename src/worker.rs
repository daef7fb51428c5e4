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

//! One thread owns a tournament. Everyone else talks to it through a
//! [`WorkerHandle`], so the queue, the matches and the opponent history have
//! a single writer and need no locks.

use std::{
    path::PathBuf,
    sync::{
        Arc,
        mpsc::{self, Receiver, Sender},
    },
    thread::{self, JoinHandle},
};

use log::{debug, error, info};
use rand::{SeedableRng, rngs::StdRng};
use rustc_hash::FxHashMap;

use crate::{
    Id, MatchId,
    competitor::DeckCheck,
    outcome::{MatchResult, Outcome},
    pod_match::{Match, Transition},
    standings::StandingsRow,
    swiss::SwissProposal,
    tournament::{Tournament, TournamentError},
};

type Reply<T> = Sender<Result<T, TournamentError>>;

#[derive(Debug)]
pub enum Command {
    Register {
        id: Id,
        name: String,
        reply: Reply<()>,
    },
    SetDeck {
        id: Id,
        deck: Option<String>,
        reply: Reply<()>,
    },
    Drop {
        id: Id,
        reply: Reply<Vec<MatchId>>,
    },
    JoinQueue {
        id: Id,
        reply: Reply<usize>,
    },
    LeaveQueue {
        id: Id,
        reply: Reply<usize>,
    },
    ProposeRound {
        reply: Reply<SwissProposal>,
    },
    ConfirmRound {
        reply: Reply<Vec<MatchId>>,
    },
    CancelRound {
        reply: Reply<SwissProposal>,
    },
    Report {
        match_id: MatchId,
        reporter: Id,
        outcome: Outcome,
        reply: Reply<Transition>,
    },
    Confirm {
        match_id: MatchId,
        confirmer: Id,
        reply: Reply<Transition>,
    },
    RecordResult {
        match_id: MatchId,
        result: MatchResult,
        winner: Option<Id>,
        reply: Reply<()>,
    },
    Kill {
        match_id: MatchId,
        reply: Reply<()>,
    },
    GiveTimeExtension {
        match_id: MatchId,
        seconds: i64,
        reply: Reply<bool>,
    },
    OpenMatches {
        reply: Sender<Vec<Match>>,
    },
    Standings {
        active_only: bool,
        reply: Sender<Vec<StandingsRow>>,
    },
    Save {
        path: PathBuf,
        reply: Sender<anyhow::Result<()>>,
    },
    /// Search the queue and commit the best pairing.
    PairingPass,
    /// The wait after a pass is over.
    CooldownElapsed,
    /// A match timer woke up. Only the newest generation counts.
    CheckTime {
        match_id: MatchId,
        generation: u64,
    },
    Shutdown,
}

pub struct Worker {
    tournament: Tournament,
    decks: Option<Box<dyn DeckCheck + Send>>,
    rng: StdRng,
    tx: Sender<Command>,
    pass_in_flight: bool,
    timers: FxHashMap<MatchId, u64>,
}

impl Worker {
    fn new(
        tournament: Tournament,
        decks: Option<Box<dyn DeckCheck + Send>>,
        seed: Option<u64>,
        tx: Sender<Command>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            tournament,
            decks,
            rng,
            tx,
            pass_in_flight: false,
            timers: FxHashMap::default(),
        }
    }

    /// Runs the tournament on its own thread, checking decks against what the
    /// competitors registered. The thread hands the tournament back after
    /// [`WorkerHandle::shutdown`].
    #[must_use]
    pub fn spawn(
        tournament: Tournament,
        seed: Option<u64>,
    ) -> (WorkerHandle, JoinHandle<anyhow::Result<Tournament>>) {
        Self::spawn_inner(tournament, None, seed)
    }

    /// Like [`Worker::spawn`], but asks `decks` who is ready to queue.
    #[must_use]
    pub fn spawn_with_decks<D: DeckCheck + Send + 'static>(
        tournament: Tournament,
        decks: D,
        seed: Option<u64>,
    ) -> (WorkerHandle, JoinHandle<anyhow::Result<Tournament>>) {
        Self::spawn_inner(tournament, Some(Box::new(decks)), seed)
    }

    fn spawn_inner(
        tournament: Tournament,
        decks: Option<Box<dyn DeckCheck + Send>>,
        seed: Option<u64>,
    ) -> (WorkerHandle, JoinHandle<anyhow::Result<Tournament>>) {
        let (tx, rx) = mpsc::channel();
        let worker = Self::new(tournament, decks, seed, tx.clone());

        let handle = thread::spawn(move || worker.handle_messages(&rx));
        (WorkerHandle::new(tx), handle)
    }

    fn handle_messages(mut self, rx: &Receiver<Command>) -> anyhow::Result<Tournament> {
        info!("pairing worker started");

        for live in self.tournament.matches().live().map(Match::id).collect::<Vec<_>>() {
            self.start_timer(live);
        }

        loop {
            let command = rx.recv()?;
            if !self.handle(command) {
                info!("pairing worker stopped");
                return Ok(self.tournament);
            }
        }
    }

    /// Returns false once the worker should stop.
    #[allow(clippy::too_many_lines)]
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Register { id, name, reply } => {
                let _ok = reply.send(self.tournament.register(id, &name));
            }
            Command::SetDeck { id, deck, reply } => {
                let _ok = reply.send(self.tournament.set_deck(id, deck));
            }
            Command::Drop { id, reply } => {
                let result = self.tournament.drop_competitor(id);
                if let Ok(conceded) = &result {
                    for match_id in conceded {
                        self.start_timer(*match_id);
                    }
                }
                let _ok = reply.send(result);
            }
            Command::JoinQueue { id, reply } => {
                let result = match &self.decks {
                    Some(decks) => self.tournament.join_queue(id, decks.as_ref()),
                    None => self.tournament.join_queue_with_registered_decks(id),
                };

                // The pass is queued ahead of whatever the caller sends next.
                if result.is_ok() {
                    self.schedule_pass();
                }
                let _ok = reply.send(result);
            }
            Command::LeaveQueue { id, reply } => {
                let _ok = reply.send(self.tournament.leave_queue(id));
            }
            Command::ProposeRound { reply } => {
                let _ok = reply.send(self.tournament.propose_round(&mut self.rng));
            }
            Command::ConfirmRound { reply } => {
                let result = self.tournament.confirm_round();
                if let Ok(matches) = &result {
                    for match_id in matches {
                        self.start_timer(*match_id);
                    }
                }
                let _ok = reply.send(result);
            }
            Command::CancelRound { reply } => {
                let _ok = reply.send(self.tournament.cancel_round());
            }
            Command::Report {
                match_id,
                reporter,
                outcome,
                reply,
            } => {
                let result = self.tournament.report(match_id, reporter, outcome);
                if result == Ok(Transition::Certified) {
                    self.timers.remove(&match_id);
                }
                let _ok = reply.send(result);
            }
            Command::Confirm {
                match_id,
                confirmer,
                reply,
            } => {
                let result = self.tournament.confirm(match_id, confirmer);
                if result == Ok(Transition::Certified) {
                    self.timers.remove(&match_id);
                }
                let _ok = reply.send(result);
            }
            Command::RecordResult {
                match_id,
                result,
                winner,
                reply,
            } => {
                let result = self.tournament.record_result(match_id, result, winner);
                if result.is_ok() {
                    self.timers.remove(&match_id);
                }
                let _ok = reply.send(result);
            }
            Command::Kill { match_id, reply } => {
                let result = self.tournament.kill_match(match_id);
                if result.is_ok() {
                    self.timers.remove(&match_id);
                }
                let _ok = reply.send(result);
            }
            Command::GiveTimeExtension {
                match_id,
                seconds,
                reply,
            } => {
                let result = self.tournament.give_time_extension(match_id, seconds);
                if result == Ok(true) {
                    self.start_timer(match_id);
                }
                let _ok = reply.send(result);
            }
            Command::OpenMatches { reply } => {
                let _ok = reply.send(self.tournament.matches().live().cloned().collect());
            }
            Command::Standings { active_only, reply } => {
                let _ok = reply.send(self.tournament.standings(active_only));
            }
            Command::Save { path, reply } => {
                let result = self.tournament.save(&path);
                if let Err(err) = &result {
                    error!("save {}: {err}", path.display());
                }
                let _ok = reply.send(result);
            }
            Command::PairingPass => self.run_pass(),
            Command::CooldownElapsed => {
                self.pass_in_flight = false;
                self.schedule_pass();
            }
            Command::CheckTime {
                match_id,
                generation,
            } => {
                if self.timers.get(&match_id) == Some(&generation) {
                    if let Err(err) = self.tournament.check_time(match_id) {
                        error!("timer for match {match_id}: {err}");
                    }
                    self.start_timer(match_id);
                } else {
                    debug!("match {match_id}: ignoring a stale timer");
                }
            }
            Command::Shutdown => return false,
        }

        true
    }

    fn schedule_pass(&mut self) {
        if !self.pass_in_flight && self.tournament.should_pair() {
            self.pass_in_flight = true;
            let _ok = self.tx.send(Command::PairingPass);
        }
    }

    fn run_pass(&mut self) {
        let matches = self.tournament.fluid_pass(&mut self.rng);
        for match_id in &matches {
            self.start_timer(*match_id);
        }

        let tx = self.tx.clone();
        let cooldown = self.tournament.config().queue_cooldown();
        thread::spawn(move || {
            thread::sleep(cooldown);
            let _ok = tx.send(Command::CooldownElapsed);
        });
    }

    /// Starts a new generation of the match timer. Older timers still
    /// sleeping are ignored when they wake.
    fn start_timer(&mut self, match_id: MatchId) {
        let Some(wait) = self.tournament.next_time_check(match_id) else {
            self.timers.remove(&match_id);
            return;
        };

        let generation = self.timers.entry(match_id).or_default();
        *generation += 1;
        let generation = *generation;

        let tx = self.tx.clone();
        thread::spawn(move || {
            thread::sleep(wait);
            let _ok = tx.send(Command::CheckTime {
                match_id,
                generation,
            });
        });
    }
}

/// A cheap, cloneable way to talk to a [`Worker`].
///
/// The worker keeps a sender of its own for timers and pairing passes, so it
/// can't notice on its own that nobody is left to talk to it. Dropping the
/// last clone of the handle sends [`Command::Shutdown`].
#[derive(Clone, Debug)]
pub struct WorkerHandle {
    mailbox: Arc<Mailbox>,
}

#[derive(Debug)]
struct Mailbox(Sender<Command>);

impl Drop for Mailbox {
    fn drop(&mut self) {
        let _ok = self.0.send(Command::Shutdown);
    }
}

impl WorkerHandle {
    fn new(tx: Sender<Command>) -> Self {
        Self {
            mailbox: Arc::new(Mailbox(tx)),
        }
    }

    fn request<T>(&self, command: impl FnOnce(Sender<T>) -> Command) -> anyhow::Result<T> {
        let (reply, rx) = mpsc::channel();
        self.mailbox
            .0
            .send(command(reply))
            .map_err(|_| anyhow::Error::msg("the pairing worker stopped"))?;

        Ok(rx.recv()?)
    }

    /// # Errors
    ///
    /// If the worker stopped or the tournament refuses.
    pub fn register(&self, id: Id, name: &str) -> anyhow::Result<()> {
        let name = name.to_string();
        self.request(|reply| Command::Register { id, name, reply })?
            .map_err(anyhow::Error::from)
    }

    /// # Errors
    ///
    /// If the worker stopped or the tournament refuses.
    pub fn set_deck(&self, id: Id, deck: Option<String>) -> anyhow::Result<()> {
        self.request(|reply| Command::SetDeck { id, deck, reply })?
            .map_err(anyhow::Error::from)
    }

    /// # Errors
    ///
    /// If the worker stopped or the tournament refuses.
    pub fn drop_competitor(&self, id: Id) -> anyhow::Result<Vec<MatchId>> {
        self.request(|reply| Command::Drop { id, reply })?
            .map_err(anyhow::Error::from)
    }

    /// # Errors
    ///
    /// If the worker stopped or the tournament refuses.
    pub fn join_queue(&self, id: Id) -> anyhow::Result<usize> {
        self.request(|reply| Command::JoinQueue { id, reply })?
            .map_err(anyhow::Error::from)
    }

    /// # Errors
    ///
    /// If the worker stopped or the tournament refuses.
    pub fn leave_queue(&self, id: Id) -> anyhow::Result<usize> {
        self.request(|reply| Command::LeaveQueue { id, reply })?
            .map_err(anyhow::Error::from)
    }

    /// # Errors
    ///
    /// If the worker stopped or the tournament refuses.
    pub fn propose_round(&self) -> anyhow::Result<SwissProposal> {
        self.request(|reply| Command::ProposeRound { reply })?
            .map_err(anyhow::Error::from)
    }

    /// # Errors
    ///
    /// If the worker stopped or the tournament refuses.
    pub fn confirm_round(&self) -> anyhow::Result<Vec<MatchId>> {
        self.request(|reply| Command::ConfirmRound { reply })?
            .map_err(anyhow::Error::from)
    }

    /// # Errors
    ///
    /// If the worker stopped or the tournament refuses.
    pub fn cancel_round(&self) -> anyhow::Result<SwissProposal> {
        self.request(|reply| Command::CancelRound { reply })?
            .map_err(anyhow::Error::from)
    }

    /// # Errors
    ///
    /// If the worker stopped or the tournament refuses.
    pub fn report(
        &self,
        match_id: MatchId,
        reporter: Id,
        outcome: Outcome,
    ) -> anyhow::Result<Transition> {
        self.request(|reply| Command::Report {
            match_id,
            reporter,
            outcome,
            reply,
        })?
        .map_err(anyhow::Error::from)
    }

    /// # Errors
    ///
    /// If the worker stopped or the tournament refuses.
    pub fn confirm(&self, match_id: MatchId, confirmer: Id) -> anyhow::Result<Transition> {
        self.request(|reply| Command::Confirm {
            match_id,
            confirmer,
            reply,
        })?
        .map_err(anyhow::Error::from)
    }

    /// # Errors
    ///
    /// If the worker stopped or the tournament refuses.
    pub fn record_result(
        &self,
        match_id: MatchId,
        result: MatchResult,
        winner: Option<Id>,
    ) -> anyhow::Result<()> {
        self.request(|reply| Command::RecordResult {
            match_id,
            result,
            winner,
            reply,
        })?
        .map_err(anyhow::Error::from)
    }

    /// # Errors
    ///
    /// If the worker stopped or the match is unknown.
    pub fn kill_match(&self, match_id: MatchId) -> anyhow::Result<()> {
        self.request(|reply| Command::Kill { match_id, reply })?
            .map_err(anyhow::Error::from)
    }

    /// # Errors
    ///
    /// If the worker stopped or the match is unknown.
    pub fn give_time_extension(&self, match_id: MatchId, seconds: i64) -> anyhow::Result<bool> {
        self.request(|reply| Command::GiveTimeExtension {
            match_id,
            seconds,
            reply,
        })?
        .map_err(anyhow::Error::from)
    }

    /// # Errors
    ///
    /// If the worker stopped.
    pub fn open_matches(&self) -> anyhow::Result<Vec<Match>> {
        self.request(|reply| Command::OpenMatches { reply })
    }

    /// # Errors
    ///
    /// If the worker stopped.
    pub fn standings(&self, active_only: bool) -> anyhow::Result<Vec<StandingsRow>> {
        self.request(|reply| Command::Standings { active_only, reply })
    }

    /// # Errors
    ///
    /// If the worker stopped or the snapshot can't be written.
    pub fn save(&self, path: PathBuf) -> anyhow::Result<()> {
        self.request(|reply| Command::Save { path, reply })?
    }

    /// Asks the worker to stop after the commands already sent.
    ///
    /// # Errors
    ///
    /// If the worker already stopped.
    pub fn shutdown(&self) -> anyhow::Result<()> {
        self.mailbox
            .0
            .send(Command::Shutdown)
            .map_err(|_| anyhow::Error::msg("the pairing worker stopped"))
    }
}
