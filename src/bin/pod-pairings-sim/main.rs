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

#![deny(clippy::expect_used)]
#![deny(clippy::indexing_slicing)]
#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]

mod command_line;

use std::{
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

use clap::Parser;
use log::{debug, info};
use pod_pairings::{
    Id,
    config::{Config, PairingMode},
    event::Messenger,
    outcome::Outcome,
    pod_match::Match,
    tournament::Tournament,
    utils::{self, create_data_folder, data_file},
    worker::{Worker, WorkerHandle},
};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::IndexedRandom};

use crate::command_line::Args;

const DRAW_CHANCE: f64 = 0.15;
const CONCEDE_CHANCE: f64 = 0.1;
const SAVE_FILE: &str = "sim.postcard";

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    utils::init_logger(args.debug, args.systemd);

    if args.man {
        return Args::generate_man_page();
    }

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if args.fluid {
        config.mode = PairingMode::Fluid;
    }

    let (events_tx, events_rx) = mpsc::channel();
    let mut tournament = Tournament::new(config.clone())?;
    tournament.set_messenger(Messenger::new(events_tx));

    thread::spawn(move || {
        for event in events_rx {
            debug!("event: {event}");
        }
    });

    let (handle, worker) = Worker::spawn(tournament, args.seed);
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    for id in 1..=args.players {
        handle.register(id, &format!("player-{id}"))?;
        handle.set_deck(id, Some(format!("deck-{id}")))?;
    }

    info!(
        "simulating {} {} rounds with {} players in pods of {}",
        args.rounds, config.mode, args.players, config.group_size
    );

    match config.mode {
        PairingMode::Swiss => play_swiss(&handle, args.rounds, &mut rng)?,
        PairingMode::Fluid => play_fluid(&handle, &config, args.players, args.rounds, &mut rng)?,
    }

    for row in handle.standings(false)? {
        println!("{row}");
    }

    if args.save {
        create_data_folder()?;
        let path = data_file(SAVE_FILE);
        handle.save(path.clone())?;
        info!("saved the tournament to {}", path.display());
    }

    handle.shutdown()?;
    let tournament = worker
        .join()
        .map_err(|_| anyhow::Error::msg("the pairing worker panicked"))??;
    info!("{} matches played", tournament.matches().0.len());

    Ok(())
}

fn play_swiss(handle: &WorkerHandle, rounds: u32, rng: &mut StdRng) -> anyhow::Result<()> {
    for _ in 0..rounds {
        let proposal = handle.propose_round()?;
        println!("{proposal}");
        handle.confirm_round()?;

        for pod in handle.open_matches()? {
            play(handle, &pod, rng)?;
        }
    }

    Ok(())
}

fn play_fluid(
    handle: &WorkerHandle,
    config: &Config,
    players: Id,
    passes: u32,
    rng: &mut StdRng,
) -> anyhow::Result<()> {
    for pass in 1..=passes {
        for id in 1..=players {
            if let Err(err) = handle.join_queue(id) {
                debug!("{id}: {err}");
            }
        }

        let open = wait_for_matches(handle, config.queue_cooldown() + Duration::from_secs(1))?;
        if open.is_empty() {
            info!("pass {pass}: nobody could be paired");
            break;
        }

        for pod in &open {
            println!("pass {pass}: {pod}");
            play(handle, pod, rng)?;
        }
    }

    Ok(())
}

fn wait_for_matches(handle: &WorkerHandle, patience: Duration) -> anyhow::Result<Vec<Match>> {
    let deadline = Instant::now() + patience;

    loop {
        let open = handle.open_matches()?;
        if !open.is_empty() || Instant::now() >= deadline {
            return Ok(open);
        }

        thread::sleep(Duration::from_millis(100));
    }
}

/// Somebody might concede first, then somebody wins or everyone agrees to a
/// draw.
fn play(handle: &WorkerHandle, pod: &Match, rng: &mut StdRng) -> anyhow::Result<()> {
    let mut players: Vec<Id> = pod.active().iter().copied().collect();

    if players.len() > 2
        && rng.random_bool(CONCEDE_CHANCE)
        && let Some(loser) = players.pop()
    {
        handle.report(pod.id(), loser, Outcome::Loss)?;
    }

    let claimant = if rng.random_bool(DRAW_CHANCE) {
        let claimant = *players
            .first()
            .ok_or_else(|| anyhow::Error::msg("a match without players"))?;
        handle.report(pod.id(), claimant, Outcome::Draw)?;
        claimant
    } else {
        let winner = *players
            .choose(rng)
            .ok_or_else(|| anyhow::Error::msg("a match without players"))?;
        handle.report(pod.id(), winner, Outcome::Win)?;
        winner
    };

    for player in players.iter().filter(|player| **player != claimant) {
        handle.confirm(pod.id(), *player)?;
    }

    Ok(())
}
