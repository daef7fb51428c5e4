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

use std::{io::Write as _, path::PathBuf};

use clap::{CommandFactory, Parser};
use pod_pairings::{COPYRIGHT, LONG_VERSION};

/// Pod Pairings Simulator
///
/// Plays a simulated tournament with random results and prints the
/// standings.
#[allow(clippy::struct_excessive_bools)]
#[derive(Parser, Debug)]
#[command(long_version = LONG_VERSION, about = "Pod Pairings Simulator")]
pub(crate) struct Args {
    /// A RON file with the tournament settings
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Whether to log on the debug level
    #[arg(long)]
    pub debug: bool,

    /// Whether the application is being run by systemd
    #[arg(long)]
    pub systemd: bool,

    /// How many competitors to register
    #[arg(default_value_t = 16, long)]
    pub players: u64,

    /// How many rounds, or fluid passes, to play
    #[arg(default_value_t = 3, long)]
    pub rounds: u32,

    /// Pair from a queue instead of in Swiss rounds
    #[arg(long)]
    pub fluid: bool,

    /// Seed the pairing and the simulated results
    #[arg(long)]
    pub seed: Option<u64>,

    /// Save the finished tournament to the data folder
    #[arg(long)]
    pub save: bool,

    /// Build the manpage
    #[arg(long)]
    pub man: bool,
}

impl Args {
    pub(crate) fn generate_man_page() -> anyhow::Result<()> {
        let mut buffer: Vec<u8> = Vec::default();
        let cmd = Self::command().name("pod-pairings-sim").long_version(None);
        let man = clap_mangen::Man::new(cmd).date("2026-10-14");

        man.render(&mut buffer)?;
        write!(buffer, "{COPYRIGHT}")?;

        std::fs::write("pod-pairings-sim.1", buffer)?;
        Ok(())
    }
}
