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

use std::{fmt, fs, path::Path, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{queue::ContinuousQueuePairing, swiss::RoundBasedPairing};

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum PairingMode {
    /// Competitors queue and get paired whenever enough are waiting.
    Fluid,
    /// The whole field is paired round by round.
    #[default]
    Swiss,
}

impl fmt::Display for PairingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fluid => write!(f, "fluid"),
            Self::Swiss => write!(f, "swiss"),
        }
    }
}

impl FromStr for PairingMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "fluid" => Ok(Self::Fluid),
            "swiss" => Ok(Self::Swiss),
            _ => Err(anyhow::Error::msg(format!(
                "Error trying to convert '{s}' to a PairingMode!"
            ))),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    pub mode: PairingMode,
    pub group_size: usize,
    /// Queued competitors needed before a fluid pass runs.
    pub queue_threshold: usize,
    pub queue_cooldown_seconds: u64,
    pub queue_attempts: usize,
    pub swiss_attempts: usize,
    pub match_minutes: i64,
    pub include_byes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: PairingMode::default(),
            group_size: 4,
            queue_threshold: 8,
            queue_cooldown_seconds: 5,
            queue_attempts: 25,
            swiss_attempts: 250,
            match_minutes: 50,
            include_byes: true,
        }
    }
}

impl Config {
    /// # Errors
    ///
    /// If the file can't be read, isn't valid RON, or fails [`Config::validate`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let string = fs::read_to_string(path)?;

        let config: Self = match ron::from_str(&string) {
            Ok(config) => config,
            Err(err) => {
                return Err(anyhow::Error::msg(format!(
                    "RON: {}: {err}",
                    path.display()
                )));
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// If a setting makes pairing impossible.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.group_size < 2 {
            return Err(anyhow::Error::msg(format!(
                "a group needs at least two competitors, not {}",
                self.group_size
            )));
        }
        if self.queue_threshold < self.group_size {
            return Err(anyhow::Error::msg(format!(
                "the queue threshold {} is smaller than a group of {}",
                self.queue_threshold, self.group_size
            )));
        }
        if self.queue_attempts == 0 || self.swiss_attempts == 0 {
            return Err(anyhow::Error::msg("pairing needs at least one attempt"));
        }
        if self.match_minutes <= 0 {
            return Err(anyhow::Error::msg("matches need some time on the clock"));
        }

        Ok(())
    }

    #[must_use]
    pub fn queue_cooldown(&self) -> Duration {
        Duration::from_secs(self.queue_cooldown_seconds)
    }

    #[must_use]
    pub fn queue_engine(&self) -> ContinuousQueuePairing {
        ContinuousQueuePairing {
            attempts: self.queue_attempts,
        }
    }

    #[must_use]
    pub fn swiss_engine(&self) -> RoundBasedPairing {
        RoundBasedPairing {
            attempts: self.swiss_attempts,
        }
    }
}
