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

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// What a player reports about their own match.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Outcome {
    Win,
    Draw,
    Loss,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Win => write!(f, "win"),
            Self::Draw => write!(f, "draw"),
            Self::Loss => write!(f, "loss"),
        }
    }
}

impl FromStr for Outcome {
    type Err = anyhow::Error;

    fn from_str(string: &str) -> anyhow::Result<Self> {
        let string = string.to_lowercase();

        match string.as_str() {
            "w" | "win" | "won" => Ok(Self::Win),
            "d" | "draw" | "tie" => Ok(Self::Draw),
            "l" | "loss" | "lose" | "lost" | "concede" => Ok(Self::Loss),
            _ => Err(anyhow::Error::msg(format!(
                "Error trying to convert '{string}' to an Outcome!"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum MatchStatus {
    #[default]
    Open,
    Uncertified,
    Certified,
    Dead,
}

impl MatchStatus {
    /// The match is still being played or waiting on confirmations.
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(self, Self::Open | Self::Uncertified)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Uncertified => write!(f, "uncertified"),
            Self::Certified => write!(f, "certified"),
            Self::Dead => write!(f, "dead"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum MatchResult {
    #[default]
    None,
    Winner,
    Draw,
    Bye,
    Dead,
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Winner => write!(f, "winner"),
            Self::Draw => write!(f, "draw"),
            Self::Bye => write!(f, "bye"),
            Self::Dead => write!(f, "dead"),
        }
    }
}

impl FromStr for MatchResult {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value {
            "none" => Ok(Self::None),
            "winner" => Ok(Self::Winner),
            "draw" => Ok(Self::Draw),
            "bye" => Ok(Self::Bye),
            "dead" => Ok(Self::Dead),
            _ => Err(anyhow::Error::msg(format!("invalid match result: {value}"))),
        }
    }
}
