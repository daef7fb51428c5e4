use std::{fmt, sync::mpsc::Sender};

use crate::{
    Id, MatchId,
    outcome::MatchResult,
    pairing::Search,
    time::TimeWarning,
};

/// Something the orchestrator may want to forward to the players.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    QueueChanged {
        queued: usize,
    },
    PairingCommitted {
        matches: Vec<MatchId>,
        search: Search,
    },
    RoundProposed {
        round: u32,
        groups: Vec<Vec<Id>>,
        byes: Vec<Id>,
        search: Search,
    },
    MatchUncertified {
        id: MatchId,
        claimant: Id,
        result: MatchResult,
    },
    MatchCertified {
        id: MatchId,
        result: MatchResult,
        winner: Option<Id>,
    },
    MatchKilled {
        id: MatchId,
    },
    TimeWarning {
        id: MatchId,
        warning: TimeWarning,
    },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueChanged { queued } => write!(f, "queue_changed {queued}"),
            Self::PairingCommitted { matches, search } => {
                write!(f, "pairing_committed {search} {}", join(matches))
            }
            Self::RoundProposed {
                round,
                groups,
                byes,
                search,
            } => {
                let groups: Vec<_> = groups.iter().map(|group| join(group)).collect();
                write!(
                    f,
                    "round_proposed {round} {search} [{}] byes [{}]",
                    groups.join("] ["),
                    join(byes)
                )
            }
            Self::MatchUncertified {
                id,
                claimant,
                result,
            } => write!(f, "match_uncertified {id} {claimant} {result}"),
            Self::MatchCertified { id, result, winner } => match winner {
                Some(winner) => write!(f, "match_certified {id} {result} {winner}"),
                None => write!(f, "match_certified {id} {result} _"),
            },
            Self::MatchKilled { id } => write!(f, "match_killed {id}"),
            Self::TimeWarning { id, warning } => write!(f, "time_warning {id} {warning}"),
        }
    }
}

fn join<T: ToString>(values: &[T]) -> String {
    let values: Vec<_> = values.iter().map(ToString::to_string).collect();
    values.join(" ")
}

/// Delivers events without ever blocking the sender. A missing or hung up
/// receiver just drops them.
#[derive(Clone, Debug, Default)]
pub struct Messenger(Option<Sender<Event>>);

impl Messenger {
    #[must_use]
    pub fn new(sender: Sender<Event>) -> Self {
        Self(Some(sender))
    }

    pub fn send(&self, event: Event) {
        if let Some(sender) = &self.0 {
            let _ok = sender.send(event);
        }
    }
}
