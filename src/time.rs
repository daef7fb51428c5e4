use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DAY: i64 = 24 * 60 * 60 * 1_000;
const HOUR: i64 = 60 * 60 * 1_000;
const MINUTE: i64 = 60 * 1_000;
const SECOND: i64 = 1_000;

const FIVE_MINUTES: i64 = 5 * MINUTE;
const ONE_MINUTE: i64 = MINUTE;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum TimeWarning {
    FiveMinutes,
    OneMinute,
    TimeUp,
}

impl fmt::Display for TimeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FiveMinutes => write!(f, "five_minutes"),
            Self::OneMinute => write!(f, "one_minute"),
            Self::TimeUp => write!(f, "time_up"),
        }
    }
}

/// The time budget of one match.
///
/// Each warning fires at most once until an extension pushes the remaining
/// time back above its threshold.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct MatchTime {
    pub start: DateTime<Utc>,
    pub milliseconds_budget: i64,
    pub extension_seconds: i64,
    pub stopped: bool,
    pub warned_five_minutes: bool,
    pub warned_one_minute: bool,
    pub time_up: bool,
}

impl MatchTime {
    #[must_use]
    pub fn new(start: DateTime<Utc>, minutes: i64) -> Self {
        Self {
            start,
            milliseconds_budget: minutes.saturating_mul(MINUTE),
            extension_seconds: 0,
            stopped: false,
            warned_five_minutes: false,
            warned_one_minute: false,
            time_up: false,
        }
    }

    /// A timer that never runs, used for byes.
    #[must_use]
    pub fn stopped(start: DateTime<Utc>) -> Self {
        Self {
            stopped: true,
            ..Self::new(start, 0)
        }
    }

    #[must_use]
    pub fn milliseconds_left(&self, now: DateTime<Utc>) -> i64 {
        let elapsed = now.signed_duration_since(self.start).num_milliseconds();
        self.milliseconds_budget
            .saturating_add(self.extension_seconds.saturating_mul(SECOND))
            .saturating_sub(elapsed)
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Returns false when nothing changed: the timer is stopped or `seconds`
    /// is not positive.
    pub fn extend(&mut self, seconds: i64, now: DateTime<Utc>) -> bool {
        if self.stopped || seconds <= 0 {
            return false;
        }

        self.extension_seconds = self.extension_seconds.saturating_add(seconds);
        let left = self.milliseconds_left(now);

        if left > 0 {
            self.time_up = false;
        }
        if left > ONE_MINUTE {
            self.warned_one_minute = false;
        }
        if left > FIVE_MINUTES {
            self.warned_five_minutes = false;
        }

        true
    }

    /// The most urgent warning that is due and has not been sent yet.
    /// Sending a later warning also marks the earlier ones as sent.
    pub fn check(&mut self, now: DateTime<Utc>) -> Option<TimeWarning> {
        if self.stopped {
            return None;
        }

        let left = self.milliseconds_left(now);

        if left <= 0 {
            if self.time_up {
                return None;
            }
            self.time_up = true;
            self.warned_one_minute = true;
            self.warned_five_minutes = true;
            Some(TimeWarning::TimeUp)
        } else if left <= ONE_MINUTE {
            if self.warned_one_minute {
                return None;
            }
            self.warned_one_minute = true;
            self.warned_five_minutes = true;
            Some(TimeWarning::OneMinute)
        } else if left <= FIVE_MINUTES {
            if self.warned_five_minutes {
                return None;
            }
            self.warned_five_minutes = true;
            Some(TimeWarning::FiveMinutes)
        } else {
            None
        }
    }

    /// How long to sleep before the next warning could be due.
    #[must_use]
    pub fn next_check(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.stopped || self.time_up {
            return None;
        }

        let threshold = if !self.warned_five_minutes {
            FIVE_MINUTES
        } else if !self.warned_one_minute {
            ONE_MINUTE
        } else {
            0
        };

        let wait = self.milliseconds_left(now).saturating_sub(threshold).max(0);
        Some(Duration::from_millis(wait.unsigned_abs()))
    }
}

impl fmt::Display for MatchTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stopped {
            return write!(f, "-");
        }

        let left = self.milliseconds_left(Utc::now()).max(0);
        let extension_minutes = self.extension_seconds / 60;
        let extension_seconds = self.extension_seconds % 60;

        write!(
            f,
            "{} | +{extension_minutes:02}:{extension_seconds:02}",
            time_left(left)
        )
    }
}

#[must_use]
pub fn time_left(milliseconds_left: i64) -> String {
    let days = milliseconds_left / DAY;
    let hours = (milliseconds_left % DAY) / HOUR;
    let minutes = (milliseconds_left % HOUR) / MINUTE;
    let seconds = (milliseconds_left % MINUTE) / SECOND;

    if days == 0 {
        if hours == 0 {
            if minutes == 0 {
                format!("{seconds:02}")
            } else {
                format!("{minutes:02}:{seconds:02}")
            }
        } else {
            format!("{hours:02}:{minutes:02}:{seconds:02}")
        }
    } else {
        format!("{days} {hours:02}:{minutes:02}:{seconds:02}")
    }
}
