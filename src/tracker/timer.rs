//! Elapsed-time accounting for a task's start/stop cycles.
//!
//! A task is either [`TimerState::Stopped`] with a frozen total, or
//! [`TimerState::Running`] with the total frozen at the last anchor plus the
//! whole minutes elapsed since then. All arithmetic truncates to whole
//! minutes and only ever adds.

use chrono::{DateTime, Duration, Utc};

use super::error::{TrackerError, TrackerResult};

pub const MILLIS_PER_MINUTE: i64 = 60_000;

/// Largest accepted `timeSpent`: a hundred years of minutes.
pub const MAX_TIME_SPENT: i64 = 100 * 366 * 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Stopped {
        time_spent: i64,
    },
    Running {
        time_spent: i64,
        started_at: DateTime<Utc>,
    },
}

impl Default for TimerState {
    fn default() -> Self {
        Self::Stopped { time_spent: 0 }
    }
}

impl TimerState {
    /// Builds a state from the persisted `(timeSpent, lastStartTime)` pair,
    /// where `lastStartTime` is epoch milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Validation`] for a total outside
    /// `0..=MAX_TIME_SPENT` or an unrepresentable timestamp.
    pub fn from_parts(time_spent: i64, last_start_time: Option<i64>) -> TrackerResult<Self> {
        if time_spent < 0 {
            return Err(TrackerError::Validation(
                "timeSpent must not be negative".to_owned(),
            ));
        }
        if time_spent > MAX_TIME_SPENT {
            return Err(TrackerError::Validation(format!(
                "timeSpent must not exceed {MAX_TIME_SPENT} minutes"
            )));
        }
        match last_start_time {
            None => Ok(Self::Stopped { time_spent }),
            Some(millis) => {
                let started_at = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
                    TrackerError::Validation(format!("lastStartTime {millis} is out of range"))
                })?;
                Ok(Self::Running {
                    time_spent,
                    started_at,
                })
            }
        }
    }

    /// Total frozen at the last start or checkpoint.
    #[must_use]
    pub const fn time_spent(&self) -> i64 {
        match *self {
            Self::Stopped { time_spent } | Self::Running { time_spent, .. } => time_spent,
        }
    }

    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        match *self {
            Self::Stopped { .. } => None,
            Self::Running { started_at, .. } => Some(started_at),
        }
    }

    /// The anchor as epoch milliseconds, `None` when stopped.
    #[must_use]
    pub fn last_start_time(&self) -> Option<i64> {
        self.started_at().map(|at| at.timestamp_millis())
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    /// Live total: frozen minutes plus whole minutes elapsed since the anchor.
    #[must_use]
    pub fn total_at(&self, now: DateTime<Utc>) -> i64 {
        match *self {
            Self::Stopped { time_spent } => time_spent,
            Self::Running {
                time_spent,
                started_at,
            } => time_spent.saturating_add(elapsed_minutes(started_at, now)),
        }
    }

    /// Starts the timer at `now`. A running timer keeps its anchor.
    #[must_use]
    pub const fn start(self, now: DateTime<Utc>) -> Self {
        match self {
            Self::Stopped { time_spent } => Self::Running {
                time_spent,
                started_at: now,
            },
            running @ Self::Running { .. } => running,
        }
    }

    /// Stops the timer, folding the whole elapsed minutes into the total.
    /// Stopping a stopped timer changes nothing.
    #[must_use]
    pub fn stop(self, now: DateTime<Utc>) -> Self {
        Self::Stopped {
            time_spent: self.total_at(now),
        }
    }

    /// Credits the whole minutes elapsed so far and moves the anchor forward
    /// by exactly that amount, so the timer keeps running and the sub-minute
    /// remainder is carried into the next interval.
    #[must_use]
    pub fn checkpoint(self, now: DateTime<Utc>) -> Self {
        match self {
            Self::Stopped { .. } => self,
            Self::Running {
                time_spent,
                started_at,
            } => {
                let credited = elapsed_minutes(started_at, now);
                Self::Running {
                    time_spent: time_spent.saturating_add(credited),
                    started_at: started_at + Duration::minutes(credited),
                }
            }
        }
    }
}

/// Whole minutes between `started_at` and `now`. An anchor in the future
/// counts as zero so the total never decreases.
#[must_use]
pub fn elapsed_minutes(started_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (now - started_at).num_milliseconds();
    if millis <= 0 {
        0
    } else {
        millis / MILLIS_PER_MINUTE
    }
}

/// Minutes left against the estimate; negative once the task runs over.
#[must_use]
pub const fn time_remaining(time_estimate: i64, time_spent: i64) -> i64 {
    time_estimate - time_spent
}

/// Remaining minutes as shown to the user, never below zero.
#[must_use]
pub fn displayed_remaining(time_estimate: i64, time_spent: i64) -> i64 {
    time_remaining(time_estimate, time_spent).max(0)
}
