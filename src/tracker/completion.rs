//! Keeps a task's `completed` flag equal to the AND of its subtasks.

use chrono::{DateTime, Utc};

use super::domain::Subtask;
use super::timer::TimerState;

/// A task is complete when it has subtasks and every one is complete.
#[must_use]
pub fn is_task_complete(subtasks: &[Subtask]) -> bool {
    !subtasks.is_empty() && subtasks.iter().all(|subtask| subtask.completed)
}

/// Derived state written back to the task after its subtasks change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    pub completed: bool,
    pub timer: TimerState,
}

/// Recomputes completion from the freshly loaded `subtasks`. A task that
/// becomes complete has its running timer stopped at `now`.
#[must_use]
pub fn reconcile(subtasks: &[Subtask], timer: TimerState, now: DateTime<Utc>) -> Reconciled {
    let completed = is_task_complete(subtasks);
    let timer = if completed { timer.stop(now) } else { timer };
    Reconciled { completed, timer }
}
