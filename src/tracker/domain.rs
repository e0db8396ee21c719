//! Task and subtask records as the tracker sees them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::timer::TimerState;

/// Identifier of a registered user (the `Users_.user_id` column).
pub type UserId = i32;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

record_id!(
    /// Identifier of a task.
    TaskId
);
record_id!(
    /// Identifier of a subtask.
    SubtaskId
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtask {
    pub id: SubtaskId,
    pub task_id: TaskId,
    pub title: String,
    pub completed: bool,
}

impl Subtask {
    /// Creates an uncompleted subtask linked to `task_id`.
    #[must_use]
    pub fn new(task_id: TaskId, title: impl Into<String>) -> Self {
        Self {
            id: SubtaskId::new(),
            task_id,
            title: title.into(),
            completed: false,
        }
    }
}

/// A task with its subtasks fully populated, in list order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub owner: UserId,
    pub title: String,
    pub description: String,
    /// Estimate in minutes.
    pub time_estimate: i64,
    pub completed: bool,
    pub timer: TimerState,
    pub subtasks: Vec<Subtask>,
}

impl Task {
    /// Creates a stopped, uncompleted task whose subtasks start uncompleted.
    #[must_use]
    pub fn new<I, S>(
        owner: UserId,
        title: impl Into<String>,
        description: impl Into<String>,
        time_estimate: i64,
        subtask_titles: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = TaskId::new();
        let subtasks = subtask_titles
            .into_iter()
            .map(|title| Subtask::new(id, title))
            .collect();
        Self {
            id,
            owner,
            title: title.into(),
            description: description.into(),
            time_estimate,
            completed: false,
            timer: TimerState::default(),
            subtasks,
        }
    }

    #[must_use]
    pub const fn is_owned_by(&self, user: UserId) -> bool {
        self.owner == user
    }

    /// Whether the task's reference list contains `subtask`.
    #[must_use]
    pub fn references(&self, subtask: SubtaskId) -> bool {
        self.subtasks.iter().any(|s| s.id == subtask)
    }

    #[must_use]
    pub const fn time_spent(&self) -> i64 {
        self.timer.time_spent()
    }
}
