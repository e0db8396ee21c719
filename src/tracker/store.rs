//! Persistence port for tasks and subtasks.
//!
//! Every method is one atomic unit: it either commits all of its writes or
//! none of them.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::domain::{Subtask, SubtaskId, Task, TaskId, UserId};
use super::subtask_diff::DesiredSubtask;
use super::timer::TimerState;

pub type StoreResult<T> = Result<T, StoreError>;

/// Field changes and the desired subtask list of a task edit. The store
/// diffs the list against the subtasks it holds inside the edit's unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEdit {
    pub task_id: TaskId,
    pub title: String,
    pub description: String,
    pub time_estimate: i64,
    pub subtasks: Vec<DesiredSubtask>,
    /// Used to stop a running timer if the edit completes the task.
    pub now: DateTime<Utc>,
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Stores a task together with its initial subtasks.
    async fn insert_task(&self, task: &Task) -> StoreResult<()>;

    /// Loads a task with its subtasks populated, `None` when absent.
    async fn find_task(&self, id: TaskId) -> StoreResult<Option<Task>>;

    async fn find_subtask(&self, id: SubtaskId) -> StoreResult<Option<Subtask>>;

    /// Tasks owned by `owner` in creation order, subtasks populated.
    async fn list_tasks(&self, owner: UserId) -> StoreResult<Vec<Task>>;

    /// Updates the task fields, plans the membership diff against the
    /// current subtasks, deletes, creates and reorders them, then recomputes
    /// completion from the reloaded list.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TaskNotFound`] when the task does not exist.
    async fn apply_edit(&self, edit: &TaskEdit) -> StoreResult<Task>;

    /// Deletes a task and all of its subtasks.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TaskNotFound`] when the task does not exist.
    async fn delete_task(&self, id: TaskId) -> StoreResult<()>;

    /// Saves a subtask's flag, reloads every subtask of its task and writes
    /// the recomputed completion (stopping the timer when it completes).
    /// Returns the task as committed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SubtaskNotFound`] when the subtask does not exist.
    async fn set_subtask_completion(
        &self,
        id: SubtaskId,
        completed: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<Task>;

    /// Overwrites the timer fields of a task. Last write wins.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TaskNotFound`] when the task does not exist.
    async fn save_timer(&self, id: TaskId, timer: TimerState) -> StoreResult<TimerState>;
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("subtask not found: {0}")]
    SubtaskNotFound(SubtaskId),

    /// The transaction did not commit.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
