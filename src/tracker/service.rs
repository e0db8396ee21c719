//! Task operations on behalf of an authenticated owner.
//!
//! Ownership and linkage checks run before any write. Each mutation is
//! delegated to exactly one atomic [`TaskStore`] call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use mockable::Clock;

use super::domain::{SubtaskId, Task, TaskId, UserId};
use super::error::{TrackerError, TrackerResult};
use super::store::{TaskEdit, TaskStore};
use super::subtask_diff::DesiredSubtask;
use super::timer::TimerState;
use super::validation::{self, TaskFields};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub fields: TaskFields,
    pub subtasks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskUpdate {
    pub fields: TaskFields,
    pub subtasks: Vec<DesiredSubtask>,
}

#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl TaskService {
    #[must_use]
    pub fn new(store: Arc<dyn TaskStore>, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self { store, clock }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    /// Loads a task the caller may mutate.
    async fn owned_task(&self, owner: UserId, id: TaskId) -> TrackerResult<Task> {
        let task = self
            .store
            .find_task(id)
            .await?
            .ok_or_else(|| TrackerError::NotFound(format!("task not found: {id}")))?;
        if !task.is_owned_by(owner) {
            return Err(TrackerError::Forbidden(
                "you are not allowed to modify this task".to_owned(),
            ));
        }
        Ok(task)
    }

    /// Creates a task and its uncompleted subtasks in one unit.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Validation`] for bad input and
    /// [`TrackerError::Storage`] when nothing could be committed.
    pub async fn create_task(&self, owner: UserId, new: NewTask) -> TrackerResult<Task> {
        let fields = new.fields.validated()?;
        let titles = validation::subtask_titles(new.subtasks)?;
        let task = Task::new(
            owner,
            fields.title,
            fields.description,
            fields.time_estimate,
            titles,
        );
        self.store.insert_task(&task).await?;
        info!("Task {} created for user {}", task.id, owner);
        Ok(task)
    }

    /// # Errors
    ///
    /// Returns [`TrackerError::Storage`] when the store cannot be read.
    pub async fn list_tasks(&self, owner: UserId) -> TrackerResult<Vec<Task>> {
        Ok(self.store.list_tasks(owner).await?)
    }

    /// Replaces the task fields and reconciles subtask membership.
    ///
    /// # Errors
    ///
    /// `NotFound` / `Forbidden` before any write, `Validation` for bad input,
    /// `Storage` when the edit aborted.
    pub async fn update_task(
        &self,
        owner: UserId,
        id: TaskId,
        update: TaskUpdate,
    ) -> TrackerResult<Task> {
        self.update_task_at(owner, id, update, self.now()).await
    }

    /// [`Self::update_task`] evaluated at `now`.
    ///
    /// # Errors
    ///
    /// See [`Self::update_task`].
    pub async fn update_task_at(
        &self,
        owner: UserId,
        id: TaskId,
        update: TaskUpdate,
        now: DateTime<Utc>,
    ) -> TrackerResult<Task> {
        self.owned_task(owner, id).await?;
        let fields = update.fields.validated()?;
        let desired = validation::desired_subtasks(update.subtasks)?;

        let edit = TaskEdit {
            task_id: id,
            title: fields.title,
            description: fields.description,
            time_estimate: fields.time_estimate,
            subtasks: desired,
            now,
        };
        let task = self.store.apply_edit(&edit).await?;
        info!("Task {} updated, now {} subtasks", id, task.subtasks.len());
        Ok(task)
    }

    /// Deletes a task with all of its subtasks.
    ///
    /// # Errors
    ///
    /// `NotFound` / `Forbidden` before any write, `Storage` when aborted.
    pub async fn delete_task(&self, owner: UserId, id: TaskId) -> TrackerResult<()> {
        self.owned_task(owner, id).await?;
        self.store.delete_task(id).await?;
        info!("Task {} deleted by user {}", id, owner);
        Ok(())
    }

    /// Sets a subtask's flag and returns the task as committed, with its
    /// recomputed completion and timer.
    ///
    /// `task_context` is the task the caller believes owns the subtask; a
    /// mismatch is refused.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown subtask, `Forbidden` for a foreign task or a
    /// linkage mismatch, `Storage` when the two writes aborted.
    pub async fn complete_subtask(
        &self,
        owner: UserId,
        subtask_id: SubtaskId,
        completed: bool,
        task_context: Option<TaskId>,
    ) -> TrackerResult<Task> {
        self.complete_subtask_at(owner, subtask_id, completed, task_context, self.now())
            .await
    }

    /// [`Self::complete_subtask`] evaluated at `now`.
    ///
    /// # Errors
    ///
    /// See [`Self::complete_subtask`].
    pub async fn complete_subtask_at(
        &self,
        owner: UserId,
        subtask_id: SubtaskId,
        completed: bool,
        task_context: Option<TaskId>,
        now: DateTime<Utc>,
    ) -> TrackerResult<Task> {
        let subtask = self
            .store
            .find_subtask(subtask_id)
            .await?
            .ok_or_else(|| TrackerError::NotFound(format!("subtask not found: {subtask_id}")))?;
        let task = self.owned_task(owner, subtask.task_id).await?;

        let context_matches = task_context.map_or(true, |expected| expected == task.id);
        if !context_matches || !task.references(subtask_id) {
            return Err(TrackerError::Forbidden(
                "this subtask does not belong to the task".to_owned(),
            ));
        }

        let was_running = task.timer.is_running();
        let task = self
            .store
            .set_subtask_completion(subtask_id, completed, now)
            .await?;
        if was_running && task.completed {
            info!("Task {} completed while running, timer stopped", task.id);
        }
        Ok(task)
    }

    /// # Errors
    ///
    /// `Validation` when the task is already completed.
    pub async fn start_timer(&self, owner: UserId, id: TaskId) -> TrackerResult<TimerState> {
        self.start_timer_at(owner, id, self.now()).await
    }

    /// Starts the timer at `now`; a running timer is returned unchanged.
    ///
    /// # Errors
    ///
    /// See [`Self::start_timer`].
    pub async fn start_timer_at(
        &self,
        owner: UserId,
        id: TaskId,
        now: DateTime<Utc>,
    ) -> TrackerResult<TimerState> {
        let task = self.owned_task(owner, id).await?;
        if task.completed {
            return Err(completed_task_error());
        }
        if task.timer.is_running() {
            return Ok(task.timer);
        }
        Ok(self.store.save_timer(id, task.timer.start(now)).await?)
    }

    /// # Errors
    ///
    /// `NotFound` / `Forbidden`, or `Storage` when the write aborted.
    pub async fn stop_timer(&self, owner: UserId, id: TaskId) -> TrackerResult<TimerState> {
        self.stop_timer_at(owner, id, self.now()).await
    }

    /// Stops the timer at `now`; a stopped timer is returned unchanged.
    ///
    /// # Errors
    ///
    /// See [`Self::stop_timer`].
    pub async fn stop_timer_at(
        &self,
        owner: UserId,
        id: TaskId,
        now: DateTime<Utc>,
    ) -> TrackerResult<TimerState> {
        let task = self.owned_task(owner, id).await?;
        if !task.timer.is_running() {
            return Ok(task.timer);
        }
        Ok(self.store.save_timer(id, task.timer.stop(now)).await?)
    }

    /// # Errors
    ///
    /// `NotFound` / `Forbidden`, or `Storage` when the write aborted.
    pub async fn checkpoint_timer(&self, owner: UserId, id: TaskId) -> TrackerResult<TimerState> {
        self.checkpoint_timer_at(owner, id, self.now()).await
    }

    /// Persists the minutes a running timer has accumulated by `now`.
    ///
    /// # Errors
    ///
    /// See [`Self::checkpoint_timer`].
    pub async fn checkpoint_timer_at(
        &self,
        owner: UserId,
        id: TaskId,
        now: DateTime<Utc>,
    ) -> TrackerResult<TimerState> {
        let task = self.owned_task(owner, id).await?;
        if !task.timer.is_running() {
            return Ok(task.timer);
        }
        Ok(self.store.save_timer(id, task.timer.checkpoint(now)).await?)
    }

    /// Stores a client-computed `(timeSpent, lastStartTime)` pair as is.
    ///
    /// # Errors
    ///
    /// `Forbidden` for a foreign task regardless of payload, `Validation` for
    /// a negative total, a bad timestamp, or running a completed task.
    pub async fn record_time(
        &self,
        owner: UserId,
        id: TaskId,
        time_spent: i64,
        last_start_time: Option<i64>,
    ) -> TrackerResult<TimerState> {
        let task = self.owned_task(owner, id).await?;
        let timer = TimerState::from_parts(time_spent, last_start_time)?;
        if task.completed && timer.is_running() {
            return Err(completed_task_error());
        }
        Ok(self.store.save_timer(id, timer).await?)
    }
}

fn completed_task_error() -> TrackerError {
    TrackerError::Validation("a completed task cannot be timed".to_owned())
}
