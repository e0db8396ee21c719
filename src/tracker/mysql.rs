//! MySQL task store over `Tasks_` and `Subtasks_`.
//!
//! A task's reference list is the set of `Subtasks_` rows carrying its id,
//! ordered by `position`. Multi-row writes run in one transaction; an early
//! return drops the transaction, which rolls it back.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlConnection, MySqlPool};

use super::completion;
use super::domain::{Subtask, SubtaskId, Task, TaskId, UserId};
use super::store::{StoreError, StoreResult, TaskEdit, TaskStore};
use super::subtask_diff::SubtaskChanges;
use super::timer::TimerState;
use crate::models::{subtask::SubtaskRow, task::TaskRow};

const TASK_COLUMNS: &str =
    "task_id, owner_user_id, title, description, time_estimate, time_spent, completed, last_start_time";
const SUBTASK_COLUMNS: &str = "subtask_id, task_id, title, completed, position";

#[derive(Debug, Clone)]
pub struct MySqlTaskStore {
    pool: MySqlPool,
}

impl MySqlTaskStore {
    #[must_use]
    pub const fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

fn parse_id<T: FromStr<Err = uuid::Error>>(raw: &str) -> StoreResult<T> {
    raw.parse().map_err(StoreError::persistence)
}

fn subtask_from_row(row: SubtaskRow) -> StoreResult<Subtask> {
    Ok(Subtask {
        id: parse_id(&row.subtask_id)?,
        task_id: parse_id(&row.task_id)?,
        title: row.title,
        completed: row.completed,
    })
}

fn task_from_rows(row: TaskRow, subtasks: Vec<SubtaskRow>) -> StoreResult<Task> {
    let timer = timer_from_row(&row)?;
    Ok(Task {
        id: parse_id(&row.task_id)?,
        owner: row.owner_user_id,
        title: row.title,
        description: row.description,
        time_estimate: row.time_estimate,
        completed: row.completed,
        timer,
        subtasks: subtasks
            .into_iter()
            .map(subtask_from_row)
            .collect::<StoreResult<_>>()?,
    })
}

fn timer_from_row(row: &TaskRow) -> StoreResult<TimerState> {
    TimerState::from_parts(row.time_spent, row.last_start_time).map_err(StoreError::persistence)
}

async fn fetch_task_row(
    conn: &mut MySqlConnection,
    id: TaskId,
    for_update: bool,
) -> StoreResult<Option<TaskRow>> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    sqlx::query_as::<_, TaskRow>(&format!(
        "SELECT {TASK_COLUMNS} FROM Tasks_ WHERE task_id = ?{lock}"
    ))
    .bind(id.to_string())
    .fetch_optional(conn)
    .await
    .map_err(StoreError::persistence)
}

async fn fetch_subtask_rows(
    conn: &mut MySqlConnection,
    task_id: TaskId,
) -> StoreResult<Vec<SubtaskRow>> {
    sqlx::query_as::<_, SubtaskRow>(&format!(
        "SELECT {SUBTASK_COLUMNS} FROM Subtasks_ WHERE task_id = ? ORDER BY position"
    ))
    .bind(task_id.to_string())
    .fetch_all(conn)
    .await
    .map_err(StoreError::persistence)
}

async fn insert_subtask(
    conn: &mut MySqlConnection,
    subtask: &Subtask,
    position: usize,
) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO Subtasks_ (subtask_id, task_id, title, completed, position) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(subtask.id.to_string())
    .bind(subtask.task_id.to_string())
    .bind(&subtask.title)
    .bind(subtask.completed)
    .bind(position_value(position)?)
    .execute(conn)
    .await
    .map_err(StoreError::persistence)?;
    Ok(())
}

fn position_value(position: usize) -> StoreResult<i32> {
    i32::try_from(position).map_err(StoreError::persistence)
}

async fn write_task_state(
    conn: &mut MySqlConnection,
    id: TaskId,
    completed: bool,
    timer: TimerState,
) -> StoreResult<()> {
    sqlx::query(
        "UPDATE Tasks_ SET completed = ?, time_spent = ?, last_start_time = ? WHERE task_id = ?",
    )
    .bind(completed)
    .bind(timer.time_spent())
    .bind(timer.last_start_time())
    .bind(id.to_string())
    .execute(conn)
    .await
    .map_err(StoreError::persistence)?;
    Ok(())
}

/// Reloads the subtasks of a locked task row, writes the derived completion
/// and returns the task as it will be committed.
async fn reconcile_locked(
    conn: &mut MySqlConnection,
    row: TaskRow,
    id: TaskId,
    now: DateTime<Utc>,
) -> StoreResult<Task> {
    let subtask_rows = fetch_subtask_rows(&mut *conn, id).await?;
    let subtasks = subtask_rows
        .iter()
        .cloned()
        .map(subtask_from_row)
        .collect::<StoreResult<Vec<_>>>()?;
    let reconciled = completion::reconcile(&subtasks, timer_from_row(&row)?, now);
    write_task_state(&mut *conn, id, reconciled.completed, reconciled.timer).await?;

    let mut task = task_from_rows(row, subtask_rows)?;
    task.completed = reconciled.completed;
    task.timer = reconciled.timer;
    Ok(task)
}

#[async_trait]
impl TaskStore for MySqlTaskStore {
    async fn insert_task(&self, task: &Task) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(StoreError::persistence)?;

        sqlx::query(&format!(
            "INSERT INTO Tasks_ ({TASK_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(task.id.to_string())
        .bind(task.owner)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.time_estimate)
        .bind(task.timer.time_spent())
        .bind(task.completed)
        .bind(task.timer.last_start_time())
        .execute(&mut *tx)
        .await
        .map_err(StoreError::persistence)?;

        for (position, subtask) in task.subtasks.iter().enumerate() {
            insert_subtask(&mut tx, subtask, position).await?;
        }

        tx.commit().await.map_err(StoreError::persistence)
    }

    async fn find_task(&self, id: TaskId) -> StoreResult<Option<Task>> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::persistence)?;
        let Some(row) = fetch_task_row(&mut conn, id, false).await? else {
            return Ok(None);
        };
        let subtasks = fetch_subtask_rows(&mut conn, id).await?;
        task_from_rows(row, subtasks).map(Some)
    }

    async fn find_subtask(&self, id: SubtaskId) -> StoreResult<Option<Subtask>> {
        sqlx::query_as::<_, SubtaskRow>(&format!(
            "SELECT {SUBTASK_COLUMNS} FROM Subtasks_ WHERE subtask_id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::persistence)?
        .map(subtask_from_row)
        .transpose()
    }

    async fn list_tasks(&self, owner: UserId) -> StoreResult<Vec<Task>> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::persistence)?;

        let task_rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM Tasks_ WHERE owner_user_id = ? ORDER BY created_at, task_id"
        ))
        .bind(owner)
        .fetch_all(&mut *conn)
        .await
        .map_err(StoreError::persistence)?;

        let subtask_rows = sqlx::query_as::<_, SubtaskRow>(
            "SELECT s.subtask_id, s.task_id, s.title, s.completed, s.position
             FROM Subtasks_ s
             JOIN Tasks_ t ON s.task_id = t.task_id
             WHERE t.owner_user_id = ?
             ORDER BY s.task_id, s.position",
        )
        .bind(owner)
        .fetch_all(&mut *conn)
        .await
        .map_err(StoreError::persistence)?;

        let mut by_task: HashMap<String, Vec<SubtaskRow>> = HashMap::new();
        for row in subtask_rows {
            by_task.entry(row.task_id.clone()).or_default().push(row);
        }

        task_rows
            .into_iter()
            .map(|row| {
                let subtasks = by_task.remove(&row.task_id).unwrap_or_default();
                task_from_rows(row, subtasks)
            })
            .collect()
    }

    async fn apply_edit(&self, edit: &TaskEdit) -> StoreResult<Task> {
        let id = edit.task_id;
        let mut tx = self.pool.begin().await.map_err(StoreError::persistence)?;

        let mut row = fetch_task_row(&mut tx, id, true)
            .await?
            .ok_or(StoreError::TaskNotFound(id))?;

        // plan against the rows held under the task lock
        let stored = fetch_subtask_rows(&mut tx, id)
            .await?
            .into_iter()
            .map(subtask_from_row)
            .collect::<StoreResult<Vec<_>>>()?;
        let changes = SubtaskChanges::plan(&stored, &edit.subtasks, id);

        for subtask_id in &changes.delete {
            sqlx::query("DELETE FROM Subtasks_ WHERE subtask_id = ? AND task_id = ?")
                .bind(subtask_id.to_string())
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(StoreError::persistence)?;
        }

        let kept = changes.keep.len();
        for (offset, subtask) in changes.create.iter().enumerate() {
            insert_subtask(&mut tx, subtask, kept + offset).await?;
        }

        for (position, subtask_id) in changes.keep.iter().enumerate() {
            sqlx::query("UPDATE Subtasks_ SET position = ? WHERE subtask_id = ?")
                .bind(position_value(position)?)
                .bind(subtask_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(StoreError::persistence)?;
        }

        sqlx::query("UPDATE Tasks_ SET title = ?, description = ?, time_estimate = ? WHERE task_id = ?")
            .bind(&edit.title)
            .bind(&edit.description)
            .bind(edit.time_estimate)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::persistence)?;
        row.title.clone_from(&edit.title);
        row.description.clone_from(&edit.description);
        row.time_estimate = edit.time_estimate;

        let task = reconcile_locked(&mut tx, row, id, edit.now).await?;
        tx.commit().await.map_err(StoreError::persistence)?;
        Ok(task)
    }

    async fn delete_task(&self, id: TaskId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(StoreError::persistence)?;

        if fetch_task_row(&mut tx, id, true).await?.is_none() {
            return Err(StoreError::TaskNotFound(id));
        }

        sqlx::query("DELETE FROM Subtasks_ WHERE task_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::persistence)?;

        sqlx::query("DELETE FROM Tasks_ WHERE task_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::persistence)?;

        tx.commit().await.map_err(StoreError::persistence)
    }

    async fn set_subtask_completion(
        &self,
        id: SubtaskId,
        completed: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<Task> {
        let subtask = self
            .find_subtask(id)
            .await?
            .ok_or(StoreError::SubtaskNotFound(id))?;
        let task_id = subtask.task_id;

        let mut tx = self.pool.begin().await.map_err(StoreError::persistence)?;

        // Lock the parent first so edits and completions serialise per task.
        let row = fetch_task_row(&mut tx, task_id, true)
            .await?
            .ok_or(StoreError::TaskNotFound(task_id))?;

        let updated = sqlx::query("UPDATE Subtasks_ SET completed = ? WHERE subtask_id = ? AND task_id = ?")
            .bind(completed)
            .bind(id.to_string())
            .bind(task_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::persistence)?;
        if updated.rows_affected() == 0 && self.find_subtask(id).await?.is_none() {
            return Err(StoreError::SubtaskNotFound(id));
        }

        let task = reconcile_locked(&mut tx, row, task_id, now).await?;
        tx.commit().await.map_err(StoreError::persistence)?;
        Ok(task)
    }

    async fn save_timer(&self, id: TaskId, timer: TimerState) -> StoreResult<TimerState> {
        let mut tx = self.pool.begin().await.map_err(StoreError::persistence)?;

        if fetch_task_row(&mut tx, id, true).await?.is_none() {
            return Err(StoreError::TaskNotFound(id));
        }

        sqlx::query("UPDATE Tasks_ SET time_spent = ?, last_start_time = ? WHERE task_id = ?")
            .bind(timer.time_spent())
            .bind(timer.last_start_time())
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::persistence)?;

        tx.commit().await.map_err(StoreError::persistence)?;
        Ok(timer)
    }
}
