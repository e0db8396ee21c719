use sqlx::FromRow;

// One row of Tasks_. Subtask membership lives on Subtasks_.task_id.
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    pub task_id: String,
    pub owner_user_id: i32,
    pub title: String,
    pub description: String,
    pub time_estimate: i64,
    pub time_spent: i64,
    pub completed: bool,
    // epoch milliseconds, NULL while stopped
    pub last_start_time: Option<i64>,
}
