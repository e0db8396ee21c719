use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct SubtaskRow {
    pub subtask_id: String,
    pub task_id: String,
    pub title: String,
    pub completed: bool,
    pub position: i32,
}
