use serde::{Deserialize, Serialize};

use crate::tracker::{
    service::{NewTask, TaskUpdate},
    subtask_diff::DesiredSubtask,
    validation::TaskFields,
    Subtask, Task, TimerState,
};

// Subtask and task as sent to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskPayload {
    pub id: String,
    pub title: String,
    pub completed: bool,
}

impl From<&Subtask> for SubtaskPayload {
    fn from(subtask: &Subtask) -> Self {
        Self {
            id: subtask.id.to_string(),
            title: subtask.title.clone(),
            completed: subtask.completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
    pub id: String,
    pub title: String,
    pub description: String,
    pub time_estimate: i64,
    pub time_spent: i64,
    pub completed: bool,
    pub last_start_time: Option<i64>,
    pub subtasks: Vec<SubtaskPayload>,
}

impl From<&Task> for TaskPayload {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.to_string(),
            title: task.title.clone(),
            description: task.description.clone(),
            time_estimate: task.time_estimate,
            time_spent: task.timer.time_spent(),
            completed: task.completed,
            last_start_time: task.timer.last_start_time(),
            subtasks: task.subtasks.iter().map(SubtaskPayload::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task: TaskPayload,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskPayload>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}


// Create task request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubtaskRequest {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: String,
    pub time_estimate: i64,
    pub subtasks: Vec<NewSubtaskRequest>,
}

impl From<CreateTaskRequest> for NewTask {
    fn from(request: CreateTaskRequest) -> Self {
        Self {
            fields: TaskFields {
                title: request.title,
                description: request.description,
                time_estimate: request.time_estimate,
            },
            subtasks: request.subtasks.into_iter().map(|s| s.title).collect(),
        }
    }
}


// Update task request. Subtasks without a known id are created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditSubtaskRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub title: String,
    pub description: String,
    pub time_estimate: i64,
    pub subtasks: Vec<EditSubtaskRequest>,
}

impl From<UpdateTaskRequest> for TaskUpdate {
    fn from(request: UpdateTaskRequest) -> Self {
        Self {
            fields: TaskFields {
                title: request.title,
                description: request.description,
                time_estimate: request.time_estimate,
            },
            subtasks: request
                .subtasks
                .into_iter()
                .map(|s| DesiredSubtask {
                    // blank or foreign ids just mean "new"
                    id: s.id.and_then(|raw| raw.trim().parse().ok()),
                    title: s.title,
                    completed: s.completed,
                })
                .collect(),
        }
    }
}


// Subtask completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteSubtaskRequest {
    pub completed: bool,
}

// Completion may stop a running timer, so the committed pair comes back too
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteSubtaskResponse {
    pub task_completed: bool,
    pub time_spent: i64,
    pub last_start_time: Option<i64>,
}

impl From<&Task> for CompleteSubtaskResponse {
    fn from(task: &Task) -> Self {
        Self {
            task_completed: task.completed,
            time_spent: task.timer.time_spent(),
            last_start_time: task.timer.last_start_time(),
        }
    }
}


// Timer fields, used both ways
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRecord {
    pub time_spent: i64,
    pub last_start_time: Option<i64>,
}

impl From<TimerState> for TimeRecord {
    fn from(timer: TimerState) -> Self {
        Self {
            time_spent: timer.time_spent(),
            last_start_time: timer.last_start_time(),
        }
    }
}
