use actix_web::{web, HttpRequest, HttpResponse};
use log::info;

use super::tasks_models::{
    CompleteSubtaskRequest, CompleteSubtaskResponse, CreateTaskRequest, MessageResponse,
    TaskListResponse, TaskPayload, TaskResponse, TimeRecord, UpdateTaskRequest,
};
use crate::routes::{bearer::authenticate, error::ApiError};
use crate::state::AppState;
use crate::tracker::{SubtaskId, TaskId};

fn parse_task_id(raw: &str) -> Result<TaskId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound("Could not find task for provided id.".to_owned()))
}

fn parse_subtask_id(raw: &str) -> Result<SubtaskId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound("Subtask not found.".to_owned()))
}

// List the caller's tasks with their subtasks
pub async fn get_tasks(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let identity = authenticate(&req, &state).await?;
    let tasks = state.tasks.list_tasks(identity.user_id).await?;

    info!("Fetched {} tasks for user {}", tasks.len(), identity.username);
    Ok(HttpResponse::Ok().json(TaskListResponse {
        tasks: tasks.iter().map(TaskPayload::from).collect(),
    }))
}

pub async fn create_task(
    state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let identity = authenticate(&req, &state).await?;
    let task = state
        .tasks
        .create_task(identity.user_id, request.into_inner().into())
        .await?;

    Ok(HttpResponse::Created().json(TaskResponse {
        task: TaskPayload::from(&task),
    }))
}

pub async fn update_task(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    request: web::Json<UpdateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let identity = authenticate(&req, &state).await?;
    let task_id = parse_task_id(&path)?;
    let task = state
        .tasks
        .update_task(identity.user_id, task_id, request.into_inner().into())
        .await?;

    info!("Task {} updated by {}", task_id, identity.username);
    Ok(HttpResponse::Created().json(TaskResponse {
        task: TaskPayload::from(&task),
    }))
}

pub async fn delete_task(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let identity = authenticate(&req, &state).await?;
    let task_id = parse_task_id(&path)?;
    state.tasks.delete_task(identity.user_id, task_id).await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        success: true,
        message: "Task deleted".to_owned(),
    }))
}

// Toggle a subtask; the task context comes from the path when present
pub async fn update_subtask(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    request: web::Json<CompleteSubtaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let identity = authenticate(&req, &state).await?;
    let subtask_id = parse_subtask_id(&path)?;
    complete_subtask(&state, identity.user_id, subtask_id, request.completed, None).await
}

pub async fn update_task_subtask(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(String, String)>,
    request: web::Json<CompleteSubtaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let identity = authenticate(&req, &state).await?;
    let (task_raw, subtask_raw) = path.into_inner();
    let task_id = parse_task_id(&task_raw)?;
    let subtask_id = parse_subtask_id(&subtask_raw)?;
    complete_subtask(
        &state,
        identity.user_id,
        subtask_id,
        request.completed,
        Some(task_id),
    )
    .await
}

async fn complete_subtask(
    state: &AppState,
    user_id: i32,
    subtask_id: SubtaskId,
    completed: bool,
    task_context: Option<TaskId>,
) -> Result<HttpResponse, ApiError> {
    let task = state
        .tasks
        .complete_subtask(user_id, subtask_id, completed, task_context)
        .await?;

    info!(
        "Subtask {} set to {}, task completed: {}",
        subtask_id, completed, task.completed
    );
    Ok(HttpResponse::Ok().json(CompleteSubtaskResponse::from(&task)))
}

// Store the client's timer pair (start, checkpoint and stop all land here)
pub async fn update_task_time(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    request: web::Json<TimeRecord>,
) -> Result<HttpResponse, ApiError> {
    let identity = authenticate(&req, &state).await?;
    let task_id = parse_task_id(&path)?;
    let timer = state
        .tasks
        .record_time(
            identity.user_id,
            task_id,
            request.time_spent,
            request.last_start_time,
        )
        .await?;

    Ok(HttpResponse::Ok().json(TimeRecord::from(timer)))
}

pub async fn start_timer(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let identity = authenticate(&req, &state).await?;
    let task_id = parse_task_id(&path)?;
    let timer = state.tasks.start_timer(identity.user_id, task_id).await?;

    info!("Timer started for task {}", task_id);
    Ok(HttpResponse::Ok().json(TimeRecord::from(timer)))
}

pub async fn stop_timer(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let identity = authenticate(&req, &state).await?;
    let task_id = parse_task_id(&path)?;
    let timer = state.tasks.stop_timer(identity.user_id, task_id).await?;

    info!("Timer stopped for task {} at {} minutes", task_id, timer.time_spent());
    Ok(HttpResponse::Ok().json(TimeRecord::from(timer)))
}

pub async fn checkpoint_timer(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let identity = authenticate(&req, &state).await?;
    let task_id = parse_task_id(&path)?;
    let timer = state.tasks.checkpoint_timer(identity.user_id, task_id).await?;

    Ok(HttpResponse::Ok().json(TimeRecord::from(timer)))
}
