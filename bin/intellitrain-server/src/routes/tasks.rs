//! Training job records.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;
use utoipa::OpenApi;

use crate::entities::{TaskStatus, TaskStore};
use crate::error::ServerError;
use crate::schemas::task::{TaskResponse, TaskTypeQuery};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_tasks, get_task, cancel_task),
    components(schemas(TaskResponse))
)]
pub struct TasksApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", get(list_tasks))
        .route("/tasks/{id}", get(get_task))
        .route("/tasks/{id}/cancel", post(cancel_task))
}

#[utoipa::path(
    get,
    path = "/api/tasks",
    tag = "tasks",
    params(TaskTypeQuery),
    responses((status = 200, description = "Jobs, newest first", body = [TaskResponse]))
)]
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TaskTypeQuery>,
) -> Result<Json<Vec<TaskResponse>>, ServerError> {
    let tasks = state.store.list_tasks(q.task_type.as_deref()).await?;
    Ok(Json(tasks.iter().map(|t| t.to_response()).collect()))
}

#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    tag = "tasks",
    params(("id" = String, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Job record", body = TaskResponse),
        (status = 404, description = "Task not found"),
    )
)]
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, ServerError> {
    let task = state
        .store
        .get_task(&id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("Task {id} not found")))?;
    Ok(Json(task.to_response()))
}

/// Cancel a pending or running job. The job stops at its next epoch
/// boundary and its model is discarded.
#[utoipa::path(
    post,
    path = "/api/tasks/{id}/cancel",
    tag = "tasks",
    params(("id" = String, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Job cancelled", body = TaskResponse),
        (status = 404, description = "Task not found"),
        (status = 409, description = "Task already finished"),
    )
)]
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, ServerError> {
    let task = state
        .store
        .get_task(&id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("Task {id} not found")))?;
    let active = task.status.parse::<TaskStatus>().is_ok_and(TaskStatus::is_active);
    if !active
        || !state
            .store
            .update_active_task(&id, TaskStatus::Cancelled.as_ref(), None, None)
            .await?
    {
        return Err(ServerError::Conflict(format!("Task {id} is not running")));
    }
    let signalled = state.task_manager.cancel(&id);
    info!(task_id = %id, signalled, "task cancelled");

    let task = state.store.get_task(&id).await?.unwrap_or(task);
    Ok(Json(task.to_response()))
}
