//! Training jobs, their polling endpoint and the model history.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use intellitrain_core::Modality;
use utoipa::OpenApi;

use super::parse_modality;
use crate::entities::{ModelStore, TaskStatus, TaskStore};
use crate::error::ServerError;
use crate::schemas::model::ModelResponse;
use crate::schemas::training::{TrainResponse, TrainingState, TrainingStatusResponse};
use crate::services::training;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(train, training_status, list_models),
    components(schemas(TrainResponse, TrainingStatusResponse, TrainingState, TaskStatus, ModelResponse))
)]
pub struct TrainingApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{modality}/train", post(train))
        .route("/{modality}/training-status", get(training_status))
        .route("/{modality}/models", get(list_models))
}

/// Start a background training job and return its task ID immediately.
#[utoipa::path(
    post,
    path = "/api/{modality}/train",
    tag = "training",
    params(("modality" = String, Path, description = "`audio` or `image`")),
    responses(
        (status = 202, description = "Job accepted", body = TrainResponse),
        (status = 409, description = "A job for this modality is already running"),
    )
)]
pub async fn train(
    State(state): State<Arc<AppState>>,
    Path(modality): Path<String>,
) -> Result<(StatusCode, Json<TrainResponse>), ServerError> {
    let modality = parse_modality(&modality)?;
    start_training(&state, modality).await
}

pub(super) async fn start_training(
    state: &AppState,
    modality: Modality,
) -> Result<(StatusCode, Json<TrainResponse>), ServerError> {
    let task = training::start(state, modality).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(TrainResponse {
            task_id: task.id,
            status: TaskStatus::Pending,
        }),
    ))
}

/// State of the most recent training job (`idle` when none ever ran).
#[utoipa::path(
    get,
    path = "/api/{modality}/training-status",
    tag = "training",
    params(("modality" = String, Path, description = "`audio` or `image`")),
    responses((status = 200, description = "Latest job state", body = TrainingStatusResponse))
)]
pub async fn training_status(
    State(state): State<Arc<AppState>>,
    Path(modality): Path<String>,
) -> Result<Json<TrainingStatusResponse>, ServerError> {
    let modality = parse_modality(&modality)?;
    current_status(&state, modality).await
}

pub(super) async fn current_status(
    state: &AppState,
    modality: Modality,
) -> Result<Json<TrainingStatusResponse>, ServerError> {
    let latest = state.store.latest_task(&training::task_type(modality)).await?;
    Ok(Json(match latest {
        Some(task) => TrainingStatusResponse::from_task(&task),
        None => TrainingStatusResponse::idle(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/{modality}/models",
    tag = "training",
    params(("modality" = String, Path, description = "`audio` or `image`")),
    responses((status = 200, description = "Trained models, newest first", body = [ModelResponse]))
)]
pub async fn list_models(
    State(state): State<Arc<AppState>>,
    Path(modality): Path<String>,
) -> Result<Json<Vec<ModelResponse>>, ServerError> {
    let modality = parse_modality(&modality)?;
    let records = state.store.list_artifacts(modality).await?;
    Ok(Json(records.iter().map(|m| m.to_response()).collect()))
}
