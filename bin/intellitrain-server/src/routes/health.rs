//! Health / heartbeat endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use intellitrain_core::Modality;
use serde_json::{Value, json};
use utoipa::OpenApi;

use crate::entities::{SampleStore, TaskStore};
use crate::error::ServerError;
use crate::services::training::task_type;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health))]
pub struct HealthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// Heartbeat endpoint.
///
/// Returns `{"status": "ok", "version": "..."}` plus, per modality, the
/// loaded feature extractor, the sample count and the active training job.
/// Answers 500 when the database is unreachable.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is healthy", body = Value)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ServerError> {
    let mut modalities = serde_json::Map::new();
    for modality in [Modality::Audio, Modality::Image] {
        let extractor = match modality {
            Modality::Audio => state.embedder.name(),
            Modality::Image => state.backbone.name(),
        };
        let active = state.store.active_task(&task_type(modality)).await?;
        modalities.insert(
            modality.to_string(),
            json!({
                "extractor": extractor,
                "samples": state.store.count_samples(modality).await?,
                "active_task": active.map(|t| t.id),
            }),
        );
    }
    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "modalities": modalities,
    })))
}
