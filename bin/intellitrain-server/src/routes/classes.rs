//! Class management, per modality.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use utoipa::OpenApi;

use super::parse_modality;
use crate::entities::ClassStore;
use crate::error::ServerError;
use crate::schemas::class::{ClassResponse, CreateClassRequest};
use crate::schemas::sample::DeleteResponse;
use crate::services::classes;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_classes, create_class, initialize_defaults, delete_class),
    components(schemas(ClassResponse, CreateClassRequest))
)]
pub struct ClassesApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{modality}/classes", get(list_classes).post(create_class))
        .route("/{modality}/classes/initialize-defaults", post(initialize_defaults))
        .route("/{modality}/classes/{name}", delete(delete_class))
}

#[utoipa::path(
    get,
    path = "/api/{modality}/classes",
    tag = "classes",
    params(("modality" = String, Path, description = "`audio` or `image`")),
    responses(
        (status = 200, description = "Classes in creation order", body = [ClassResponse]),
        (status = 404, description = "Unknown modality"),
    )
)]
pub async fn list_classes(
    State(state): State<Arc<AppState>>,
    Path(modality): Path<String>,
) -> Result<Json<Vec<ClassResponse>>, ServerError> {
    let modality = parse_modality(&modality)?;
    let records = state.store.list_classes(modality).await?;
    Ok(Json(records.iter().map(|c| c.to_response()).collect()))
}

#[utoipa::path(
    post,
    path = "/api/{modality}/classes",
    tag = "classes",
    params(("modality" = String, Path, description = "`audio` or `image`")),
    request_body = CreateClassRequest,
    responses(
        (status = 201, description = "Class created", body = ClassResponse),
        (status = 400, description = "Missing or invalid name"),
        (status = 409, description = "Class already exists"),
    )
)]
pub async fn create_class(
    State(state): State<Arc<AppState>>,
    Path(modality): Path<String>,
    Json(req): Json<CreateClassRequest>,
) -> Result<(StatusCode, Json<ClassResponse>), ServerError> {
    let modality = parse_modality(&modality)?;
    let record = classes::create_class(&state, modality, req).await?;
    Ok((StatusCode::CREATED, Json(record.to_response())))
}

#[utoipa::path(
    post,
    path = "/api/{modality}/classes/initialize-defaults",
    tag = "classes",
    params(("modality" = String, Path, description = "`audio` or `image`")),
    responses((status = 200, description = "All classes after seeding", body = [ClassResponse]))
)]
pub async fn initialize_defaults(
    State(state): State<Arc<AppState>>,
    Path(modality): Path<String>,
) -> Result<Json<Vec<ClassResponse>>, ServerError> {
    let modality = parse_modality(&modality)?;
    let records = classes::initialize_defaults(&state, modality).await?;
    Ok(Json(records.iter().map(|c| c.to_response()).collect()))
}

/// Remove a class. Its samples are kept and still train under that label.
#[utoipa::path(
    delete,
    path = "/api/{modality}/classes/{name}",
    tag = "classes",
    params(
        ("modality" = String, Path, description = "`audio` or `image`"),
        ("name" = String, Path, description = "Class name"),
    ),
    responses(
        (status = 200, description = "Class deleted", body = DeleteResponse),
        (status = 404, description = "Class not found"),
    )
)]
pub async fn delete_class(
    State(state): State<Arc<AppState>>,
    Path((modality, name)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>, ServerError> {
    let modality = parse_modality(&modality)?;
    if !state.store.delete_class(modality, &name).await? {
        return Err(ServerError::NotFound("Class not found".into()));
    }
    Ok(Json(DeleteResponse { status: "deleted".into() }))
}
