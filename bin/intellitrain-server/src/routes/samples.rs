//! Sample upload, listing, playback and deletion.

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Json, Router};
use intellitrain_core::Modality;
use tracing::info;
use utoipa::OpenApi;

use super::parse_modality;
use crate::entities::SampleStore;
use crate::error::ServerError;
use crate::schemas::sample::{
    AudioUploadForm, DeleteResponse, ImageUploadForm, SampleQuery, SampleResponse, UploadResponse,
};
use crate::services::upload::{self, read_form};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(upload_sample, list_samples, delete_sample, sample_payload),
    components(schemas(SampleResponse, UploadResponse, DeleteResponse, AudioUploadForm, ImageUploadForm))
)]
pub struct SamplesApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{modality}/samples", get(list_samples).post(upload_sample))
        .route("/{modality}/samples/{id}", delete(delete_sample))
        .route("/{modality}/samples/{id}/play", get(sample_payload))
        .route("/{modality}/samples/{id}/image", get(sample_payload))
}

/// Upload one labeled sample.
///
/// Audio: fields `audio` (or `file`) and `class`. The clip must decode, last
/// at least 0.5 s and not be silent. Image: fields `image` (or `file`),
/// `class` and optional `augment`.
#[utoipa::path(
    post,
    path = "/api/{modality}/samples",
    tag = "samples",
    params(("modality" = String, Path, description = "`audio` or `image`")),
    request_body(content = AudioUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Sample stored", body = UploadResponse),
        (status = 400, description = "Missing field or sample failed validation"),
    )
)]
pub async fn upload_sample(
    State(state): State<Arc<AppState>>,
    Path(modality): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ServerError> {
    let modality = parse_modality(&modality)?;
    store_upload(&state, modality, multipart).await
}

pub(super) async fn store_upload(
    state: &AppState,
    modality: Modality,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ServerError> {
    let file_fields: &[&str] = match modality {
        Modality::Audio => &["audio", "file"],
        Modality::Image => &["image", "file"],
    };
    let mut form = read_form(multipart, file_fields, state.config.max_upload_bytes()).await?;
    let file = form.take_file()?;
    let class_name = form.class_name()?;

    let (sample, augmented) = match modality {
        Modality::Audio => (upload::store_audio_sample(state, &class_name, file).await?, Vec::new()),
        Modality::Image => upload::store_image_sample(state, &class_name, file, form.flag("augment")).await?,
    };
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            sample: sample.to_response(),
            augmented,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/{modality}/samples",
    tag = "samples",
    params(("modality" = String, Path, description = "`audio` or `image`"), SampleQuery),
    responses((status = 200, description = "Samples, newest first", body = [SampleResponse]))
)]
pub async fn list_samples(
    State(state): State<Arc<AppState>>,
    Path(modality): Path<String>,
    Query(q): Query<SampleQuery>,
) -> Result<Json<Vec<SampleResponse>>, ServerError> {
    let modality = parse_modality(&modality)?;
    let records = state.store.list_samples(modality, q.class.as_deref()).await?;
    Ok(Json(records.iter().map(|s| s.to_response()).collect()))
}

#[utoipa::path(
    delete,
    path = "/api/{modality}/samples/{id}",
    tag = "samples",
    params(
        ("modality" = String, Path, description = "`audio` or `image`"),
        ("id" = String, Path, description = "Sample ID"),
    ),
    responses(
        (status = 200, description = "Sample deleted", body = DeleteResponse),
        (status = 404, description = "Sample not found"),
    )
)]
pub async fn delete_sample(
    State(state): State<Arc<AppState>>,
    Path((modality, id)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>, ServerError> {
    let modality = parse_modality(&modality)?;
    let deleted = state
        .store
        .delete_sample(modality, &id)
        .await?
        .ok_or_else(|| ServerError::NotFound("Sample not found".into()))?;
    info!(sample_id = %id, class = %deleted.class_name, "sample deleted");
    Ok(Json(DeleteResponse { status: "deleted".into() }))
}

/// Raw sample bytes with their stored content type
/// (`/play` for audio, `/image` for images).
#[utoipa::path(
    get,
    path = "/api/{modality}/samples/{id}/play",
    tag = "samples",
    params(
        ("modality" = String, Path, description = "`audio` or `image`"),
        ("id" = String, Path, description = "Sample ID"),
    ),
    responses(
        (status = 200, description = "Sample payload", content_type = "application/octet-stream"),
        (status = 404, description = "Sample not found"),
    )
)]
pub async fn sample_payload(
    State(state): State<Arc<AppState>>,
    Path((modality, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServerError> {
    let modality = parse_modality(&modality)?;
    let (bytes, content_type) = state
        .store
        .read_payload(modality, &id)
        .await?
        .ok_or_else(|| ServerError::NotFound("Sample not found".into()))?;
    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}
