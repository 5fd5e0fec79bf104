use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use intellitrain_core::Modality;
use utoipa::OpenApi;

use super::parse_modality;
use crate::error::ServerError;
use crate::schemas::prediction::{AudioPredictionResponse, ClassConfidence, ImagePredictionResponse, PredictForm};
use crate::services::prediction;
use crate::services::upload::read_form;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(predict),
    components(schemas(AudioPredictionResponse, ImagePredictionResponse, ClassConfidence, PredictForm))
)]
pub struct PredictApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/{modality}/predict", post(predict))
}

/// Classify one file with the latest trained model.
///
/// Send the file as `audio` / `image` (or `file`). Audio answers with a
/// temperature-scaled distribution; images with the top class and the full
/// ranked list.
#[utoipa::path(
    post,
    path = "/api/{modality}/predict",
    tag = "prediction",
    params(("modality" = String, Path, description = "`audio` or `image`")),
    request_body(content = PredictForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "`AudioPredictionResponse` for audio, `ImagePredictionResponse` for images"),
        (status = 400, description = "No file, invalid file or no trained model"),
        (status = 409, description = "Model was trained with a different feature extractor"),
    )
)]
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Path(modality): Path<String>,
    multipart: Multipart,
) -> Result<Response, ServerError> {
    let modality = parse_modality(&modality)?;
    classify(&state, modality, multipart).await
}

pub(super) async fn classify(
    state: &AppState,
    modality: Modality,
    multipart: Multipart,
) -> Result<Response, ServerError> {
    let file_fields: &[&str] = match modality {
        Modality::Audio => &["audio", "file"],
        Modality::Image => &["image", "file"],
    };
    let mut form = read_form(multipart, file_fields, state.config.max_upload_bytes()).await?;
    let file = form.take_file()?;
    Ok(match modality {
        Modality::Audio => Json(prediction::audio(state, file).await?).into_response(),
        Modality::Image => Json(prediction::image(state, file).await?).into_response(),
    })
}
