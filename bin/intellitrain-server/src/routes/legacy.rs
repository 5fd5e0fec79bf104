//! Unprefixed routes kept for older image clients; they behave exactly like
//! their `/api/image/...` counterparts.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use intellitrain_core::Modality;

use super::{predict, samples, training};
use crate::error::ServerError;
use crate::schemas::sample::UploadResponse;
use crate::schemas::training::{TrainResponse, TrainingStatusResponse};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(upload_image))
        .route("/train", post(train_image))
        .route("/predict", post(predict_image))
        .route("/training-status", get(image_training_status))
}

async fn upload_image(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ServerError> {
    samples::store_upload(&state, Modality::Image, multipart).await
}

async fn train_image(State(state): State<Arc<AppState>>) -> Result<(StatusCode, Json<TrainResponse>), ServerError> {
    training::start_training(&state, Modality::Image).await
}

async fn predict_image(State(state): State<Arc<AppState>>, multipart: Multipart) -> Result<Response, ServerError> {
    predict::classify(&state, Modality::Image, multipart).await
}

async fn image_training_status(State(state): State<Arc<AppState>>) -> Result<Json<TrainingStatusResponse>, ServerError> {
    training::current_status(&state, Modality::Image).await
}
