//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON
//! `{"error": "..."}` body with a matching status code.
//!
//! Database and internal errors are logged in full but only a generic
//! message reaches the caller.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use intellitrain_core::MlError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The caller referenced a resource that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent an invalid or malformed request, or the submitted
    /// sample failed validation.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The operation's prerequisites are not met (no model, too few samples).
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The request conflicts with current state (duplicate class, job
    /// already running, stale model).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::BadRequest(m) | ServerError::Precondition(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            ServerError::Database(e) => {
                error!(error = %e, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<MlError> for ServerError {
    fn from(e: MlError) -> Self {
        match e {
            e if e.is_validation() => ServerError::BadRequest(e.to_string()),
            MlError::Precondition(m) => ServerError::Precondition(m),
            e @ MlError::ArtifactMismatch(_) => ServerError::Conflict(e.to_string()),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(e: tokio::task::JoinError) -> Self {
        ServerError::Internal(format!("worker task failed: {e}"))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(err: ServerError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_errors_are_bad_requests() {
        let err: ServerError = MlError::AudioTooShort { min_secs: 0.5, actual_secs: 0.1 }.into();
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Audio too short"));
    }

    #[tokio::test]
    async fn internal_detail_is_not_echoed() {
        let (status, body) = body_of(ServerError::Internal("/secret/path.db locked".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal server error");
    }

    #[tokio::test]
    async fn artifact_mismatch_is_a_conflict() {
        let err: ServerError = MlError::ArtifactMismatch("retrain".into()).into();
        assert_eq!(body_of(err).await.0, StatusCode::CONFLICT);
    }
}
