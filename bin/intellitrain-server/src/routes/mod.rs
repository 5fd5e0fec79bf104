//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - `/health`
//! - `/api/{audio,image}/...` class, sample, training and prediction routes
//! - `/api/tasks` job records
//! - legacy unprefixed image routes (`/api/upload`, `/api/train`, ...)
//! - optional Swagger UI (disable with `INTELLITRAIN_ENABLE_SWAGGER=false`)

mod classes;
pub mod doc;
mod health;
mod legacy;
mod predict;
mod samples;
mod tasks;
mod training;

use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use intellitrain_core::Modality;
use tower::ServiceBuilder;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ServerError;
use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .merge(classes::router())
        .merge(samples::router())
        .merge(training::router())
        .merge(predict::router())
        .merge(tasks::router())
        .merge(legacy::router());

    let mut app = Router::new().merge(health::router()).nest("/api", api);

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app.layer(
        ServiceBuilder::new()
            .layer(cors::cors_layer(&state.config))
            .layer(DefaultBodyLimit::max(state.config.max_upload_bytes())),
    )
    .layer(middleware::from_fn(trace::trace_middleware))
    .with_state(state)
}

/// Resolve the `{modality}` path segment; anything but `audio` or `image`
/// is a 404.
fn parse_modality(raw: &str) -> Result<Modality, ServerError> {
    Modality::from_str(raw).map_err(|_| ServerError::NotFound(format!("Unknown modality '{raw}'")))
}
