use intellitrain_core::Modality;
use tracing::info;
use validator::Validate;

use crate::entities::{ClassRecord, ClassStore};
use crate::error::ServerError;
use crate::schemas::class::CreateClassRequest;
use crate::state::AppState;

pub const DEFAULT_CLASSES: [&str; 2] = ["Class 1", "Class 2"];

pub async fn create_class(
    state: &AppState,
    modality: Modality,
    req: CreateClassRequest,
) -> Result<ClassRecord, ServerError> {
    req.validate().map_err(|e| ServerError::BadRequest(first_message(&e)))?;
    let name = req.name.trim();
    if state.store.get_class(modality, name).await?.is_some() {
        return Err(ServerError::Conflict("Class already exists".into()));
    }
    let record = ClassRecord::new(modality, name, false);
    state.store.insert_class(record.clone()).await.map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => ServerError::Conflict("Class already exists".into()),
        _ => ServerError::Database(e),
    })?;
    info!(modality = %modality, class = %name, "class created");
    Ok(record)
}

/// Create the default classes that are missing; existing ones are left alone.
pub async fn initialize_defaults(state: &AppState, modality: Modality) -> Result<Vec<ClassRecord>, ServerError> {
    let mut created = 0usize;
    for name in DEFAULT_CLASSES {
        let (_, was_created) = state.store.get_or_create_class(modality, name, true).await?;
        created += was_created as usize;
    }
    info!(modality = %modality, created, "default classes initialised");
    Ok(state.store.list_classes(modality).await?)
}

fn first_message(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Invalid request".to_owned())
}
