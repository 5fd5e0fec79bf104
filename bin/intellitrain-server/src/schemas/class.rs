use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::entities::ClassRecord;

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("Class name is required".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateClassRequest {
    #[validate(custom(function = "not_blank"), length(max = 100, message = "Class name is too long"))]
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClassResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub created_at: String,
}

impl ClassRecord {
    pub fn to_response(&self) -> ClassResponse {
        ClassResponse {
            id: self.id.clone(),
            name: self.name.clone(),
            is_default: self.is_default,
            created_at: self.created_at.to_rfc3339(),
        }
    }
}
