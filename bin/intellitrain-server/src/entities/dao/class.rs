use chrono::{DateTime, Utc};
use intellitrain_core::Modality;

/// A row in the `classes` table.
#[derive(Debug, Clone)]
pub struct ClassRecord {
    pub id: String,
    pub modality: Modality,
    pub name: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl ClassRecord {
    pub fn new(modality: Modality, name: impl Into<String>, is_default: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            modality,
            name: name.into(),
            is_default,
            created_at: Utc::now(),
        }
    }
}
