use serde::Serialize;
use utoipa::ToSchema;

use crate::entities::ModelArtifactRecord;

#[derive(Debug, Serialize, ToSchema)]
pub struct ModelResponse {
    pub id: String,
    pub accuracy: f64,
    pub classes: Vec<String>,
    /// Feature extractor the head was trained on.
    pub extractor: Option<String>,
    pub task_id: Option<String>,
    pub created_at: String,
}

impl ModelArtifactRecord {
    pub fn to_response(&self) -> ModelResponse {
        let classes = serde_json::from_str(&self.classes).unwrap_or_default();
        let extractor = serde_json::from_str::<serde_json::Value>(&self.architecture)
            .ok()
            .and_then(|v| v.get("extractor").and_then(|e| e.as_str()).map(str::to_owned));
        ModelResponse {
            id: self.id.clone(),
            accuracy: self.accuracy,
            classes,
            extractor,
            task_id: self.task_id.clone(),
            created_at: self.created_at.to_rfc3339(),
        }
    }
}
