use chrono::{DateTime, Utc};
use intellitrain_core::Modality;

/// A row in the `model_artifacts` table. Never updated after insert.
#[derive(Debug, Clone)]
pub struct ModelArtifactRecord {
    pub id: String,
    pub modality: Modality,
    /// safetensors bytes; empty when listed without weights.
    pub weights: Vec<u8>,
    /// JSON array of class names in output order.
    pub label_encoder: String,
    /// JSON-encoded `intellitrain_core::classifier::Architecture`.
    pub architecture: String,
    pub accuracy: f64,
    /// JSON array: classes present in the training samples.
    pub classes: String,
    pub task_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
