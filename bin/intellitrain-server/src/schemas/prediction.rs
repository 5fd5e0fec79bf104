use std::collections::BTreeMap;

use intellitrain_core::ClassProbability;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClassConfidence {
    pub class: String,
    pub confidence: f32,
}

impl From<ClassProbability> for ClassConfidence {
    fn from(p: ClassProbability) -> Self {
        Self { class: p.class, confidence: p.confidence }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AudioPredictionResponse {
    /// `{class: confidence}` after temperature scaling.
    pub predictions: BTreeMap<String, f32>,
    /// The same distribution, most likely class first.
    pub ranked: Vec<ClassConfidence>,
    pub model_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImagePredictionResponse {
    pub class: String,
    pub confidence: f32,
    pub predictions: Vec<ClassConfidence>,
    pub model_id: String,
}

/// Multipart body of the predict routes.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct PredictForm {
    /// File to classify (also accepted as `audio` or `image`).
    #[schema(format = Binary)]
    pub file: String,
}
