use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::entities::SampleRecord;

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct SampleQuery {
    /// Only list samples of this class.
    pub class: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SampleResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub timestamp: String,
}

impl SampleRecord {
    pub fn to_response(&self) -> SampleResponse {
        SampleResponse {
            id: self.id.clone(),
            class: self.class_name.clone(),
            filename: self.filename.clone(),
            content_type: self.content_type.clone(),
            timestamp: self.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    #[serde(flatten)]
    pub sample: SampleResponse,
    /// IDs of the augmented copies stored alongside the upload.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub augmented: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub status: String,
}

/// Multipart body of `POST /api/audio/samples`.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct AudioUploadForm {
    /// Audio file (also accepted as `file`).
    #[schema(format = Binary)]
    pub audio: String,
    pub class: String,
}

/// Multipart body of `POST /api/image/samples`.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct ImageUploadForm {
    /// Image file (also accepted as `file`).
    #[schema(format = Binary)]
    pub image: String,
    pub class: String,
    /// Also store randomly augmented copies.
    pub augment: Option<bool>,
}
