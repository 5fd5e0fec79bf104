use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::entities::TaskRecord;

#[derive(Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TaskTypeQuery {
    /// `audio.train` or `image.train`.
    #[serde(rename = "type")]
    pub task_type: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct TaskResponse {
    pub id: String,
    pub task_type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn parse_json(raw: Option<&str>) -> Option<serde_json::Value> {
    raw.map(|s| serde_json::from_str(s).unwrap_or_else(|_| serde_json::Value::String(s.to_owned())))
}

impl TaskRecord {
    pub fn to_response(&self) -> TaskResponse {
        TaskResponse {
            id: self.id.clone(),
            task_type: self.task_type.clone(),
            status: self.status.clone(),
            input: parse_json(self.input_data.as_deref()),
            result: parse_json(self.result_data.as_deref()),
            error: self.error_msg.clone(),
            created_at: self.created_at.to_rfc3339(),
            updated_at: self.updated_at.to_rfc3339(),
        }
    }
}
