use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Interrupted,
}

impl TaskStatus {
    pub fn is_active(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }
}

/// A row in the `tasks` table.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: String,
    /// `audio.train` or `image.train`.
    pub task_type: String,
    pub status: String,
    pub input_data: Option<String>,
    pub result_data: Option<String>,
    pub error_msg: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn pending(task_type: impl Into<String>, input_data: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_type: task_type.into(),
            status: TaskStatus::Pending.to_string(),
            input_data,
            result_data: None,
            error_msg: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_strings() {
        assert_eq!(TaskStatus::Interrupted.to_string(), "interrupted");
        assert_eq!(TaskStatus::from_str("running").unwrap(), TaskStatus::Running);
        assert!(TaskStatus::Pending.is_active());
        assert!(!TaskStatus::Cancelled.is_active());
    }
}
