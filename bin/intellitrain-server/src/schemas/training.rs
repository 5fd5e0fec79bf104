use serde::Serialize;
use utoipa::ToSchema;

use crate::entities::{TaskRecord, TaskStatus};

#[derive(Debug, Serialize, ToSchema)]
pub struct TrainResponse {
    pub task_id: String,
    pub status: TaskStatus,
}

/// Status vocabulary of the polling endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrainingState {
    Idle,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrainingStatusResponse {
    pub status: TrainingState,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl TrainingStatusResponse {
    pub fn idle() -> Self {
        Self { status: TrainingState::Idle, error: None, task_id: None }
    }

    /// Collapse a job record onto the polling vocabulary. Cancelled and
    /// interrupted jobs read as failed, with the reason in `error`.
    pub fn from_task(task: &TaskRecord) -> Self {
        let status = task.status.parse::<TaskStatus>().unwrap_or(TaskStatus::Failed);
        let (status, error) = match status {
            TaskStatus::Pending | TaskStatus::Running => (TrainingState::InProgress, None),
            TaskStatus::Succeeded => (TrainingState::Completed, None),
            TaskStatus::Failed => (TrainingState::Failed, task.error_msg.clone()),
            TaskStatus::Cancelled => (TrainingState::Failed, Some("training was cancelled".to_owned())),
            TaskStatus::Interrupted => (
                TrainingState::Failed,
                Some("training was interrupted by a server restart".to_owned()),
            ),
        };
        Self { status, error, task_id: Some(task.id.clone()) }
    }
}
