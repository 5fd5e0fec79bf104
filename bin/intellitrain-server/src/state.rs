//! Shared application state injected into every Axum handler.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use intellitrain_core::CancelToken;
use intellitrain_core::backbone::{ImageBackbone, load_backbone};
use intellitrain_core::embedding::{AudioEmbedder, load_embedder};

use crate::config::Config;
use crate::entities::SqliteStore;

struct Job {
    task_type: String,
    cancel: CancelToken,
}

/// In-flight training jobs, keyed by task ID.
///
/// At most one job per task type is admitted at a time.
pub struct TaskManager {
    jobs: Mutex<HashMap<String, Job>>,
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.jobs.lock().map(|h| h.len()).unwrap_or(0);
        write!(f, "TaskManager({count} jobs)")
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskManager {
    pub fn new() -> Self {
        Self { jobs: Mutex::new(HashMap::new()) }
    }

    /// Register a job unless one of the same type is in flight, in which
    /// case the running job's ID is returned.
    pub fn try_begin(&self, id: &str, task_type: &str) -> Result<CancelToken, String> {
        let mut jobs = self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some((running, _)) = jobs.iter().find(|(_, job)| job.task_type == task_type) {
            return Err(running.clone());
        }
        let cancel = CancelToken::new();
        jobs.insert(
            id.to_owned(),
            Job {
                task_type: task_type.to_owned(),
                cancel: cancel.clone(),
            },
        );
        Ok(cancel)
    }

    /// Signal cancellation. Returns `true` if the job was in flight.
    pub fn cancel(&self, id: &str) -> bool {
        let jobs = self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match jobs.get(id) {
            Some(job) => {
                job.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &str) {
        let mut jobs = self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        jobs.remove(id);
    }
}

/// State shared across all HTTP handlers and background jobs.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<SqliteStore>,
    pub task_manager: Arc<TaskManager>,
    pub embedder: Arc<dyn AudioEmbedder>,
    pub backbone: Arc<dyn ImageBackbone>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("task_manager", &self.task_manager)
            .field("embedder", &self.embedder.name())
            .field("backbone", &self.backbone.name())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Load the configured feature extractors around an open store.
    pub fn new(config: Config, store: SqliteStore) -> Result<Self, intellitrain_core::MlError> {
        let embedder = load_embedder(config.audio_embedder_model.as_deref(), config.audio_embedding_dim)?;
        let backbone = load_backbone(config.image_backbone_model.as_deref(), config.image_feature_dim)?;
        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(store),
            task_manager: Arc::new(TaskManager::new()),
            embedder,
            backbone,
        })
    }
}
