//! Background training jobs.
//!
//! `start` admits at most one job per modality, records it as `pending`
//! and returns immediately; the job itself moves the record through
//! `running` to `succeeded`, `failed` or `cancelled`.

use std::sync::Arc;

use chrono::Utc;
use intellitrain_core::audio::{AudioClip, QualityGate};
use intellitrain_core::classifier::{
    AudioTrainParams, ImageTrainParams, LabeledFeatures, LabeledImage, ModelArtifact, train_audio, train_image,
};
use intellitrain_core::{CancelToken, MlError, Modality};
use serde_json::json;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::entities::{ClassStore, ModelArtifactRecord, ModelStore, SampleStore, TaskRecord, TaskStatus, TaskStore};
use crate::error::ServerError;
use crate::state::AppState;

pub fn task_type(modality: Modality) -> String {
    format!("{}.train", modality.as_str())
}

/// Admit and spawn a training job for `modality`.
///
/// Fails with [`ServerError::Conflict`] while another job of the same
/// modality is pending or running.
pub async fn start(state: &AppState, modality: Modality) -> Result<TaskRecord, ServerError> {
    let task_type = task_type(modality);
    let input = match modality {
        Modality::Audio => json!({
            "epochs": state.config.audio_epochs,
            "extractor": state.embedder.name(),
        }),
        Modality::Image => json!({
            "epochs": state.config.image_epochs,
            "fine_tune_layers": state.config.image_fine_tune_layers,
            "extractor": state.backbone.name(),
        }),
    };
    let record = TaskRecord::pending(&task_type, Some(input.to_string()));

    let cancel = state.task_manager.try_begin(&record.id, &task_type).map_err(|running| {
        ServerError::Conflict(format!("Training already in progress (task {running})"))
    })?;
    if let Err(e) = state.store.insert_task(record.clone()).await {
        state.task_manager.remove(&record.id);
        return Err(e.into());
    }

    let job_state = state.clone();
    let task_id = record.id.clone();
    let span = info_span!("training_job", task_id = %task_id, modality = %modality);
    tokio::spawn(
        async move {
            run(&job_state, &task_id, modality, cancel).await;
            job_state.task_manager.remove(&task_id);
        }
        .instrument(span),
    );

    info!(task_id = %record.id, modality = %modality, "training job accepted");
    Ok(record)
}

async fn run(state: &AppState, task_id: &str, modality: Modality, cancel: CancelToken) {
    match state.store.update_active_task(task_id, TaskStatus::Running.as_ref(), None, None).await {
        Ok(true) => {}
        Ok(false) => {
            info!("job was cancelled before it started");
            return;
        }
        Err(e) => {
            error!(error = %e, "failed to mark job running");
            return;
        }
    }
    info!("training started");

    let outcome = match modality {
        Modality::Audio => train_audio_job(state, cancel.clone()).await,
        Modality::Image => train_image_job(state, cancel.clone()).await,
    };

    let finished = match outcome {
        Ok(artifact) if cancel.is_cancelled() => {
            info!(accuracy = artifact.accuracy, "discarding model of a cancelled job");
            Ok(false)
        }
        Ok(artifact) => match persist(state, task_id, modality, &artifact).await {
            Ok(Some(model_id)) => {
                info!(accuracy = artifact.accuracy, model_id = %model_id, "training succeeded");
                Ok(true)
            }
            Ok(None) => {
                info!(accuracy = artifact.accuracy, "job was cancelled while saving; model discarded");
                Ok(false)
            }
            Err(e) => {
                error!(error = %e, "failed to persist trained model");
                state
                    .store
                    .update_active_task(task_id, TaskStatus::Failed.as_ref(), None, Some("failed to save model"))
                    .await
            }
        },
        Err(JobError::Ml(MlError::Cancelled)) => {
            info!("training cancelled");
            state.store.update_active_task(task_id, TaskStatus::Cancelled.as_ref(), None, None).await
        }
        Err(e) => {
            warn!(error = %e, "training failed");
            state
                .store
                .update_active_task(task_id, TaskStatus::Failed.as_ref(), None, Some(&e.client_message()))
                .await
        }
    };
    match finished {
        Ok(true) => {}
        Ok(false) => info!("job is no longer active; outcome not recorded"),
        Err(e) => error!(error = %e, "failed to record job outcome"),
    }
}

#[derive(Debug, thiserror::Error)]
enum JobError {
    #[error(transparent)]
    Ml(#[from] MlError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("worker panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl JobError {
    /// Text stored in the task record; only precondition failures are
    /// specific, the rest is logged.
    fn client_message(&self) -> String {
        match self {
            JobError::Ml(MlError::Precondition(m)) => m.clone(),
            JobError::Ml(e) if e.is_validation() => e.to_string(),
            _ => "training failed".to_owned(),
        }
    }
}

async fn train_audio_job(state: &AppState, cancel: CancelToken) -> Result<ModelArtifact, JobError> {
    let registered = state.store.count_classes(Modality::Audio).await? as usize;
    let stored = state.store.read_all(Modality::Audio).await?;
    let embedder = Arc::clone(&state.embedder);
    let params = AudioTrainParams::with_epochs(state.config.audio_epochs);

    let artifact = tokio::task::spawn_blocking(move || {
        let gate = QualityGate::default();
        let mut samples = Vec::with_capacity(stored.len());
        for sample in stored {
            let features = match (sample.embedding_for(embedder.name(), embedder.dim()), &sample.payload) {
                (Some(embedding), _) => Ok(embedding.to_vec()),
                (None, Some(payload)) => {
                    if sample.embedding.is_some() {
                        debug!(
                            sample_id = %sample.id,
                            stored_extractor = sample.extractor.as_deref().unwrap_or("unknown"),
                            "re-embedding sample for the current extractor"
                        );
                    }
                    AudioClip::from_bytes(payload, None, &gate).and_then(|clip| embedder.embed(&clip.window()))
                }
                (None, None) => Err(MlError::EmbeddingFailed("sample has no payload".into())),
            };
            match features {
                Ok(features) => samples.push(LabeledFeatures { features, label: sample.class_name }),
                Err(e) => warn!(sample_id = %sample.id, error = %e, "skipping unusable audio sample"),
            }
        }
        train_audio(&samples, registered, embedder.name(), &params, &cancel)
    })
    .await??;
    Ok(artifact)
}

async fn train_image_job(state: &AppState, cancel: CancelToken) -> Result<ModelArtifact, JobError> {
    let stored = state.store.read_all(Modality::Image).await?;
    let backbone = Arc::clone(&state.backbone);
    let mut params = ImageTrainParams {
        fine_tune_layers: state.config.image_fine_tune_layers,
        ..Default::default()
    };
    params.train.epochs = state.config.image_epochs;

    let images: Vec<LabeledImage> = stored
        .into_iter()
        .filter_map(|s| match s.payload {
            Some(bytes) => Some(LabeledImage { bytes, label: s.class_name }),
            None => {
                warn!(sample_id = %s.id, "image sample has no payload");
                None
            }
        })
        .collect();

    let artifact = tokio::task::spawn_blocking(move || train_image(&images, backbone.as_ref(), &params, &cancel)).await??;
    Ok(artifact)
}

/// Store the artifact and mark the task succeeded together. `None` when the
/// task was cancelled first, in which case nothing is written.
async fn persist(
    state: &AppState,
    task_id: &str,
    modality: Modality,
    artifact: &ModelArtifact,
) -> Result<Option<String>, JobError> {
    let classes = artifact.labels.classes().to_vec();
    let record = ModelArtifactRecord {
        id: Uuid::new_v4().to_string(),
        modality,
        weights: artifact.weights.clone(),
        label_encoder: serde_json::to_string(&artifact.labels).map_err(MlError::from)?,
        architecture: serde_json::to_string(&artifact.architecture).map_err(MlError::from)?,
        accuracy: artifact.accuracy as f64,
        classes: serde_json::to_string(&classes).map_err(MlError::from)?,
        task_id: Some(task_id.to_owned()),
        created_at: Utc::now(),
    };
    let model_id = record.id.clone();
    let result = json!({
        "model_id": model_id,
        "accuracy": artifact.accuracy,
        "classes": classes,
        "epochs": artifact.epochs_run,
    });
    let committed = state
        .store
        .commit_trained_artifact(task_id, &result.to_string(), record)
        .await?;
    Ok(committed.then_some(model_id))
}
