use std::sync::Arc;

use intellitrain_core::Modality;
use intellitrain_core::audio::{AudioClip, QualityGate, extension_hint};
use intellitrain_core::classifier::{Architecture, Classifier, LabelEncoder, predict_audio, predict_image};
use tracing::debug;

use crate::entities::{ModelArtifactRecord, ModelStore};
use crate::error::ServerError;
use crate::schemas::prediction::{AudioPredictionResponse, ClassConfidence, ImagePredictionResponse};
use crate::services::upload::UploadedFile;
use crate::state::AppState;

async fn current_model(state: &AppState, modality: Modality) -> Result<ModelArtifactRecord, ServerError> {
    state
        .store
        .latest_artifact(modality)
        .await?
        .ok_or_else(|| ServerError::Precondition("No trained model available".into()))
}

fn load(record: &ModelArtifactRecord) -> Result<Classifier, ServerError> {
    let labels: LabelEncoder = serde_json::from_str(&record.label_encoder)
        .map_err(|e| ServerError::Internal(format!("corrupt label encoder in model {}: {e}", record.id)))?;
    let architecture: Architecture = serde_json::from_str(&record.architecture)
        .map_err(|e| ServerError::Internal(format!("corrupt architecture in model {}: {e}", record.id)))?;
    Ok(Classifier::load(&record.weights, labels, architecture)?)
}

pub async fn audio(state: &AppState, file: UploadedFile) -> Result<AudioPredictionResponse, ServerError> {
    let record = current_model(state, Modality::Audio).await?;
    let embedder = Arc::clone(&state.embedder);
    let model_id = record.id.clone();

    let ranked = tokio::task::spawn_blocking(move || {
        let classifier = load(&record)?;
        classifier.ensure_extractor(embedder.name(), embedder.dim())?;
        let hint = file.filename.as_deref().and_then(extension_hint);
        let clip = AudioClip::from_bytes(&file.bytes, hint, &QualityGate::default())?;
        let embedding = embedder.embed(&clip.window())?;
        Ok::<_, ServerError>(predict_audio(&classifier, &embedding)?)
    })
    .await??;

    debug!(model_id = %model_id, top = ?ranked.first().map(|p| &p.class), "audio prediction");
    Ok(AudioPredictionResponse {
        predictions: ranked.iter().map(|p| (p.class.clone(), p.confidence)).collect(),
        ranked: ranked.into_iter().map(ClassConfidence::from).collect(),
        model_id,
    })
}

pub async fn image(state: &AppState, file: UploadedFile) -> Result<ImagePredictionResponse, ServerError> {
    let record = current_model(state, Modality::Image).await?;
    let backbone = Arc::clone(&state.backbone);
    let model_id = record.id.clone();

    let prediction = tokio::task::spawn_blocking(move || {
        let classifier = load(&record)?;
        Ok::<_, ServerError>(predict_image(&classifier, backbone.as_ref(), &file.bytes)?)
    })
    .await??;

    debug!(model_id = %model_id, class = %prediction.class, "image prediction");
    Ok(ImagePredictionResponse {
        class: prediction.class,
        confidence: prediction.confidence,
        predictions: prediction.distribution.into_iter().map(ClassConfidence::from).collect(),
        model_id,
    })
}
