use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Multipart;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use intellitrain_core::audio::{AudioClip, QualityGate, extension_hint};
use intellitrain_core::image::{Augmenter, augment_payload, preprocess};
use intellitrain_core::Modality;
use tracing::{debug, info};
use uuid::Uuid;

use crate::entities::{BlobRecord, ClassStore, SampleRecord, SampleStore};
use crate::error::ServerError;
use crate::state::AppState;

/// A file part of a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub bytes: Vec<u8>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

/// The parts of a multipart request this service cares about.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn take_file(&mut self) -> Result<UploadedFile, ServerError> {
        match self.file.take() {
            Some(file) if !file.bytes.is_empty() => Ok(file),
            _ => Err(ServerError::BadRequest("No file uploaded".into())),
        }
    }

    /// Trimmed class name from the `class` (or `label`) field.
    pub fn class_name(&self) -> Result<String, ServerError> {
        self.fields
            .get("class")
            .or_else(|| self.fields.get("label"))
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ServerError::BadRequest("Class is required".into()))
    }

    pub fn flag(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false)
    }
}

/// Drain `multipart`, collecting the first part named in `file_fields` and
/// every other part as text. Fails once the file exceeds `max_bytes`.
pub async fn read_form(
    mut multipart: Multipart,
    file_fields: &[&str],
    max_bytes: usize,
) -> Result<UploadForm, ServerError> {
    let mut form = UploadForm::default();
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Failed to read multipart field: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_owned();
        if file_fields.contains(&name.as_str()) && form.file.is_none() {
            let filename = field.file_name().map(str::to_owned);
            let content_type = field.content_type().map(str::to_owned);
            let mut bytes = Vec::new();
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Failed to read file chunk: {e}")))?
            {
                bytes.extend_from_slice(&chunk);
                if bytes.len() > max_bytes {
                    return Err(ServerError::BadRequest(format!(
                        "File too large: exceeds maximum of {}MB",
                        max_bytes / (1024 * 1024)
                    )));
                }
            }
            debug!(field = %name, filename = ?filename, size_bytes = bytes.len(), "received file part");
            form.file = Some(UploadedFile { bytes, filename, content_type });
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Failed to read field {name}: {e}")))?;
            form.fields.insert(name, text);
        }
    }
    Ok(form)
}

/// Decode, validate and embed an audio upload, then persist it.
///
/// Nothing is written when the clip fails validation.
pub async fn store_audio_sample(
    state: &AppState,
    class_name: &str,
    file: UploadedFile,
) -> Result<SampleRecord, ServerError> {
    let embedder = Arc::clone(&state.embedder);
    let UploadedFile { bytes, filename, content_type } = file;
    let hint_name = filename.clone();
    let (bytes, embedding) = tokio::task::spawn_blocking(move || {
        let clip = AudioClip::from_bytes(&bytes, hint_name.as_deref().and_then(extension_hint), &QualityGate::default())?;
        let embedding = embedder.embed(&clip.window())?;
        Ok::<_, intellitrain_core::MlError>((bytes, embedding))
    })
    .await??;

    state.store.get_or_create_class(Modality::Audio, class_name, false).await?;

    let now = Utc::now();
    let content_type = content_type
        .filter(|c| c.starts_with("audio/"))
        .unwrap_or_else(|| "audio/wav".to_owned());
    let blob = BlobRecord {
        id: Uuid::new_v4().to_string(),
        data: bytes,
        filename: filename.clone(),
        content_type: content_type.clone(),
        created_at: now,
    };
    let sample = SampleRecord {
        id: Uuid::new_v4().to_string(),
        modality: Modality::Audio,
        class_name: class_name.to_owned(),
        blob_id: Some(blob.id.clone()),
        inline_b64: None,
        filename,
        content_type: Some(content_type),
        embedding: Some(embedding),
        extractor: Some(state.embedder.name().to_owned()),
        created_at: now,
    };
    state.store.create_sample(sample.clone(), Some(blob)).await?;
    info!(sample_id = %sample.id, class = %class_name, "stored audio sample");
    Ok(sample)
}

/// Validate and persist an image upload, plus `augment_count` augmented
/// copies when `augment` is set. Returns the sample and the copies' IDs.
pub async fn store_image_sample(
    state: &AppState,
    class_name: &str,
    file: UploadedFile,
    augment: bool,
) -> Result<(SampleRecord, Vec<String>), ServerError> {
    let count = if augment { state.config.augment_count } else { 0 };
    let UploadedFile { bytes, filename, content_type } = file;
    let (bytes, variants) = tokio::task::spawn_blocking(move || {
        preprocess(&bytes)?;
        let variants = if count > 0 {
            augment_payload(&bytes, count, &Augmenter::default(), None)?
        } else {
            Vec::new()
        };
        Ok::<_, intellitrain_core::MlError>((bytes, variants))
    })
    .await??;

    state.store.get_or_create_class(Modality::Image, class_name, false).await?;

    let content_type = content_type
        .filter(|c| c.starts_with("image/"))
        .unwrap_or_else(|| "image/png".to_owned());
    let sample = image_record(class_name, &bytes, filename, content_type);
    state.store.create_sample(sample.clone(), None).await?;

    let mut augmented = Vec::with_capacity(variants.len());
    for variant in variants {
        let copy = image_record(class_name, &variant, None, "image/png".to_owned());
        augmented.push(copy.id.clone());
        state.store.create_sample(copy, None).await?;
    }
    info!(sample_id = %sample.id, class = %class_name, augmented = augmented.len(), "stored image sample");
    Ok((sample, augmented))
}

fn image_record(class_name: &str, bytes: &[u8], filename: Option<String>, content_type: String) -> SampleRecord {
    SampleRecord {
        id: Uuid::new_v4().to_string(),
        modality: Modality::Image,
        class_name: class_name.to_owned(),
        blob_id: None,
        inline_b64: Some(BASE64.encode(bytes)),
        filename,
        content_type: Some(content_type),
        embedding: None,
        extractor: None,
        created_at: Utc::now(),
    }
}
