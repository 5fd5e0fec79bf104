//! Training and prediction over stored audio embeddings.

use tracing::info;

use super::artifact::{Classifier, ModelArtifact, weights_to_bytes};
use super::label::LabelEncoder;
use super::mlp::Architecture;
use super::train::{Dataset, TrainConfig, fit};
use super::LabeledFeatures;
use crate::split::{SPLIT_SEED, audio_test_size, stratified_split};
use crate::{CancelToken, ClassProbability, MlError};

pub const MIN_CLASSES: usize = 2;
pub const MIN_SAMPLES: usize = 5;
/// Sharpens the softmax output before it is reported.
pub const PREDICTION_TEMPERATURE: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct AudioTrainParams {
    pub train: TrainConfig,
}

impl Default for AudioTrainParams {
    fn default() -> Self {
        Self {
            train: TrainConfig {
                seed: SPLIT_SEED,
                ..TrainConfig::default()
            },
        }
    }
}

impl AudioTrainParams {
    pub fn with_epochs(epochs: usize) -> Self {
        let mut params = Self::default();
        params.train.epochs = epochs;
        params
    }
}

/// Fit the audio head on precomputed embeddings.
///
/// `registered_classes` is the number of classes the user has created,
/// which may exceed the labels actually present in `samples`.
pub fn train_audio(
    samples: &[LabeledFeatures],
    registered_classes: usize,
    extractor: &str,
    params: &AudioTrainParams,
    cancel: &CancelToken,
) -> Result<ModelArtifact, MlError> {
    if registered_classes < MIN_CLASSES {
        return Err(MlError::Precondition(format!(
            "Need at least {MIN_CLASSES} classes to train"
        )));
    }
    if samples.len() < MIN_SAMPLES {
        return Err(MlError::Precondition(format!(
            "Need at least {MIN_SAMPLES} total samples to train"
        )));
    }
    let labels = LabelEncoder::fit(&samples.iter().map(|s| s.label.as_str()).collect::<Vec<_>>());
    if labels.len() < MIN_CLASSES {
        return Err(MlError::Precondition(format!(
            "Need samples from at least {MIN_CLASSES} different classes"
        )));
    }

    let input_dim = samples[0].features.len();
    let data = Dataset {
        features: samples.iter().map(|s| s.features.clone()).collect(),
        labels: samples
            .iter()
            .map(|s| labels.encode(&s.label).unwrap_or_default())
            .collect(),
    };
    let test_size = audio_test_size(data.len(), labels.len());
    let split = stratified_split(&data.labels, test_size, SPLIT_SEED);
    info!(
        samples = data.len(),
        classes = labels.len(),
        train = split.train.len(),
        validation = split.validation.len(),
        "training audio classifier"
    );

    let arch = Architecture::audio_head(input_dim, labels.len(), extractor);
    let fitted = fit(&arch, &data, &split.train, &split.validation, &params.train, cancel)?;
    info!(accuracy = fitted.accuracy, epochs = fitted.epochs_run, "audio classifier trained");

    Ok(ModelArtifact {
        weights: weights_to_bytes(&fitted.varmap)?,
        labels,
        architecture: arch,
        accuracy: fitted.accuracy,
        epochs_run: fitted.epochs_run,
    })
}

/// Temperature-scaled distribution, most likely class first.
pub fn predict_audio(classifier: &Classifier, embedding: &[f32]) -> Result<Vec<ClassProbability>, MlError> {
    let probs = classifier.predict_proba(embedding)?;
    let scaled = apply_temperature(&probs, PREDICTION_TEMPERATURE);
    let mut out: Vec<ClassProbability> = classifier
        .labels()
        .classes()
        .iter()
        .zip(scaled)
        .map(|(class, confidence)| ClassProbability { class: class.clone(), confidence })
        .collect();
    out.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    Ok(out)
}

/// `p^(1/T) / Σ p^(1/T)`.
pub fn apply_temperature(probs: &[f32], temperature: f32) -> Vec<f32> {
    let powered: Vec<f32> = probs.iter().map(|p| p.powf(1.0 / temperature)).collect();
    let total: f32 = powered.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return probs.to_vec();
    }
    powered.into_iter().map(|p| p / total).collect()
}
