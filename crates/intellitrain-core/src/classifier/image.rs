//! Transfer learning on top of a frozen [`ImageBackbone`].

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::artifact::{Classifier, ModelArtifact, weights_to_bytes};
use super::label::LabelEncoder;
use super::mlp::Architecture;
use super::train::{Dataset, TrainConfig, fit};
use crate::backbone::ImageBackbone;
use crate::image::preprocess;
use crate::split::shuffled_split;
use crate::{CancelToken, ClassProbability, MlError};

pub const VALIDATION_FRACTION: f32 = 0.2;

#[derive(Debug, Clone)]
pub struct ImageTrainParams {
    pub train: TrainConfig,
    /// Trainable adapter layers stacked on the frozen features.
    pub fine_tune_layers: usize,
}

impl Default for ImageTrainParams {
    fn default() -> Self {
        Self {
            train: TrainConfig {
                epochs: 5,
                batch_size: 16,
                learning_rate: 1e-3,
                weight_decay: 0.0,
                patience: None,
                balance_classes: false,
                seed: 42,
            },
            fine_tune_layers: 0,
        }
    }
}

/// An encoded image with its class name.
#[derive(Debug, Clone)]
pub struct LabeledImage {
    pub bytes: Vec<u8>,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePrediction {
    pub class: String,
    pub confidence: f32,
    pub distribution: Vec<ClassProbability>,
}

/// Run every image through `backbone`. Undecodable images are skipped.
pub fn extract_features(
    images: &[LabeledImage],
    backbone: &dyn ImageBackbone,
    cancel: &CancelToken,
) -> Result<Vec<(Vec<f32>, String)>, MlError> {
    let mut out = Vec::with_capacity(images.len());
    for (i, image) in images.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(MlError::Cancelled);
        }
        let features = preprocess(&image.bytes).and_then(|t| backbone.features(&t));
        match features {
            Ok(f) => out.push((f, image.label.clone())),
            Err(e) if e.is_validation() => warn!(index = i, error = %e, "skipping unusable training image"),
            Err(e) => return Err(e),
        }
    }
    Ok(out)
}

pub fn train_image(
    images: &[LabeledImage],
    backbone: &dyn ImageBackbone,
    params: &ImageTrainParams,
    cancel: &CancelToken,
) -> Result<ModelArtifact, MlError> {
    let extracted = extract_features(images, backbone, cancel)?;
    let labels = LabelEncoder::fit(&extracted.iter().map(|(_, l)| l.as_str()).collect::<Vec<_>>());
    if labels.len() < 2 {
        return Err(MlError::Precondition("Need at least 2 classes to train".into()));
    }
    if extracted.len() < 2 {
        return Err(MlError::Precondition("Need at least 2 images to train".into()));
    }

    let data = Dataset {
        labels: extracted.iter().map(|(_, l)| labels.encode(l).unwrap_or_default()).collect(),
        features: extracted.into_iter().map(|(f, _)| f).collect(),
    };
    let split = shuffled_split(data.len(), VALIDATION_FRACTION, params.train.seed);
    info!(
        images = data.len(),
        classes = labels.len(),
        backbone = backbone.name(),
        fine_tune_layers = params.fine_tune_layers,
        "training image classifier"
    );

    let arch = Architecture::image_head(backbone.dim(), labels.len(), backbone.name(), params.fine_tune_layers);
    let fitted = fit(&arch, &data, &split.train, &split.validation, &params.train, cancel)?;
    info!(accuracy = fitted.accuracy, "image classifier trained");

    Ok(ModelArtifact {
        weights: weights_to_bytes(&fitted.varmap)?,
        labels,
        architecture: arch,
        accuracy: fitted.accuracy,
        epochs_run: fitted.epochs_run,
    })
}

/// Arg-max class plus the full distribution, in label order.
pub fn predict_image(
    classifier: &Classifier,
    backbone: &dyn ImageBackbone,
    bytes: &[u8],
) -> Result<ImagePrediction, MlError> {
    classifier.ensure_extractor(backbone.name(), backbone.dim())?;
    let features = backbone.features(&preprocess(bytes)?)?;
    let probs = classifier.predict_proba(&features)?;
    let distribution: Vec<ClassProbability> = classifier
        .labels()
        .classes()
        .iter()
        .zip(&probs)
        .map(|(class, &confidence)| ClassProbability { class: class.clone(), confidence })
        .collect();
    let top = distribution
        .iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        .cloned()
        .ok_or_else(|| MlError::ArtifactMismatch("model has no classes".into()))?;
    Ok(ImagePrediction {
        class: top.class,
        confidence: top.confidence,
        distribution,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backbone::PooledBackbone;
    use crate::image::encode_png;
    use crate::image::test_support::solid;
    use tracing_test::traced_test;

    fn dataset() -> Vec<LabeledImage> {
        let mut images = Vec::new();
        for i in 0..8u8 {
            images.push(LabeledImage {
                bytes: encode_png(&solid(32, 32, [200 + i * 4, 10, 10])).unwrap(),
                label: "red".into(),
            });
            images.push(LabeledImage {
                bytes: encode_png(&solid(32, 32, [10, 10, 200 + i * 4])).unwrap(),
                label: "blue".into(),
            });
        }
        images
    }

    #[test]
    fn single_class_is_rejected() {
        let images: Vec<_> = dataset().into_iter().filter(|i| i.label == "red").collect();
        let err = train_image(&images, &PooledBackbone, &ImageTrainParams::default(), &CancelToken::new()).unwrap_err();
        assert!(matches!(err, MlError::Precondition(_)));
    }

    #[test]
    #[traced_test]
    fn corrupt_images_are_skipped() {
        let mut images = dataset();
        images.push(LabeledImage { bytes: b"junk".to_vec(), label: "red".into() });
        let extracted = extract_features(&images, &PooledBackbone, &CancelToken::new()).unwrap();
        assert_eq!(extracted.len(), images.len() - 1);
        assert!(logs_contain("skipping unusable training image"));
    }

    #[test]
    fn trains_and_separates_colours() {
        let mut params = ImageTrainParams::default();
        params.train.epochs = 100;
        let artifact = train_image(&dataset(), &PooledBackbone, &params, &CancelToken::new()).unwrap();
        assert_eq!(artifact.architecture.extractor, "pooled-v1");
        let clf = Classifier::from_artifact(&artifact).unwrap();

        let red = encode_png(&solid(32, 32, [230, 20, 20])).unwrap();
        let prediction = predict_image(&clf, &PooledBackbone, &red).unwrap();
        assert_eq!(prediction.class, "red");
        assert_eq!(prediction.distribution.len(), 2);
        assert_eq!(prediction, predict_image(&clf, &PooledBackbone, &red).unwrap());
    }

    #[test]
    fn adapters_are_recorded_in_the_architecture() {
        let params = ImageTrainParams { fine_tune_layers: 1, ..Default::default() };
        let artifact = train_image(&dataset(), &PooledBackbone, &params, &CancelToken::new()).unwrap();
        assert_eq!(artifact.architecture.adapter_layers, 1);
        assert_eq!(artifact.architecture.hidden.len(), 3);
    }
}
