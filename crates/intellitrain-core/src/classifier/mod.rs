//! Trainable classification heads and the audio/image pipelines built on them.

pub mod artifact;
pub mod audio;
pub mod image;
pub mod label;
pub mod mlp;
pub mod train;

pub use artifact::{Classifier, ModelArtifact};
pub use audio::{AudioTrainParams, predict_audio, train_audio};
pub use image::{ImagePrediction, ImageTrainParams, LabeledImage, predict_image, train_image};
pub use label::LabelEncoder;
pub use mlp::Architecture;
pub use train::TrainConfig;

/// A stored feature vector with its class name.
#[derive(Debug, Clone)]
pub struct LabeledFeatures {
    pub features: Vec<f32>,
    pub label: String,
}
