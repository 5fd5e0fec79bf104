//! Feature extraction and small trainable classifiers for audio clips and
//! images.

pub mod audio;
pub mod backbone;
pub mod classifier;
pub mod embedding;
pub mod error;
pub mod image;
pub mod split;
pub mod types;

pub use error::MlError;
pub use types::{CancelToken, ClassProbability, Modality};
