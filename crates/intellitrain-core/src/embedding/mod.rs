//! Audio embedders: fixed-length vectors summarising a one-second window.
//!
//! Extraction failures are reported as [`MlError::EmbeddingFailed`]; an
//! all-zero vector is never handed back as if it were a valid embedding.

mod spectral;
#[cfg(feature = "onnx")]
mod onnx;

use std::path::Path;
use std::sync::Arc;

pub use spectral::SpectralEmbedder;
#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedder;

use crate::MlError;

/// Maps a mono 16 kHz window to a fixed-length embedding.
pub trait AudioEmbedder: Send + Sync {
    /// Stable identifier stored alongside trained artifacts.
    fn name(&self) -> &str;

    /// Length of every vector returned by [`AudioEmbedder::embed`].
    fn dim(&self) -> usize;

    fn embed(&self, window: &[f32]) -> Result<Vec<f32>, MlError>;
}

/// Build the embedder for an optional ONNX model path.
///
/// Without a path the built-in [`SpectralEmbedder`] is used.
pub fn load_embedder(model: Option<&Path>, dim: usize) -> Result<Arc<dyn AudioEmbedder>, MlError> {
    match model {
        None => Ok(Arc::new(SpectralEmbedder::default())),
        #[cfg(feature = "onnx")]
        Some(path) => Ok(Arc::new(OnnxEmbedder::new(path, dim)?)),
        #[cfg(not(feature = "onnx"))]
        Some(path) => {
            let _ = dim;
            Err(MlError::Onnx(format!(
                "{} requires the `onnx` feature",
                path.display()
            )))
        }
    }
}

/// Reject vectors of the wrong size or with no usable signal.
pub fn ensure_usable(embedding: Vec<f32>, dim: usize) -> Result<Vec<f32>, MlError> {
    if embedding.len() != dim {
        return Err(MlError::EmbeddingFailed(format!(
            "expected {dim} values, got {}",
            embedding.len()
        )));
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(MlError::EmbeddingFailed("non-finite values in embedding".into()));
    }
    if embedding.iter().all(|v| *v == 0.0) {
        return Err(MlError::EmbeddingFailed("embedding is all zeros".into()));
    }
    Ok(embedding)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn all_zero_embedding_is_an_error() {
        let err = ensure_usable(vec![0.0; 4], 4).unwrap_err();
        assert!(matches!(err, MlError::EmbeddingFailed(_)));
    }

    #[test]
    fn wrong_length_is_an_error() {
        assert!(ensure_usable(vec![1.0; 3], 4).is_err());
    }

    #[test]
    fn nan_is_an_error() {
        assert!(ensure_usable(vec![1.0, f32::NAN], 2).is_err());
    }

    #[test]
    fn default_embedder_is_spectral() {
        let embedder = load_embedder(None, 1024).unwrap();
        assert_eq!(embedder.name(), "spectral-v1");
        assert_eq!(embedder.dim(), 128);
    }
}
