//! ONNX-based audio embedder (YAMNet-compatible graphs).
//!
//! The graph takes a mono 16 kHz waveform `[samples]` and returns frame
//! embeddings `[frames, dim]` as its second output (YAMNet order: scores,
//! embeddings, spectrogram). Frame embeddings are averaged into one vector.

use std::path::Path;
use std::sync::Mutex;

use ndarray::Array1;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use super::{AudioEmbedder, ensure_usable};
use crate::MlError;

/// Index of the embeddings output in a YAMNet export.
const EMBEDDING_OUTPUT: usize = 1;

pub struct OnnxEmbedder {
    // `Session::run` needs `&mut self`.
    session: Mutex<Session>,
    name: String,
    dim: usize,
}

impl OnnxEmbedder {
    pub fn new(model_path: &Path, dim: usize) -> Result<Self, MlError> {
        if !model_path.exists() {
            return Err(MlError::Onnx(format!("embedding model not found: {}", model_path.display())));
        }
        let session = Session::builder()
            .and_then(|b| Ok(b.with_intra_threads(1)?))
            .and_then(|mut b| b.commit_from_file(model_path))
            .map_err(|e| MlError::Onnx(format!("failed to load {}: {e}", model_path.display())))?;

        let stem = model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("onnx");
        info!(model = %model_path.display(), dim, "loaded ONNX audio embedder");

        Ok(Self {
            session: Mutex::new(session),
            name: format!("onnx:{stem}"),
            dim,
        })
    }
}

impl AudioEmbedder for OnnxEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, window: &[f32]) -> Result<Vec<f32>, MlError> {
        let input = Tensor::from_array(Array1::from_vec(window.to_vec()))
            .map_err(|e| MlError::Onnx(format!("input tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| MlError::Onnx("embedder session poisoned".into()))?;
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MlError::Onnx(format!("inference failed: {e}")))?;

        let (_, value) = outputs
            .iter()
            .nth(EMBEDDING_OUTPUT)
            .or_else(|| outputs.iter().next())
            .ok_or_else(|| MlError::EmbeddingFailed("model produced no output".into()))?;
        let (_shape, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| MlError::Onnx(format!("output extraction: {e}")))?;

        if data.is_empty() || data.len() % self.dim != 0 {
            return Err(MlError::EmbeddingFailed(format!(
                "output of {} values is not a multiple of {}",
                data.len(),
                self.dim
            )));
        }

        let frames = data.len() / self.dim;
        let mut mean = vec![0.0f32; self.dim];
        for frame in data.chunks_exact(self.dim) {
            for (m, v) in mean.iter_mut().zip(frame) {
                *m += v / frames as f32;
            }
        }
        debug!(frames, dim = self.dim, "averaged frame embeddings");
        ensure_usable(mean, self.dim)
    }
}
