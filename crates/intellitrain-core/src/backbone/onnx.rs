//! ONNX image backbone (MobileNetV2-style, exported with global average
//! pooling so the output is `[1, dim]`).

use std::path::Path;
use std::sync::Mutex;

use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;
use tracing::info;

use super::ImageBackbone;
use crate::MlError;
use crate::embedding::ensure_usable;
use crate::image::ImageTensor;

pub struct OnnxBackbone {
    session: Mutex<Session>,
    name: String,
    dim: usize,
}

impl OnnxBackbone {
    pub fn new(model_path: &Path, dim: usize) -> Result<Self, MlError> {
        if !model_path.exists() {
            return Err(MlError::Onnx(format!("backbone model not found: {}", model_path.display())));
        }
        let session = Session::builder()
            .and_then(|b| Ok(b.with_intra_threads(1)?))
            .and_then(|mut b| b.commit_from_file(model_path))
            .map_err(|e| MlError::Onnx(format!("failed to load {}: {e}", model_path.display())))?;
        let stem = model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("onnx");
        info!(model = %model_path.display(), dim, "loaded ONNX image backbone");
        Ok(Self {
            session: Mutex::new(session),
            name: format!("onnx:{stem}"),
            dim,
        })
    }
}

impl ImageBackbone for OnnxBackbone {
    fn name(&self) -> &str {
        &self.name
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn features(&self, image: &ImageTensor) -> Result<Vec<f32>, MlError> {
        let shape = (1, 3, image.height as usize, image.width as usize);
        let input = Array4::from_shape_vec(shape, image.to_chw())
            .map_err(|e| MlError::Onnx(format!("input shape error: {e}")))?;
        let input = Tensor::from_array(input).map_err(|e| MlError::Onnx(format!("input tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| MlError::Onnx("backbone session poisoned".into()))?;
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MlError::Onnx(format!("inference failed: {e}")))?;
        let (_, value) = outputs
            .iter()
            .next()
            .ok_or_else(|| MlError::EmbeddingFailed("backbone produced no output".into()))?;
        let (_shape, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| MlError::Onnx(format!("output extraction: {e}")))?;

        ensure_usable(data.to_vec(), self.dim)
    }
}
