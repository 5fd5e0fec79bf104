//! Frozen image backbones producing fixed-length feature vectors.

mod pooled;
#[cfg(feature = "onnx")]
mod onnx;

use std::path::Path;
use std::sync::Arc;

pub use pooled::PooledBackbone;
#[cfg(feature = "onnx")]
pub use onnx::OnnxBackbone;

use crate::MlError;
use crate::image::ImageTensor;

pub trait ImageBackbone: Send + Sync {
    /// Stable identifier stored alongside trained artifacts.
    fn name(&self) -> &str;

    fn dim(&self) -> usize;

    fn features(&self, image: &ImageTensor) -> Result<Vec<f32>, MlError>;
}

/// Build the backbone for an optional ONNX model path; `None` selects
/// [`PooledBackbone`].
pub fn load_backbone(model: Option<&Path>, dim: usize) -> Result<Arc<dyn ImageBackbone>, MlError> {
    match model {
        None => Ok(Arc::new(PooledBackbone)),
        #[cfg(feature = "onnx")]
        Some(path) => Ok(Arc::new(OnnxBackbone::new(path, dim)?)),
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
