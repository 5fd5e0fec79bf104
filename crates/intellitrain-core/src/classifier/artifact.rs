//! Persistable trained heads.

use std::collections::HashMap;

use candle_core::{D, DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};

use super::label::LabelEncoder;
use super::mlp::{Architecture, Mlp};
use crate::MlError;

/// Everything needed to rebuild a trained classifier.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    /// safetensors-encoded weights.
    pub weights: Vec<u8>,
    pub labels: LabelEncoder,
    pub architecture: Architecture,
    /// Validation accuracy of the stored weights.
    pub accuracy: f32,
    pub epochs_run: usize,
}

/// Encode every variable of `varmap` as a safetensors buffer.
pub fn weights_to_bytes(varmap: &VarMap) -> Result<Vec<u8>, MlError> {
    let tensors: HashMap<String, Tensor> = {
        let vars = varmap
            .data()
            .lock()
            .map_err(|_| MlError::Precondition("variable map lock poisoned".into()))?;
        vars.iter().map(|(k, v)| (k.clone(), v.as_tensor().clone())).collect()
    };
    let bytes = safetensors::serialize(&tensors, None).map_err(candle_core::Error::from)?;
    Ok(bytes)
}

/// A loaded, inference-only classifier.
pub struct Classifier {
    mlp: Mlp,
    labels: LabelEncoder,
    architecture: Architecture,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("labels", &self.labels)
            .field("architecture", &self.architecture)
            .finish_non_exhaustive()
    }
}

impl Classifier {
    pub fn load(weights: &[u8], labels: LabelEncoder, architecture: Architecture) -> Result<Self, MlError> {
        if labels.len() != architecture.n_classes {
            return Err(MlError::ArtifactMismatch(format!(
                "{} labels for a {}-class head",
                labels.len(),
                architecture.n_classes
            )));
        }
        let device = Device::Cpu;
        let tensors = candle_core::safetensors::load_buffer(weights, &device)?;
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        let mlp = Mlp::new(&architecture, vb)
            .map_err(|e| MlError::ArtifactMismatch(format!("weights do not fit the architecture: {e}")))?;
        Ok(Self { mlp, labels, architecture })
    }

    pub fn from_artifact(artifact: &ModelArtifact) -> Result<Self, MlError> {
        Self::load(&artifact.weights, artifact.labels.clone(), artifact.architecture.clone())
    }

    pub fn labels(&self) -> &LabelEncoder {
        &self.labels
    }

    pub fn architecture(&self) -> &Architecture {
        &self.architecture
    }

    /// Fail unless the head was trained on features from `extractor` of size `dim`.
    pub fn ensure_extractor(&self, extractor: &str, dim: usize) -> Result<(), MlError> {
        if self.architecture.extractor != extractor || self.architecture.input_dim != dim {
            return Err(MlError::ArtifactMismatch(format!(
                "model was trained on {} ({} features) but the server uses {extractor} ({dim} features); retrain the model",
                self.architecture.extractor, self.architecture.input_dim
            )));
        }
        Ok(())
    }

    /// Softmax distribution over [`Classifier::labels`].
    pub fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>, MlError> {
        if features.len() != self.architecture.input_dim {
            return Err(MlError::ArtifactMismatch(format!(
                "expected {} features, got {}",
                self.architecture.input_dim,
                features.len()
            )));
        }
        let xs = Tensor::from_slice(features, (1, features.len()), &Device::Cpu)?;
        let logits = self.mlp.forward(&xs, false)?;
        let probs = candle_nn::ops::softmax(&logits, D::Minus1)?;
        Ok(probs.squeeze(0)?.to_vec1::<f32>()?)
    }
}
