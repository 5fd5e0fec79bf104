//! Dense classification head.

use candle_core::{Module, ModuleT, Tensor};
use candle_nn::{BatchNorm, BatchNormConfig, Dropout, Linear, VarBuilder, batch_norm, linear};
use serde::{Deserialize, Serialize};

use crate::MlError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiddenLayer {
    pub units: usize,
    /// Dropout applied after the activation while training.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dropout: Option<f32>,
    /// Batch normalization after the dropout.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub batch_norm: bool,
}

impl HiddenLayer {
    pub fn new(units: usize, dropout: Option<f32>) -> Self {
        Self { units, dropout, batch_norm: false }
    }

    pub fn with_batch_norm(mut self) -> Self {
        self.batch_norm = true;
        self
    }
}

/// Shape of a trained head plus the feature extractor it was fitted on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Architecture {
    pub input_dim: usize,
    pub hidden: Vec<HiddenLayer>,
    pub n_classes: usize,
    pub extractor: String,
    /// Leading hidden layers that adapt the frozen features.
    #[serde(default)]
    pub adapter_layers: usize,
}

impl Architecture {
    /// Dense(512) → Dropout(0.5) → BatchNorm → Dense(256) → Dropout(0.5) → BatchNorm.
    pub fn audio_head(input_dim: usize, n_classes: usize, extractor: &str) -> Self {
        Self {
            input_dim,
            hidden: vec![
                HiddenLayer::new(512, Some(0.5)).with_batch_norm(),
                HiddenLayer::new(256, Some(0.5)).with_batch_norm(),
            ],
            n_classes,
            extractor: extractor.to_owned(),
            adapter_layers: 0,
        }
    }

    /// `adapter_layers` × Dense(input_dim), then Dense(64) → Dropout(0.5) →
    /// Dense(32) → Dropout(0.3).
    pub fn image_head(input_dim: usize, n_classes: usize, extractor: &str, adapter_layers: usize) -> Self {
        let mut hidden: Vec<HiddenLayer> = (0..adapter_layers).map(|_| HiddenLayer::new(input_dim, None)).collect();
        hidden.push(HiddenLayer::new(64, Some(0.5)));
        hidden.push(HiddenLayer::new(32, Some(0.3)));
        Self {
            input_dim,
            hidden,
            n_classes,
            extractor: extractor.to_owned(),
            adapter_layers,
        }
    }
}

struct Block {
    dense: Linear,
    dropout: Option<Dropout>,
    norm: Option<BatchNorm>,
}

pub struct Mlp {
    hidden: Vec<Block>,
    output: Linear,
}

impl Mlp {
    pub fn new(arch: &Architecture, vb: VarBuilder) -> Result<Self, MlError> {
        let mut hidden = Vec::with_capacity(arch.hidden.len());
        let mut in_dim = arch.input_dim;
        for (i, layer) in arch.hidden.iter().enumerate() {
            let dense = linear(in_dim, layer.units, vb.pp(format!("hidden{i}")))?;
            let norm = if layer.batch_norm {
                Some(batch_norm(layer.units, BatchNormConfig::default(), vb.pp(format!("norm{i}")))?)
            } else {
                None
            };
            hidden.push(Block { dense, dropout: layer.dropout.map(Dropout::new), norm });
            in_dim = layer.units;
        }
        let output = linear(in_dim, arch.n_classes, vb.pp("output"))?;
        Ok(Self { hidden, output })
    }

    /// Raw logits; dropout is only active when `train` is set.
    ///
    /// In training mode batch normalization uses batch statistics and
    /// updates its running averages. A single-row batch has no variance, so
    /// it is normalized with the running averages instead.
    pub fn forward(&self, xs: &Tensor, train: bool) -> Result<Tensor, MlError> {
        let batch_stats = train && xs.dim(0)? > 1;
        let mut xs = xs.clone();
        for block in &self.hidden {
            xs = block.dense.forward(&xs)?.relu()?;
            if let Some(dropout) = &block.dropout {
                xs = dropout.forward(&xs, train)?;
            }
            if let Some(norm) = &block.norm {
                xs = norm.forward_t(&xs, batch_stats)?;
            }
        }
        Ok(self.output.forward(&xs)?)
    }
}
