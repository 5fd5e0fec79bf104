//! Mini-batch training loop for [`Mlp`] heads.

use std::collections::HashMap;

use candle_core::{D, DType, Device, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use super::mlp::{Architecture, Mlp};
use crate::{CancelToken, MlError};

/// Feature matrix with encoded labels.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub features: Vec<Vec<f32>>,
    pub labels: Vec<usize>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    fn tensors(&self, indices: &[usize], dim: usize, device: &Device) -> Result<(Tensor, Tensor), MlError> {
        let mut flat = Vec::with_capacity(indices.len() * dim);
        let mut targets = Vec::with_capacity(indices.len());
        for &i in indices {
            let row = &self.features[i];
            if row.len() != dim {
                return Err(MlError::Precondition(format!(
                    "feature vector {i} has {} values, expected {dim}",
                    row.len()
                )));
            }
            flat.extend_from_slice(row);
            targets.push(self.labels[i] as u32);
        }
        let xs = Tensor::from_vec(flat, (indices.len(), dim), device)?;
        let ys = Tensor::from_vec(targets, indices.len(), device)?;
        Ok((xs, ys))
    }
}

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    /// Stop after this many epochs without a validation-accuracy gain and
    /// restore the best weights. `None` trains for every epoch.
    pub patience: Option<usize>,
    /// Weight the loss by `n / (n_classes * count_c)`.
    pub balance_classes: bool,
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 32,
            learning_rate: 1e-3,
            weight_decay: 0.01,
            patience: Some(5),
            balance_classes: true,
            seed: 42,
        }
    }
}

/// Result of [`fit`].
pub struct FittedHead {
    pub varmap: VarMap,
    pub mlp: Mlp,
    pub accuracy: f32,
    pub epochs_run: usize,
}

/// `n / (n_classes * count_c)` for every class index; unseen classes get 0.
pub fn balanced_class_weights(labels: &[usize], n_classes: usize) -> Vec<f32> {
    let mut counts = vec![0usize; n_classes];
    for &l in labels {
        counts[l] += 1;
    }
    let n = labels.len() as f32;
    counts
        .iter()
        .map(|&c| if c == 0 { 0.0 } else { n / (n_classes as f32 * c as f32) })
        .collect()
}

/// Train a fresh head on `data[train]`, scoring accuracy on `data[validation]`.
///
/// An empty validation set falls back to scoring on the training rows.
/// `cancel` is checked before every epoch.
pub fn fit(
    arch: &Architecture,
    data: &Dataset,
    train: &[usize],
    validation: &[usize],
    config: &TrainConfig,
    cancel: &CancelToken,
) -> Result<FittedHead, MlError> {
    if train.is_empty() {
        return Err(MlError::Precondition("no training samples".into()));
    }
    let device = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let mlp = Mlp::new(arch, vb)?;

    let mut optimizer = AdamW::new(
        varmap.all_vars(),
        ParamsAdamW {
            lr: config.learning_rate,
            weight_decay: config.weight_decay,
            ..Default::default()
        },
    )?;

    let train_labels: Vec<usize> = train.iter().map(|&i| data.labels[i]).collect();
    let class_weights = if config.balance_classes {
        balanced_class_weights(&train_labels, arch.n_classes)
    } else {
        vec![1.0; arch.n_classes]
    };
    let class_weights = Tensor::from_vec(class_weights, arch.n_classes, &device)?;

    let scoring = if validation.is_empty() { train } else { validation };
    let (val_xs, val_ys) = data.tensors(scoring, arch.input_dim, &device)?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut order = train.to_vec();
    let mut best: Option<(f32, HashMap<String, Tensor>)> = None;
    let mut stale = 0usize;
    let mut accuracy = 0.0f32;
    let mut epochs_run = 0usize;

    for epoch in 1..=config.epochs {
        if cancel.is_cancelled() {
            return Err(MlError::Cancelled);
        }
        order.shuffle(&mut rng);
        let mut loss_sum = 0.0f32;
        let mut batches = 0usize;
        for batch in order.chunks(config.batch_size.max(1)) {
            let (xs, ys) = data.tensors(batch, arch.input_dim, &device)?;
            let logits = mlp.forward(&xs, true)?;
            let loss = weighted_cross_entropy(&logits, &ys, &class_weights)?;
            optimizer.backward_step(&loss)?;
            loss_sum += loss.to_scalar::<f32>()?;
            batches += 1;
        }

        accuracy = evaluate(&mlp, &val_xs, &val_ys)?;
        epochs_run = epoch;
        debug!(epoch, loss = loss_sum / batches as f32, val_accuracy = accuracy, "epoch finished");

        let Some(patience) = config.patience else { continue };
        let best_acc = best.as_ref().map(|(acc, _)| *acc);
        if best_acc.is_none_or(|b| accuracy > b) {
            best = Some((accuracy, snapshot(&varmap)?));
            stale = 0;
        } else {
            stale += 1;
            if stale >= patience {
                info!(epoch, best_accuracy = best_acc, "early stopping");
                break;
            }
        }
    }

    if let Some((best_acc, weights)) = best {
        restore(&varmap, &weights)?;
        accuracy = best_acc;
    }
    Ok(FittedHead { varmap, mlp, accuracy, epochs_run })
}

/// Mean over the batch of `-w[y] * log_softmax(logits)[y]`.
fn weighted_cross_entropy(logits: &Tensor, targets: &Tensor, class_weights: &Tensor) -> Result<Tensor, MlError> {
    let log_probs = candle_nn::ops::log_softmax(logits, D::Minus1)?;
    let picked = log_probs.gather(&targets.unsqueeze(1)?, 1)?.squeeze(1)?;
    let weights = class_weights.index_select(targets, 0)?;
    Ok((picked * weights)?.neg()?.mean_all()?)
}

fn evaluate(mlp: &Mlp, xs: &Tensor, ys: &Tensor) -> Result<f32, MlError> {
    let predicted = mlp.forward(xs, false)?.argmax(D::Minus1)?;
    let correct = predicted.eq(ys)?.to_dtype(DType::F32)?.sum_all()?.to_scalar::<f32>()?;
    Ok(correct / ys.dim(0)? as f32)
}

fn snapshot(varmap: &VarMap) -> Result<HashMap<String, Tensor>, MlError> {
    let vars = varmap
        .data()
        .lock()
        .map_err(|_| MlError::Precondition("variable map lock poisoned".into()))?;
    vars.iter()
        .map(|(name, var)| Ok((name.clone(), var.as_tensor().copy()?)))
        .collect()
}

fn restore(varmap: &VarMap, weights: &HashMap<String, Tensor>) -> Result<(), MlError> {
    let vars = varmap
        .data()
        .lock()
        .map_err(|_| MlError::Precondition("variable map lock poisoned".into()))?;
    for (name, var) in vars.iter() {
        if let Some(tensor) = weights.get(name) {
            var.set(tensor)?;
        }
    }
    Ok(())
}
