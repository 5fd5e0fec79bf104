//! Train/validation splits.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Seed used by every training split so repeated runs see the same partition.
pub const SPLIT_SEED: u64 = 42;

/// Index partition of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Validation fraction for `n` samples over `n_classes` classes.
///
/// Capped so the training side keeps at least one sample per class on
/// average; falls back to 0.1 when that leaves nothing.
pub fn audio_test_size(n: usize, n_classes: usize) -> f32 {
    if n == 0 {
        return 0.1;
    }
    let size = 0.2f32.min(1.0 - n_classes as f32 / n as f32);
    if size <= 0.0 { 0.1 } else { size }
}

/// Per-class split. Every class with at least two samples puts at least
/// one of them in the validation set and keeps at least one for training;
/// singleton classes are training-only.
pub fn stratified_split(labels: &[usize], test_size: f32, seed: u64) -> Split {
    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut split = Split { train: Vec::new(), validation: Vec::new() };
    for (_, mut members) in by_class {
        members.shuffle(&mut rng);
        let n = members.len();
        let n_val = if n < 2 {
            0
        } else {
            ((n as f32 * test_size).round() as usize).clamp(1, n - 1)
        };
        split.validation.extend_from_slice(&members[..n_val]);
        split.train.extend_from_slice(&members[n_val..]);
    }
    split.train.shuffle(&mut rng);
    split
}

/// Plain shuffled split holding out `validation_fraction` of `n` samples.
/// Both sides are non-empty whenever `n >= 2`.
pub fn shuffled_split(n: usize, validation_fraction: f32, seed: u64) -> Split {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let n_val = if n < 2 {
        0
    } else {
        ((n as f32 * validation_fraction).round() as usize).clamp(1, n - 1)
    };
    let train = indices.split_off(n_val);
    Split { train, validation: indices }
}
