//! Stratified train/test partitioning

use crate::error::{PipelineError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Row indices of one train/test partition, each sorted ascending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Seeded stratified splitter.
///
/// Every class contributes `round(count * test_fraction)` rows to the test
/// side, clamped so that both sides keep at least one row of the class.
#[derive(Debug, Clone)]
pub struct StratifiedSplit {
    test_fraction: f64,
    random_state: u64,
}

impl StratifiedSplit {
    pub fn new(test_fraction: f64) -> Self {
        Self {
            test_fraction,
            random_state: 42,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Partition row indices `0..labels.len()`
    pub fn split(&self, labels: &[i64]) -> Result<TrainTestSplit> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(PipelineError::ConfigError(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }

        // Group samples by class
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &label) in labels.iter().enumerate() {
            class_indices.entry(label).or_default().push(idx);
        }

        if class_indices.len() < 2 {
            return Err(PipelineError::DegenerateSplit(format!(
                "need at least 2 classes, found {}",
                class_indices.len()
            )));
        }
        if let Some((label, indices)) = class_indices.iter().find(|(_, idx)| idx.len() < 2) {
            return Err(PipelineError::DegenerateSplit(format!(
                "class {} has {} sample(s), at least 2 are needed to appear on both sides",
                label,
                indices.len()
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut train_indices = Vec::with_capacity(labels.len());
        let mut test_indices = Vec::new();

        for indices in class_indices.values_mut() {
            indices.shuffle(&mut rng);
            let count = indices.len();
            let n_test = ((count as f64 * self.test_fraction).round() as usize).clamp(1, count - 1);
            test_indices.extend_from_slice(&indices[..n_test]);
            train_indices.extend_from_slice(&indices[n_test..]);
        }

        train_indices.sort_unstable();
        test_indices.sort_unstable();

        Ok(TrainTestSplit {
            train_indices,
            test_indices,
        })
    }
}
