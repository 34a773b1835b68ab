//! Synthetic data generation module
//!
//! Minority-class oversampling for the training partition. The held-out
//! partition is never passed through here.

mod smote;

pub use smote::SMOTE;

use crate::error::PipelineWarning;
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;

/// Outcome of one balancing pass
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceReport {
    /// Label that was (or would have been) oversampled
    pub minority_label: i64,
    /// Minority row count before balancing
    pub minority_count: usize,
    /// Majority row count (unchanged by balancing)
    pub majority_count: usize,
    /// Number of synthetic rows appended
    pub n_synthetic: usize,
    /// Neighbour count actually used, `None` when balancing was skipped
    pub k_neighbors: Option<usize>,
    /// Set when balancing was skipped
    pub warning: Option<PipelineWarning>,
}

impl BalanceReport {
    pub fn skipped(&self) -> bool {
        self.warning.is_some()
    }
}

/// Training rows plus appended synthetic minority rows
#[derive(Debug, Clone)]
pub struct BalancedTrainingSet {
    /// Original rows first, synthetic rows after
    pub x: Array2<f64>,
    pub y: Array1<i64>,
    pub report: BalanceReport,
}

/// Get class distribution
pub fn class_counts(y: &Array1<i64>) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for &label in y.iter() {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Get indices for each class
pub fn class_indices(y: &Array1<i64>) -> BTreeMap<i64, Vec<usize>> {
    let mut indices = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        indices.entry(label).or_insert_with(Vec::new).push(i);
    }
    indices
}
