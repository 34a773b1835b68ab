//! SMOTE (Synthetic Minority Over-sampling Technique)

use crate::error::{PipelineError, PipelineWarning, Result};
use crate::synthetic::{class_counts, class_indices, BalanceReport, BalancedTrainingSet};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, warn};

/// Distance/index pair ordered by distance, then index
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0).then(self.1.cmp(&other.1))
    }
}

/// Binary-label SMOTE balancer.
///
/// Walks the minority rows in order, and for each one interpolates towards
/// one of its `k` nearest minority neighbours chosen at random, until the
/// minority count matches the majority count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SMOTE {
    /// Number of nearest neighbors
    k_neighbors: usize,
    /// Random seed
    seed: u64,
}

impl Default for SMOTE {
    fn default() -> Self {
        Self::new()
    }
}

impl SMOTE {
    /// Create new SMOTE sampler
    pub fn new() -> Self {
        Self {
            k_neighbors: 5,
            seed: 42,
        }
    }

    /// Set number of neighbors
    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Neighbour count used for a minority class of `minority_count` rows
    pub fn effective_k(&self, minority_count: usize) -> usize {
        if minority_count < self.k_neighbors + 1 {
            minority_count.saturating_sub(1).max(1)
        } else {
            self.k_neighbors
        }
    }

    /// Euclidean distance
    fn distance(a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(ai, bi)| (ai - bi).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Indices of the k nearest rows to `data[target]`, excluding itself, nearest first
    fn find_neighbors(target: usize, data: &[Vec<f64>], k: usize) -> Vec<usize> {
        let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);

        for (i, d) in data.iter().enumerate() {
            if i == target {
                continue;
            }
            let candidate = DistIdx(Self::distance(&data[target], d), i);
            if heap.len() < k {
                heap.push(candidate);
            } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                heap.pop();
                heap.push(candidate);
            }
        }

        heap.into_sorted_vec().into_iter().map(|DistIdx(_, i)| i).collect()
    }

    /// Generate synthetic sample between two points
    fn generate_sample(point: &[f64], neighbor: &[f64], rng: &mut ChaCha8Rng) -> Vec<f64> {
        let gap: f64 = rng.gen();
        point
            .iter()
            .zip(neighbor.iter())
            .map(|(&p, &n)| p + gap * (n - p))
            .collect()
    }

    /// Balance a binary-labelled training set.
    ///
    /// With fewer than two minority rows nothing is synthesized and the
    /// report carries an [`PipelineWarning::InsufficientMinorityClass`].
    pub fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<BalancedTrainingSet> {
        if x.nrows() != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }

        let counts = class_counts(y);
        let (minority_label, minority_count, majority_count) = match counts.len() {
            0 => {
                return Err(PipelineError::ValidationError(
                    "cannot balance an empty training set".to_string(),
                ))
            }
            1 => {
                let (&only, &count) = counts.iter().next().ok_or_else(|| {
                    PipelineError::ValidationError("class counts unexpectedly empty".to_string())
                })?;
                (if only == 0 { 1 } else { 0 }, 0, count)
            }
            2 => {
                let mut by_count: Vec<(i64, usize)> = counts.iter().map(|(&l, &c)| (l, c)).collect();
                // ascending count, ties broken towards the larger label
                by_count.sort_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)));
                (by_count[0].0, by_count[0].1, by_count[1].1)
            }
            n => {
                return Err(PipelineError::ValidationError(format!(
                    "SMOTE balancer expects binary labels, found {} classes",
                    n
                )))
            }
        };

        if minority_count < 2 {
            let warning = PipelineWarning::InsufficientMinorityClass {
                label: minority_label,
                count: minority_count,
            };
            warn!(%warning, majority_count, "Skipping oversampling");
            return Ok(BalancedTrainingSet {
                x: x.clone(),
                y: y.clone(),
                report: BalanceReport {
                    minority_label,
                    minority_count,
                    majority_count,
                    n_synthetic: 0,
                    k_neighbors: None,
                    warning: Some(warning),
                },
            });
        }

        let k = self.effective_k(minority_count);
        let n_to_generate = majority_count - minority_count;

        let indices = class_indices(y);
        let class_samples: Vec<Vec<f64>> = indices
            .get(&minority_label)
            .map(|idx| idx.iter().map(|&i| x.row(i).to_vec()).collect())
            .unwrap_or_default();

        let neighbor_table: Vec<Vec<usize>> = (0..class_samples.len())
            .map(|i| Self::find_neighbors(i, &class_samples, k))
            .collect();

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut synthetic_x: Vec<Vec<f64>> = Vec::with_capacity(n_to_generate);

        for generated in 0..n_to_generate {
            let idx = generated % class_samples.len();
            let neighbors = &neighbor_table[idx];
            let neighbor_idx = neighbors[rng.gen_range(0..neighbors.len())];
            synthetic_x.push(Self::generate_sample(
                &class_samples[idx],
                &class_samples[neighbor_idx],
                &mut rng,
            ));
        }

        debug!(
            minority_label,
            minority_count,
            majority_count,
            k,
            n_synthetic = n_to_generate,
            "SMOTE oversampling complete"
        );

        // Build result: original rows + synthetic rows
        let n_original = x.nrows();
        let n_features = x.ncols();
        let n_total = n_original + synthetic_x.len();
        let result_x = Array2::from_shape_fn((n_total, n_features), |(i, j)| {
            if i < n_original {
                x[[i, j]]
            } else {
                synthetic_x[i - n_original][j]
            }
        });

        let mut all_y: Vec<i64> = y.iter().copied().collect();
        all_y.extend(std::iter::repeat(minority_label).take(n_to_generate));

        Ok(BalancedTrainingSet {
            x: result_x,
            y: Array1::from_vec(all_y),
            report: BalanceReport {
                minority_label,
                minority_count,
                majority_count,
                n_synthetic: n_to_generate,
                k_neighbors: Some(k),
                warning: None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_imbalanced_data(n_majority: usize, n_minority: usize) -> (Array2<f64>, Array1<i64>) {
        let mut data = Vec::new();
        let mut labels = Vec::new();

        // Majority class (0) around (0, 0)
        for i in 0..n_majority {
            data.push((i % 5) as f64);
            data.push((i / 5) as f64);
            labels.push(0i64);
        }

        // Minority class (1) around (10, 10)
        for i in 0..n_minority {
            data.push(10.0 + (i % 3) as f64);
            data.push(10.0 + (i / 3) as f64);
            labels.push(1i64);
        }

        let n = n_majority + n_minority;
        (Array2::from_shape_vec((n, 2), data).unwrap(), Array1::from_vec(labels))
    }

    #[test]
    fn test_smote_balances_exactly() {
        let (x, y) = create_imbalanced_data(80, 20);
        let result = SMOTE::new().with_seed(42).resample(&x, &y).unwrap();

        let counts = class_counts(&result.y);
        assert_eq!(counts.get(&0), Some(&80));
        assert_eq!(counts.get(&1), Some(&80));
        assert_eq!(result.report.n_synthetic, 60);
        assert_eq!(result.report.k_neighbors, Some(5));
    }

    #[test]
    fn test_smote_preserves_original() {
        let (x, y) = create_imbalanced_data(20, 5);
        let result = SMOTE::new().with_seed(42).resample(&x, &y).unwrap();

        for i in 0..x.nrows() {
            for j in 0..x.ncols() {
                assert_eq!(result.x[[i, j]], x[[i, j]]);
            }
            assert_eq!(result.y[i], y[i]);
        }
    }

    #[test]
    fn test_synthetic_rows_lie_in_minority_hull() {
        let (x, y) = create_imbalanced_data(20, 5);
        let result = SMOTE::new().with_seed(7).resample(&x, &y).unwrap();

        for row in result.x.rows().into_iter().skip(x.nrows()) {
            assert!(row.iter().all(|&v| (10.0..=12.0).contains(&v)), "row {:?}", row);
        }
    }

    #[test]
    fn test_k_reduced_for_small_minority() {
        let (x, y) = create_imbalanced_data(10, 3);
        let result = SMOTE::new().with_k_neighbors(5).resample(&x, &y).unwrap();
        assert_eq!(result.report.k_neighbors, Some(2));
        assert_eq!(class_counts(&result.y).get(&1), Some(&10));
    }

    #[test]
    fn test_single_minority_sample_skips() {
        let (x, y) = create_imbalanced_data(10, 1);
        let result = SMOTE::new().resample(&x, &y).unwrap();
        assert!(result.report.skipped());
        assert_eq!(result.x.nrows(), 11);
        assert_eq!(
            result.report.warning,
            Some(PipelineWarning::InsufficientMinorityClass { label: 1, count: 1 })
        );
    }

    #[test]
    fn test_single_class_skips() {
        let (x, y) = create_imbalanced_data(6, 0);
        let result = SMOTE::new().resample(&x, &y).unwrap();
        assert_eq!(
            result.report.warning,
            Some(PipelineWarning::InsufficientMinorityClass { label: 1, count: 0 })
        );
    }

    #[test]
    fn test_seeded_output_is_reproducible() {
        let (x, y) = create_imbalanced_data(30, 6);
        let a = SMOTE::new().with_seed(3).resample(&x, &y).unwrap();
        let b = SMOTE::new().with_seed(3).resample(&x, &y).unwrap();
        assert_eq!(a.x, b.x);
    }

    #[test]
    fn test_duplicate_minority_rows_still_have_neighbors() {
        let x = Array2::from_shape_vec((5, 1), vec![0.0, 0.0, 0.0, 1.0, 1.0]).unwrap();
        let y = Array1::from_vec(vec![0, 0, 0, 1, 1]);
        let result = SMOTE::new().resample(&x, &y).unwrap();
        assert_eq!(result.x.nrows(), 6);
        assert_eq!(result.x[[5, 0]], 1.0);
    }
}
