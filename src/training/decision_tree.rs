//! Binary classification tree

use super::config::{Criterion, ForestConfig};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf storing the fraction of positive training rows that reached it
    Leaf {
        proba: f64,
        n_samples: usize,
    },
    /// Internal node; rows with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Best split found at a node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Binary decision tree over 0/1 labels.
///
/// Each split examines a random subset of `max_features` columns drawn from
/// the tree's own seeded generator, so a tree is fully determined by its
/// data and `random_state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Maximum features to consider per split, all when `None`
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for the per-split feature draw
    pub random_state: u64,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: 0,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Tree with the per-tree settings of a forest configuration
    pub fn from_config(config: &ForestConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            criterion: config.criterion,
            ..Self::new()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set number of features drawn per split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PipelineError::ValidationError(
                "cannot fit a tree on zero samples".to_string(),
            ));
        }

        self.n_features = n_features;
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut importances = vec![0.0; n_features];

        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut importances, &mut rng));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<i64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let counts = class_counts(y, indices);
        let proba = counts[1] as f64 / n_samples as f64;

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.is_some_and(|d| depth >= d)
            || counts[0] == 0
            || counts[1] == 0;

        if should_stop {
            return TreeNode::Leaf { proba, n_samples };
        }

        let Some(best) = self.find_best_split(x, y, indices, counts, rng) else {
            return TreeNode::Leaf { proba, n_samples };
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);

        importances[best.feature_idx] += best.gain * n_samples as f64;

        let left = self.build_tree(x, y, &left_indices, depth + 1, importances, rng);
        let right = self.build_tree(x, y, &right_indices, depth + 1, importances, rng);

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left: Box::new(left),
            right: Box::new(right),
            n_samples,
            impurity: self.impurity(counts),
        }
    }

    /// Sort each candidate column once and sweep the boundaries between
    /// distinct values, updating child counts incrementally.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<i64>,
        indices: &[usize],
        parent: [usize; 2],
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        let n_samples = indices.len();
        let n_total = n_samples as f64;
        let parent_impurity = self.impurity(parent);

        let features: Vec<usize> = match self.max_features {
            Some(m) if m < self.n_features => {
                let mut drawn = sample(rng, self.n_features, m).into_vec();
                drawn.sort_unstable();
                drawn
            }
            _ => (0..self.n_features).collect(),
        };

        let min_leaf = self.min_samples_leaf.max(1);
        let mut best: Option<SplitCandidate> = None;
        let mut column: Vec<(f64, usize)> = Vec::with_capacity(n_samples);

        for feature_idx in features {
            column.clear();
            column.extend(indices.iter().map(|&i| (x[[i, feature_idx]], label_slot(y[i]))));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = [0usize; 2];
            for pos in 0..n_samples - 1 {
                left[column[pos].1] += 1;
                let (lo, hi) = (column[pos].0, column[pos + 1].0);
                if lo >= hi {
                    continue;
                }
                let n_left = pos + 1;
                let n_right = n_samples - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let right = [parent[0] - left[0], parent[1] - left[1]];
                let weighted = (n_left as f64 / n_total) * self.impurity(left)
                    + (n_right as f64 / n_total) * self.impurity(right);
                let gain = parent_impurity - weighted;

                if best.map_or(true, |b| gain > b.gain) {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some(SplitCandidate { feature_idx, threshold, gain });
                }
            }
        }

        best.filter(|b| b.gain > 0.0)
    }

    fn impurity(&self, counts: [usize; 2]) -> f64 {
        let n = (counts[0] + counts[1]) as f64;
        if n == 0.0 {
            return 0.0;
        }
        let p = [counts[0] as f64 / n, counts[1] as f64 / n];
        match self.criterion {
            Criterion::Gini => 1.0 - p[0] * p[0] - p[1] * p[1],
            Criterion::Entropy => p
                .iter()
                .filter(|&&pi| pi > 0.0)
                .map(|&pi| -pi * pi.ln())
                .sum(),
        }
    }

    /// Positive-class probability for every row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        self.check_width(x.ncols())?;
        Ok(x.rows().into_iter().map(|row| Self::walk(root, row)).collect())
    }

    /// Positive-class probability for one encoded row
    pub fn predict_proba_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        let root = self.root.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        self.check_width(row.len())?;
        Ok(Self::walk(root, row))
    }

    fn walk(node: &TreeNode, sample: ArrayView1<f64>) -> f64 {
        match node {
            TreeNode::Leaf { proba, .. } => *proba,
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                if sample[*feature_idx] <= *threshold {
                    Self::walk(left, sample)
                } else {
                    Self::walk(right, sample)
                }
            }
        }
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.n_features {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", width),
            });
        }
        Ok(())
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Get tree depth
    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }

    /// Get number of leaves
    pub fn n_leaves(&self) -> usize {
        fn count_leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => count_leaves(left) + count_leaves(right),
            }
        }
        self.root.as_ref().map_or(0, count_leaves)
    }
}

fn label_slot(label: i64) -> usize {
    usize::from(label != 0)
}

fn class_counts(y: &Array1<i64>, indices: &[usize]) -> [usize; 2] {
    let mut counts = [0usize; 2];
    for &i in indices {
        counts[label_slot(y[i])] += 1;
    }
    counts
}
