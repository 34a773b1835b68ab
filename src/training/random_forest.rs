//! Random Forest implementation

use super::config::ForestConfig;
use super::decision_tree::DecisionTree;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Random forest of binary probability trees.
///
/// The forest probability for a row is the mean of the leaf probabilities
/// it reaches across all trees. Tree `i` is grown from its own generator
/// seeded with `random_state + i`, so the fitted forest does not depend on
/// how rayon schedules the work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Hyperparameters
    config: ForestConfig,
    /// Random state
    pub random_state: u64,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Number of features
    n_features: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(ForestConfig::default())
    }
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            trees: Vec::new(),
            config,
            random_state: 42,
            feature_importances: None,
            n_features: 0,
        }
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Fit the forest to training data
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
                "cannot fit a forest on zero samples".to_string(),
            ));
        }
        if self.config.n_estimators == 0 {
            return Err(PipelineError::ConfigError("n_estimators must be at least 1".to_string()));
        }

        let max_features = self.config.max_features.resolve(n_features);
        let base_seed = self.random_state;
        let config = &self.config;

        let trees: Vec<DecisionTree> = (0..config.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<DecisionTree> {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let mut tree = DecisionTree::from_config(config).with_max_features(max_features);

                if config.bootstrap {
                    let sample_indices: Vec<usize> =
                        (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                    let x_boot = x.select(Axis(0), &sample_indices);
                    let y_boot: Array1<i64> = sample_indices.iter().map(|&i| y[i]).collect();
                    tree = tree.with_random_state(rng.next_u64());
                    tree.fit(&x_boot, &y_boot)?;
                } else {
                    tree = tree.with_random_state(rng.next_u64());
                    tree.fit(x, y)?;
                }

                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.n_features = n_features;
        self.compute_feature_importances();

        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        let mut total_importances = vec![0.0; self.n_features];

        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (total, &val) in total_importances.iter_mut().zip(imp.iter()) {
                    *total += val;
                }
            }
        }

        // Normalize
        let total: f64 = total_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut total_importances {
                *imp /= total;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total_importances));
    }

    /// Positive-class probability for every row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }

        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<Vec<_>>>()?;

        // summed in tree order so the result is independent of thread count
        let mut sum: Array1<f64> = Array1::zeros(x.nrows());
        for proba in &per_tree {
            sum += proba;
        }
        Ok(sum / self.trees.len() as f64)
    }

    /// Positive-class probability for one encoded row
    pub fn predict_proba_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        let mut sum = 0.0;
        for tree in &self.trees {
            sum += tree.predict_proba_row(row)?;
        }
        Ok(sum / self.trees.len() as f64)
    }

    /// Hard labels: 1 where the probability reaches `threshold`
    pub fn predict(&self, x: &Array2<f64>, threshold: f64) -> Result<Array1<i64>> {
        Ok(self
            .predict_proba(x)?
            .mapv(|p| i64::from(p >= threshold)))
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Encoded width the forest was fitted on
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Array1<i64>) {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.1],
            [0.2, 0.2],
            [1.0, 1.0],
            [1.1, 1.1],
            [1.2, 1.2],
        ];
        (x, array![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn test_classifier() {
        let (x, y) = separable();

        let mut rf = RandomForest::new(ForestConfig::new().with_n_estimators(10)).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x, 0.5).unwrap();
        let accuracy = predictions
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| p == a)
            .count() as f64
            / y.len() as f64;

        assert!(accuracy >= 0.8, "Accuracy too low: {}", accuracy);
    }

    #[test]
    fn test_probabilities_in_unit_interval() {
        let (x, y) = separable();
        let mut rf = RandomForest::new(ForestConfig::new().with_n_estimators(15));
        rf.fit(&x, &y).unwrap();

        let proba = rf.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), 6);
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(proba[0] < proba[5]);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = separable();
        let config = ForestConfig::new().with_n_estimators(20);

        let mut a = RandomForest::new(config.clone()).with_random_state(9);
        let mut b = RandomForest::new(config).with_random_state(9);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        let probe = array![[0.5, 0.5], [0.15, 1.05]];
        assert_eq!(a.predict_proba(&probe).unwrap(), b.predict_proba(&probe).unwrap());
        assert_eq!(a.feature_importances(), b.feature_importances());
    }

    #[test]
    fn test_row_and_batch_agree() {
        let (x, y) = separable();
        let mut rf = RandomForest::new(ForestConfig::new().with_n_estimators(8));
        rf.fit(&x, &y).unwrap();

        let batch = rf.predict_proba(&x).unwrap();
        for (i, row) in x.rows().into_iter().enumerate() {
            assert!((rf.predict_proba_row(row).unwrap() - batch[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0, 0, 1, 1];

        let mut rf = RandomForest::new(ForestConfig::new().with_n_estimators(10)).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let importances = rf.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert!(importances[0] >= importances[1]);
    }

    #[test]
    fn test_unfitted_forest() {
        let rf = RandomForest::default();
        assert!(matches!(rf.predict_proba(&array![[0.0]]), Err(PipelineError::ModelNotFitted)));
    }
}
