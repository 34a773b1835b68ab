//! Forest training on a balanced training set

use super::config::ForestConfig;
use super::random_forest::RandomForest;
use crate::error::Result;
use crate::synthetic::BalancedTrainingSet;
use crate::utils::Timer;
use tracing::info;

/// Fits a [`RandomForest`] with fixed hyperparameters and seed
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: ForestConfig,
    seed: u64,
}

impl ModelTrainer {
    pub fn new(config: ForestConfig) -> Self {
        Self { config, seed: 42 }
    }

    /// Set the base seed; tree `i` is grown with `seed + i`
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn fit(&self, data: &BalancedTrainingSet) -> Result<RandomForest> {
        let timer = Timer::start("forest_fit");
        let mut forest = RandomForest::new(self.config.clone()).with_random_state(self.seed);
        forest.fit(&data.x, &data.y)?;
        let elapsed = timer.stop();

        info!(
            n_trees = forest.n_trees(),
            n_rows = data.x.nrows(),
            n_features = data.x.ncols(),
            seed = self.seed,
            elapsed_ms = elapsed.as_millis() as u64,
            "Random forest trained"
        );
        Ok(forest)
    }
}
