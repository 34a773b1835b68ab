//! Model training module
//!
//! Stratified splitting and the random forest used as the treatment
//! classifier.

mod config;
mod split;
mod trainer;
pub mod decision_tree;
pub mod random_forest;

pub use config::{Criterion, ForestConfig, MaxFeatures};
pub use decision_tree::{DecisionTree, TreeNode};
pub use random_forest::RandomForest;
pub use split::{StratifiedSplit, TrainTestSplit};
pub use trainer::ModelTrainer;
