//! End-to-end training pipeline
//!
//! split -> impute (train statistics) -> fit schema -> encode -> balance
//! (train partition only) -> fit forest. The held-out partition goes through
//! the same imputer and schema but is never balanced.

use crate::config::PipelineConfig;
use crate::data::{RawProfile, SurveyDataset};
use crate::error::{PipelineError, Result};
use crate::preprocessing::{Encoder, FeatureSchema, Imputer};
use crate::synthetic::{BalanceReport, SMOTE};
use crate::training::{ModelTrainer, RandomForest, StratifiedSplit};
use crate::utils::Timer;
use ndarray::{Array1, Array2};
use tracing::info;

/// Encoded held-out partition kept for evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct HoldoutSet {
    pub x: Array2<f64>,
    pub y: Array1<i64>,
}

impl HoldoutSet {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// Everything needed to serve predictions and reproduce an evaluation.
///
/// Immutable once built; shared between readers behind `Arc`. Carries no
/// wall-clock data, so the same dataset and configuration always produce an
/// equal artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedArtifact {
    model: RandomForest,
    schema: FeatureSchema,
    imputer: Imputer,
    seed: u64,
    threshold: f64,
    holdout: HoldoutSet,
    balance: BalanceReport,
    n_train: usize,
}

impl TrainedArtifact {
    pub fn model(&self) -> &RandomForest {
        &self.model
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn imputer(&self) -> &Imputer {
        &self.imputer
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Probability at or above which a profile is labelled positive
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn holdout(&self) -> &HoldoutSet {
        &self.holdout
    }

    pub fn balance_report(&self) -> &BalanceReport {
        &self.balance
    }

    /// Training rows before oversampling
    pub fn n_train(&self) -> usize {
        self.n_train
    }

    /// `(column name, importance)` sorted by decreasing importance
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        let Some(importances) = self.model.feature_importances() else {
            return Vec::new();
        };
        let mut named: Vec<(String, f64)> = self
            .schema
            .column_names()
            .into_iter()
            .zip(importances.iter().copied())
            .collect();
        named.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        named
    }
}

/// Builds a [`TrainedArtifact`] from a prepared dataset
#[derive(Debug, Clone)]
pub struct TreatmentPipeline {
    config: PipelineConfig,
}

impl TreatmentPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn train(&self, dataset: &SurveyDataset) -> Result<TrainedArtifact> {
        let config = &self.config;
        let mut timer = Timer::start("pipeline_train");

        if dataset.is_empty() {
            return Err(PipelineError::ValidationError("dataset has no rows".to_string()));
        }

        let split = StratifiedSplit::new(config.test_fraction)
            .with_random_state(config.seed)
            .split(dataset.labels())?;
        let train = dataset.subset(&split.train_indices);
        let test = dataset.subset(&split.test_indices);
        info!(
            train_rows = train.len(),
            test_rows = test.len(),
            train_classes = ?train.class_counts(),
            test_classes = ?test.class_counts(),
            "Stratified split"
        );
        timer.checkpoint("split");

        let mut imputer = Imputer::default();
        imputer.fit(&config.fields, train.profiles())?;
        let train_rows = imputer.apply_batch(train.profiles())?;
        let test_rows = imputer.apply_batch(test.profiles())?;

        let schema = FeatureSchema::fit(&config.fields, &train_rows)?;
        let encoder = Encoder::new(&schema);
        let x_train = encoder.encode_batch(&train_rows)?;
        let x_test = encoder.encode_batch(&test_rows)?;
        log_unseen(&encoder, &test_rows);
        timer.checkpoint("encode");

        let y_train = Array1::from_vec(train.labels().to_vec());
        let balanced = SMOTE::new()
            .with_k_neighbors(config.k_neighbors)
            .with_seed(config.seed)
            .resample(&x_train, &y_train)?;
        info!(
            minority_label = balanced.report.minority_label,
            minority_count = balanced.report.minority_count,
            majority_count = balanced.report.majority_count,
            n_synthetic = balanced.report.n_synthetic,
            skipped = balanced.report.skipped(),
            "Training partition balanced"
        );
        timer.checkpoint("balance");

        let model = ModelTrainer::new(config.forest.clone())
            .with_seed(config.seed)
            .fit(&balanced)?;
        timer.checkpoint("fit");
        timer.stop();

        Ok(TrainedArtifact {
            model,
            schema,
            imputer,
            seed: config.seed,
            threshold: config.decision_threshold,
            holdout: HoldoutSet {
                x: x_test,
                y: Array1::from_vec(test.labels().to_vec()),
            },
            balance: balanced.report,
            n_train: train.len(),
        })
    }
}

fn log_unseen(encoder: &Encoder<'_>, rows: &[RawProfile]) {
    let unseen: usize = rows.iter().map(|row| encoder.unseen_categories(row).len()).sum();
    if unseen > 0 {
        info!(unseen, "Held-out rows carry categories absent from training");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::FieldSpec;
    use crate::training::ForestConfig;

    fn dataset() -> SurveyDataset {
        let mut profiles = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let positive = i % 4 != 0;
            profiles.push(
                RawProfile::new()
                    .with_number("age", 25.0 + (i % 7) as f64)
                    .with_text("family_history", if positive { "Yes" } else { "No" })
                    .with_text("leave", if i % 3 == 0 { "Very easy" } else { "Don't know" }),
            );
            labels.push(i64::from(positive));
        }
        SurveyDataset::new(profiles, labels).unwrap()
    }

    fn config() -> PipelineConfig {
        PipelineConfig::new()
            .with_fields(FieldSpec::new(["age"], ["family_history", "leave"]))
            .with_forest(ForestConfig::new().with_n_estimators(10))
    }

    #[test]
    fn test_train_produces_consistent_artifact() {
        let artifact = TreatmentPipeline::new(config()).unwrap().train(&dataset()).unwrap();

        assert_eq!(artifact.holdout().len(), 8);
        assert_eq!(artifact.n_train(), 32);
        assert_eq!(artifact.model().n_features(), artifact.schema().width());
        assert_eq!(artifact.holdout().x.ncols(), artifact.schema().width());
        assert_eq!(artifact.balance_report().n_synthetic, 24 - 8);
    }

    #[test]
    fn test_feature_importances_are_named_and_sorted() {
        let artifact = TreatmentPipeline::new(config()).unwrap().train(&dataset()).unwrap();
        let importances = artifact.feature_importances();

        assert_eq!(importances.len(), artifact.schema().width());
        assert!(importances.windows(2).all(|w| w[0].1 >= w[1].1));
        assert!(importances[0].0.starts_with("family_history="));
    }

    #[test]
    fn test_identical_runs_build_equal_artifacts() {
        let pipeline = TreatmentPipeline::new(config()).unwrap();
        let a = pipeline.train(&dataset()).unwrap();
        let b = pipeline.train(&dataset()).unwrap();
        assert_eq!(a, b);

        let reseeded = TreatmentPipeline::new(config().with_seed(9)).unwrap().train(&dataset()).unwrap();
        assert_ne!(a, reseeded);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(TreatmentPipeline::new(config().with_test_fraction(0.0)).is_err());
    }
}
