//! Pipeline configuration

use crate::error::{PipelineError, Result};
use crate::preprocessing::{FieldKind, FieldSpec};
use crate::training::ForestConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Inclusive range filter applied to a numeric field at ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeFilter {
    pub field: String,
    pub min: f64,
    pub max: f64,
}

impl RangeFilter {
    pub fn new(field: impl Into<String>, min: f64, max: f64) -> Self {
        Self { field: field.into(), min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Default for RangeFilter {
    fn default() -> Self {
        Self::new("age", 15.0, 80.0)
    }
}

/// Configuration for one training run.
///
/// Every field participates in the artifact cache key, so two runs with
/// different settings never share a trained artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Feature fields and their kinds
    pub fields: FieldSpec,

    /// Name of the label field in the source rows
    pub label_field: String,

    /// Rows whose value falls outside this range are dropped before training
    pub age_filter: Option<RangeFilter>,

    /// Categorical field -> answer recorded when the respondent left it blank.
    /// Applied at ingestion, before the split, so the blank becomes its own category.
    pub answer_defaults: BTreeMap<String, String>,

    /// Fraction of rows held out for evaluation
    pub test_fraction: f64,

    /// Seed shared by the split, the balancer and the forest
    pub seed: u64,

    /// Neighbour count for synthetic minority oversampling
    pub k_neighbors: usize,

    /// Random forest hyperparameters
    pub forest: ForestConfig,

    /// Probability at or above which a profile is labelled positive
    pub decision_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fields: FieldSpec::default(),
            label_field: "treatment".to_string(),
            age_filter: Some(RangeFilter::default()),
            answer_defaults: BTreeMap::from([("work_interfere".to_string(), "Não sabe".to_string())]),
            test_fraction: 0.2,
            seed: 42,
            k_neighbors: 5,
            forest: ForestConfig::default(),
            decision_threshold: 0.5,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the feature fields
    pub fn with_fields(mut self, fields: FieldSpec) -> Self {
        self.fields = fields;
        self
    }

    /// Builder method to set the label field
    pub fn with_label_field(mut self, name: impl Into<String>) -> Self {
        self.label_field = name.into();
        self
    }

    /// Builder method to set or clear the ingestion range filter
    pub fn with_age_filter(mut self, filter: Option<RangeFilter>) -> Self {
        self.age_filter = filter;
        self
    }

    /// Builder method to record `answer` for blank values of `field`
    pub fn with_answer_default(mut self, field: impl Into<String>, answer: impl Into<String>) -> Self {
        self.answer_defaults.insert(field.into(), answer.into());
        self
    }

    /// Builder method to drop every ingestion default, leaving blanks to the imputer
    pub fn without_answer_defaults(mut self) -> Self {
        self.answer_defaults.clear();
        self
    }

    /// Builder method to set the held-out fraction
    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    /// Builder method to set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder method to set the oversampling neighbour count
    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k;
        self
    }

    /// Builder method to set the forest hyperparameters
    pub fn with_forest(mut self, forest: ForestConfig) -> Self {
        self.forest = forest;
        self
    }

    /// Builder method to set the decision threshold
    pub fn with_decision_threshold(mut self, threshold: f64) -> Self {
        self.decision_threshold = threshold;
        self
    }

    /// Load a configuration from a JSON file; absent keys take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and field declarations
    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(PipelineError::ConfigError(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if !(0.0..=1.0).contains(&self.decision_threshold) {
            return Err(PipelineError::ConfigError(format!(
                "decision_threshold must be in [0, 1], got {}",
                self.decision_threshold
            )));
        }
        if self.k_neighbors == 0 {
            return Err(PipelineError::ConfigError("k_neighbors must be at least 1".to_string()));
        }
        if self.forest.n_estimators == 0 {
            return Err(PipelineError::ConfigError("forest.n_estimators must be at least 1".to_string()));
        }
        if self.fields.is_empty() {
            return Err(PipelineError::ConfigError("no feature fields declared".to_string()));
        }
        if self.fields.contains(&self.label_field) {
            return Err(PipelineError::ConfigError(format!(
                "label field '{}' is also declared as a feature",
                self.label_field
            )));
        }
        if let Some(dup) = self.fields.first_duplicate() {
            return Err(PipelineError::ConfigError(format!("field '{}' declared twice", dup)));
        }
        for field in self.answer_defaults.keys() {
            if self.fields.kind_of(field) == Some(FieldKind::Numeric) {
                return Err(PipelineError::ConfigError(format!(
                    "answer default declared for numeric field '{}'",
                    field
                )));
            }
        }
        if let Some(filter) = &self.age_filter {
            if filter.min > filter.max {
                return Err(PipelineError::ConfigError(format!(
                    "range filter on '{}' has min {} > max {}",
                    filter.field, filter.min, filter.max
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fields.len(), 8);
        assert_eq!(config.forest.n_estimators, 100);
    }

    #[test]
    fn test_invalid_test_fraction() {
        let config = PipelineConfig::new().with_test_fraction(1.0);
        assert!(matches!(config.validate(), Err(PipelineError::ConfigError(_))));
    }

    #[test]
    fn test_label_declared_as_feature() {
        let config = PipelineConfig::new().with_label_field("age");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_answer_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.answer_defaults.get("work_interfere").map(String::as_str), Some("Não sabe"));
        assert!(config.clone().without_answer_defaults().answer_defaults.is_empty());

        let numeric = config.with_answer_default("age", "30");
        assert!(matches!(numeric.validate(), Err(PipelineError::ConfigError(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"seed": 7, "k_neighbors": 3}"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.k_neighbors, 3);
        assert_eq!(config.label_field, "treatment");
        assert!((config.test_fraction - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, br#"{"decision_threshold": 0.6}"#).unwrap();
        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert!((config.decision_threshold - 0.6).abs() < 1e-12);
    }
}
