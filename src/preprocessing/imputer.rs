//! Missing value imputation

use super::schema::FieldSpec;
use crate::data::{RawProfile, RawValue};
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Strategy for imputing missing numeric values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Replace with mean
    Mean,
    /// Replace with median
    Median,
    /// Replace with most frequent value
    MostFrequent,
}

/// Fitted replacement for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeValue {
    Numeric(f64),
    Text(String),
}

impl From<&ImputeValue> for RawValue {
    fn from(value: &ImputeValue) -> Self {
        match value {
            ImputeValue::Numeric(v) => RawValue::Number(*v),
            ImputeValue::Text(s) => RawValue::Text(s.clone()),
        }
    }
}

/// Per-field imputer.
///
/// Numeric fields use `numeric_strategy` (median by default); categorical
/// fields always use the most frequent value, ties going to the
/// lexicographically smallest category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Imputer {
    numeric_strategy: ImputeStrategy,
    fill_values: BTreeMap<String, ImputeValue>,
    is_fitted: bool,
}

impl Default for Imputer {
    fn default() -> Self {
        Self::new(ImputeStrategy::Median)
    }
}

impl Imputer {
    /// Create a new imputer with the specified numeric strategy
    pub fn new(numeric_strategy: ImputeStrategy) -> Self {
        Self {
            numeric_strategy,
            fill_values: BTreeMap::new(),
            is_fitted: false,
        }
    }

    /// Fit replacement values from training rows only
    pub fn fit(&mut self, spec: &FieldSpec, rows: &[RawProfile]) -> Result<&mut Self> {
        let mut fill_values = BTreeMap::new();

        for name in &spec.numeric {
            let values: Vec<f64> = rows
                .iter()
                .filter_map(|row| row.get(name))
                .filter_map(RawValue::as_number)
                .collect();
            let fill = Self::compute_numeric(self.numeric_strategy, &values).ok_or_else(|| {
                PipelineError::ValidationError(format!("numeric field '{}' has no observed values", name))
            })?;
            fill_values.insert(name.clone(), ImputeValue::Numeric(fill));
        }

        for name in &spec.categorical {
            let values = rows
                .iter()
                .filter_map(|row| row.get(name))
                .filter_map(|v| v.as_category().map(|c| c.into_owned()));
            let fill = Self::most_frequent(values).ok_or_else(|| {
                PipelineError::ValidationError(format!("categorical field '{}' has no observed values", name))
            })?;
            fill_values.insert(name.clone(), ImputeValue::Text(fill));
        }

        debug!(n_fields = fill_values.len(), "Imputer fitted");
        self.fill_values = fill_values;
        self.is_fitted = true;
        Ok(self)
    }

    /// Return a copy of `profile` with missing values replaced.
    ///
    /// Fields absent from the profile stay absent; rejecting those is the
    /// caller's job.
    pub fn apply(&self, profile: &RawProfile) -> Result<RawProfile> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let mut out = profile.clone();
        for (name, fill) in &self.fill_values {
            if profile.get(name).is_some_and(RawValue::is_missing) {
                out = out.with(name.clone(), RawValue::from(fill));
            }
        }
        Ok(out)
    }

    pub fn apply_batch(&self, rows: &[RawProfile]) -> Result<Vec<RawProfile>> {
        rows.iter().map(|row| self.apply(row)).collect()
    }

    pub fn fill_value(&self, field: &str) -> Option<&ImputeValue> {
        self.fill_values.get(field)
    }

    pub fn fill_values(&self) -> &BTreeMap<String, ImputeValue> {
        &self.fill_values
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn compute_numeric(strategy: ImputeStrategy, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        match strategy {
            ImputeStrategy::Mean => Some(values.iter().sum::<f64>() / values.len() as f64),
            ImputeStrategy::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    Some((sorted[mid - 1] + sorted[mid]) / 2.0)
                } else {
                    Some(sorted[mid])
                }
            }
            ImputeStrategy::MostFrequent => Self::numeric_mode(values),
        }
    }

    /// Most frequent number; ties resolve to the numerically smallest value
    fn numeric_mode(values: &[f64]) -> Option<f64> {
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mut best: Option<(f64, usize)> = None;
        for run in sorted.chunk_by(|a, b| a.total_cmp(b).is_eq()) {
            if best.map_or(true, |(_, count)| run.len() > count) {
                best = Some((run[0], run.len()));
            }
        }
        best.map(|(value, _)| value)
    }

    /// Most frequent item; ties resolve to the smallest item
    fn most_frequent<T: Ord, I: IntoIterator<Item = T>>(values: I) -> Option<T> {
        let mut counts: BTreeMap<T, usize> = BTreeMap::new();
        for value in values {
            *counts.entry(value).or_insert(0) += 1;
        }

        let mut best: Option<(T, usize)> = None;
        for (value, count) in counts {
            if best.as_ref().map_or(true, |(_, c)| count > *c) {
                best = Some((value, count));
            }
        }
        best.map(|(value, _)| value)
    }
}
