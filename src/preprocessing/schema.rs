//! Field declarations and the fitted feature schema

use crate::data::RawProfile;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

/// Kind of a feature field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Numeric,
    Categorical,
}

/// Declared feature fields, before any data has been seen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSpec {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
}

impl Default for FieldSpec {
    fn default() -> Self {
        Self::new(
            ["age"],
            [
                "gender_group",
                "family_history",
                "benefits",
                "care_options",
                "anonymity",
                "leave",
                "work_interfere",
            ],
        )
    }
}

impl FieldSpec {
    pub fn new<N, C>(numeric: N, categorical: C) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            numeric: numeric.into_iter().map(Into::into).collect(),
            categorical: categorical.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.numeric.len() + self.categorical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kind_of(name).is_some()
    }

    pub fn kind_of(&self, name: &str) -> Option<FieldKind> {
        if self.numeric.iter().any(|n| n == name) {
            Some(FieldKind::Numeric)
        } else if self.categorical.iter().any(|n| n == name) {
            Some(FieldKind::Categorical)
        } else {
            None
        }
    }

    /// All field names, numeric first
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.numeric.iter().chain(self.categorical.iter()).map(String::as_str)
    }

    pub(crate) fn first_duplicate(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.names().find(|name| !seen.insert(*name))
    }
}

/// A categorical field with its closed vocabulary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalField {
    pub name: String,
    /// Sorted, deduplicated accepted values
    pub vocabulary: Vec<String>,
    /// Index of this field's first indicator column
    pub offset: usize,
}

impl CategoricalField {
    /// Position of `value` within the vocabulary
    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.vocabulary.binary_search_by(|v| v.as_str().cmp(value)).ok()
    }
}

/// Column layout fixed at fit time.
///
/// Numeric fields come first in declaration order, then one indicator column
/// per (categorical field, category) pair. The layout never changes once
/// fitted; refitting builds a new schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    numeric: Vec<String>,
    categorical: Vec<CategoricalField>,
    width: usize,
}

impl FeatureSchema {
    /// Fit the vocabulary of every categorical field from training rows
    pub fn fit(spec: &FieldSpec, rows: &[RawProfile]) -> Result<Self> {
        if rows.is_empty() {
            return Err(PipelineError::ValidationError(
                "cannot fit a feature schema on zero rows".to_string(),
            ));
        }

        let mut offset = spec.numeric.len();
        let mut categorical = Vec::with_capacity(spec.categorical.len());

        for name in &spec.categorical {
            let vocabulary: BTreeSet<String> = rows
                .iter()
                .filter_map(|row| row.get(name))
                .filter_map(|value| value.as_category())
                .map(|value| value.into_owned())
                .collect();

            if vocabulary.is_empty() {
                warn!(field = %name, "Categorical field has no observed values, it will encode to zero columns");
            }

            let field = CategoricalField {
                name: name.clone(),
                vocabulary: vocabulary.into_iter().collect(),
                offset,
            };
            offset += field.vocabulary.len();
            categorical.push(field);
        }

        debug!(width = offset, n_categorical = categorical.len(), "Feature schema fitted");

        Ok(Self {
            numeric: spec.numeric.clone(),
            categorical,
            width: offset,
        })
    }

    /// Encoded vector length
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn numeric_fields(&self) -> &[String] {
        &self.numeric
    }

    pub fn categorical_fields(&self) -> &[CategoricalField] {
        &self.categorical
    }

    /// Every field name a request must carry
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.numeric
            .iter()
            .map(String::as_str)
            .chain(self.categorical.iter().map(|f| f.name.as_str()))
    }

    pub fn vocabulary(&self, field: &str) -> Option<&[String]> {
        self.categorical
            .iter()
            .find(|f| f.name == field)
            .map(|f| f.vocabulary.as_slice())
    }

    /// Column range occupied by a field
    pub fn columns_of(&self, field: &str) -> Option<std::ops::Range<usize>> {
        if let Some(idx) = self.numeric.iter().position(|n| n == field) {
            return Some(idx..idx + 1);
        }
        self.categorical
            .iter()
            .find(|f| f.name == field)
            .map(|f| f.offset..f.offset + f.vocabulary.len())
    }

    /// Human-readable column names, `field=value` for indicators
    pub fn column_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.width);
        names.extend(self.numeric.iter().cloned());
        for field in &self.categorical {
            names.extend(field.vocabulary.iter().map(|v| format!("{}={}", field.name, v)));
        }
        names
    }
}
