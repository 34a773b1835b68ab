//! Labelled survey dataset

use super::{is_missing_marker, RawProfile, RawValue};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::preprocessing::FieldKind;
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info};
use xxhash_rust::xxh3::Xxh3;

/// Label for respondents who sought treatment
pub const TREATMENT_POSITIVE: i64 = 1;
/// Label for respondents who did not
pub const TREATMENT_NEGATIVE: i64 = 0;

/// Feature profiles with their binary treatment labels.
///
/// Profiles hold only the declared feature fields; the label lives in
/// `labels` at the same index.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyDataset {
    profiles: Vec<RawProfile>,
    labels: Vec<i64>,
}

impl SurveyDataset {
    /// Build from already-separated profiles and 0/1 labels
    pub fn new(profiles: Vec<RawProfile>, labels: Vec<i64>) -> Result<Self> {
        if profiles.len() != labels.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} labels", profiles.len()),
                actual: format!("{} labels", labels.len()),
            });
        }
        if let Some(bad) = labels
            .iter()
            .find(|&&l| l != TREATMENT_POSITIVE && l != TREATMENT_NEGATIVE)
        {
            return Err(PipelineError::ValidationError(format!(
                "labels must be 0 or 1, found {}",
                bad
            )));
        }
        Ok(Self { profiles, labels })
    }

    /// Prepare source records that still carry the label field.
    ///
    /// Drops records whose label is missing or not a yes/no answer and
    /// records failing the configured range filter, then keeps only the
    /// declared feature fields. Blank categorical answers with a configured
    /// default take that default; other blanks are left to the imputer.
    pub fn prepare<I>(records: I, config: &PipelineConfig) -> Result<Self>
    where
        I: IntoIterator<Item = RawProfile>,
    {
        let mut profiles = Vec::new();
        let mut labels = Vec::new();
        let mut dropped_label = 0usize;
        let mut dropped_range = 0usize;
        let mut filled_defaults = 0usize;

        for record in records {
            let Some(label) = record.get(&config.label_field).and_then(parse_label) else {
                dropped_label += 1;
                continue;
            };

            if let Some(filter) = &config.age_filter {
                let in_range = record
                    .get(&filter.field)
                    .and_then(RawValue::as_number)
                    .is_some_and(|v| filter.contains(v));
                if !in_range {
                    dropped_range += 1;
                    continue;
                }
            }

            let profile: RawProfile = config
                .fields
                .names()
                .map(|name| {
                    let value = match record.get(name) {
                        Some(value) if !value.is_missing() => value.clone(),
                        _ => match config.answer_defaults.get(name) {
                            Some(answer) if config.fields.kind_of(name) == Some(FieldKind::Categorical) => {
                                filled_defaults += 1;
                                RawValue::text(answer.as_str())
                            }
                            _ => RawValue::Missing,
                        },
                    };
                    (name.to_string(), value)
                })
                .collect();

            profiles.push(profile);
            labels.push(label);
        }

        info!(
            kept = profiles.len(),
            dropped_label,
            dropped_range,
            filled_defaults,
            "Survey dataset prepared"
        );

        Self::new(profiles, labels)
    }

    /// Prepare from a data frame whose column names are already normalized
    pub fn from_frame(df: &DataFrame, config: &PipelineConfig) -> Result<Self> {
        let mut columns: Vec<(String, Vec<RawValue>)> = Vec::new();

        let mut wanted: Vec<(&str, FieldKind)> = config
            .fields
            .names()
            .filter_map(|name| config.fields.kind_of(name).map(|kind| (name, kind)))
            .collect();
        wanted.push((config.label_field.as_str(), FieldKind::Categorical));
        if let Some(filter) = &config.age_filter {
            if !config.fields.contains(&filter.field) {
                wanted.push((filter.field.as_str(), FieldKind::Numeric));
            }
        }

        for (name, kind) in wanted {
            let column = df
                .column(name)
                .map_err(|_| PipelineError::DataError(format!("column '{}' not found", name)))?;
            columns.push((name.to_string(), column_values(column.as_materialized_series(), kind)?));
        }

        debug!(rows = df.height(), columns = columns.len(), "Converting frame to survey records");

        let records = (0..df.height()).map(|row| {
            columns
                .iter()
                .map(|(name, values)| (name.clone(), values[row].clone()))
                .collect::<RawProfile>()
        });

        Self::prepare(records, config)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn profiles(&self) -> &[RawProfile] {
        &self.profiles
    }

    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    /// Label -> row count
    pub fn class_counts(&self) -> BTreeMap<i64, usize> {
        let mut counts = BTreeMap::new();
        for &label in &self.labels {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }

    /// Rows at `indices`, in that order
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            profiles: indices.iter().map(|&i| self.profiles[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Content hash over every profile and label, in row order
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = Xxh3::new();
        hasher.update(&(self.profiles.len() as u64).to_le_bytes());
        for (profile, label) in self.profiles.iter().zip(&self.labels) {
            for (name, value) in profile.iter() {
                hasher.update(name.as_bytes());
                hasher.update(&[0xff]);
                match value {
                    RawValue::Number(v) => {
                        hasher.update(&[1]);
                        hasher.update(&v.to_bits().to_le_bytes());
                    }
                    RawValue::Text(s) => {
                        hasher.update(&[2]);
                        hasher.update(s.as_bytes());
                        hasher.update(&[0xff]);
                    }
                    RawValue::Missing => hasher.update(&[3]),
                }
            }
            hasher.update(&label.to_le_bytes());
        }
        hasher.digest()
    }
}

/// Map a yes/no (or 1/0) answer onto a treatment label
fn parse_label(value: &RawValue) -> Option<i64> {
    if let Some(n) = value.as_number() {
        return match n {
            n if n == 1.0 => Some(TREATMENT_POSITIVE),
            n if n == 0.0 => Some(TREATMENT_NEGATIVE),
            _ => None,
        };
    }
    let text = value.as_category()?;
    let text = text.trim();
    if text.eq_ignore_ascii_case("yes") {
        Some(TREATMENT_POSITIVE)
    } else if text.eq_ignore_ascii_case("no") {
        Some(TREATMENT_NEGATIVE)
    } else {
        None
    }
}

fn column_values(series: &Series, kind: FieldKind) -> Result<Vec<RawValue>> {
    match kind {
        FieldKind::Numeric => {
            let cast = series.cast(&DataType::Float64)?;
            Ok(cast
                .f64()?
                .into_iter()
                .map(|v| v.map(RawValue::Number).unwrap_or(RawValue::Missing))
                .collect())
        }
        FieldKind::Categorical => {
            let cast = series.cast(&DataType::String)?;
            Ok(cast
                .str()?
                .into_iter()
                .map(|v| match v.map(str::trim) {
                    Some(s) if !is_missing_marker(s) => RawValue::text(s),
                    _ => RawValue::Missing,
                })
                .collect())
        }
    }
}
