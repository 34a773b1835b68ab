//! Survey data model
//!
//! - [`RawProfile`]: one respondent or one inference request, field name -> raw value
//! - [`SurveyDataset`]: labelled profiles prepared for training
//! - [`loader`]: CSV ingestion and column normalization
//! - [`options`]: known answer lists used by the prediction form

mod dataset;
pub mod loader;
pub mod options;

pub use dataset::{SurveyDataset, TREATMENT_NEGATIVE, TREATMENT_POSITIVE};
pub use loader::SurveyLoader;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Cell contents read as "no answer", matching the usual CSV export conventions
pub const MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Whether a text cell is one of the [`MISSING_MARKERS`] (surrounding whitespace ignored)
pub fn is_missing_marker(cell: &str) -> bool {
    MISSING_MARKERS.contains(&cell.trim())
}

/// A raw field value as it arrives from the data source or a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    /// Present in the record but without a value (null / NaN / empty cell)
    Missing,
}

impl RawValue {
    pub fn text(value: impl Into<String>) -> Self {
        RawValue::Text(value.into())
    }

    pub fn is_missing(&self) -> bool {
        match self {
            RawValue::Missing => true,
            RawValue::Number(v) => v.is_nan(),
            RawValue::Text(_) => false,
        }
    }

    /// Numeric reading of the value; text is parsed after trimming
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(v) if !v.is_nan() => Some(*v),
            RawValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Category reading of the value; numbers use their display form
    pub fn as_category(&self) -> Option<Cow<'_, str>> {
        match self {
            RawValue::Text(s) => Some(Cow::Borrowed(s.as_str())),
            RawValue::Number(v) if !v.is_nan() => Some(Cow::Owned(v.to_string())),
            _ => None,
        }
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RawValue::Missing)
    }
}

/// Field name -> raw value mapping for one respondent or request.
///
/// Profiles are built once and then only read; transformations such as
/// imputation produce a new profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawProfile {
    fields: BTreeMap<String, RawValue>,
}

impl RawProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set a field to any raw value
    pub fn with(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Builder: set a numeric field
    pub fn with_number(self, name: impl Into<String>, value: f64) -> Self {
        self.with(name, RawValue::Number(value))
    }

    /// Builder: set a categorical field
    pub fn with_text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(name, RawValue::Text(value.into()))
    }

    /// Builder: declare a field present but without a value
    pub fn with_missing(self, name: impl Into<String>) -> Self {
        self.with(name, RawValue::Missing)
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Names from `required` that this profile does not carry at all
    pub fn missing_fields<'a, I>(&self, required: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        required
            .into_iter()
            .filter(|name| !self.contains(name))
            .map(str::to_string)
            .collect()
    }
}

impl<K: Into<String>, V: Into<RawValue>> FromIterator<(K, V)> for RawProfile {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_value_readings() {
        assert_eq!(RawValue::Number(31.0).as_number(), Some(31.0));
        assert_eq!(RawValue::text(" 27 ").as_number(), Some(27.0));
        assert_eq!(RawValue::text("Yes").as_number(), None);
        assert_eq!(RawValue::Number(3.0).as_category().as_deref(), Some("3"));
        assert!(RawValue::Number(f64::NAN).is_missing());
        assert!(RawValue::Missing.as_category().is_none());
    }

    #[test]
    fn test_missing_markers() {
        assert!(is_missing_marker("NA"));
        assert!(is_missing_marker(" NA "));
        assert!(is_missing_marker(""));
        assert!(is_missing_marker("null"));
        assert!(!is_missing_marker("Never"));
        assert!(!is_missing_marker("Não sabe"));
    }

    #[test]
    fn test_profile_json_shape() {
        let json = r#"{"age": 30, "leave": "Very easy", "work_interfere": null}"#;
        let profile: RawProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.get("age"), Some(&RawValue::Number(30.0)));
        assert_eq!(profile.get("leave"), Some(&RawValue::text("Very easy")));
        assert_eq!(profile.get("work_interfere"), Some(&RawValue::Missing));
    }

    #[test]
    fn test_missing_fields() {
        let profile = RawProfile::new()
            .with_number("age", 40.0)
            .with_missing("benefits");
        let missing = profile.missing_fields(["age", "benefits", "leave"]);
        assert_eq!(missing, vec!["leave".to_string()]);
    }
}
