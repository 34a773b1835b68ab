//! Data preprocessing module
//!
//! Turns raw survey profiles into fixed-width numeric vectors:
//! - [`FieldSpec`] declares which fields are numeric and which are categorical
//! - [`Imputer`] fills missing values from training statistics
//! - [`FeatureSchema`] fixes the one-hot column layout at fit time
//! - [`Encoder`] maps profiles onto that layout, singly or in batches

mod encoder;
mod imputer;
mod schema;

pub use encoder::Encoder;
pub use imputer::{ImputeStrategy, ImputeValue, Imputer};
pub use schema::{CategoricalField, FeatureSchema, FieldKind, FieldSpec};
