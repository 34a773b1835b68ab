//! Prediction serving
//!
//! A [`PredictionService`] wraps one shared, immutable trained artifact and
//! routes every request through the artifact's own imputer, schema and
//! forest.

mod service;

pub use service::{PredictionResult, PredictionService, PredictionStats, NON_DIAGNOSIS_NOTE};
