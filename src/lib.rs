//! Treatment classifier - estimates whether a survey respondent sought
//! mental health treatment
//!
//! This crate provides:
//! - Survey ingestion and schema-locked feature encoding
//! - Leakage-safe training: stratified split, train-only imputation and
//!   SMOTE balancing, random forest
//! - A compute-once artifact cache shared by concurrent callers
//! - Held-out evaluation and single/batch prediction
//!
//! # Modules
//!
//! - [`data`] - Raw profiles, survey loading, form answer lists
//! - [`preprocessing`] - Field spec, feature schema, encoder, imputer
//! - [`synthetic`] - SMOTE minority oversampling
//! - [`training`] - Stratified split, decision trees, random forest
//! - [`pipeline`] - End-to-end training into a [`pipeline::TrainedArtifact`]
//! - [`cache`] - Compute-once artifact cache
//! - [`evaluation`] - Held-out metrics
//! - [`inference`] - Prediction service
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Core ML modules
pub mod data;
pub mod preprocessing;
pub mod synthetic;
pub mod training;
pub mod pipeline;
pub mod evaluation;
pub mod inference;

// Infrastructure
pub mod cache;
pub mod utils;

// Services
pub mod cli;

pub use error::{PipelineError, PipelineWarning, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{PipelineError, PipelineWarning, Result};

    // Configuration
    pub use crate::config::{PipelineConfig, RangeFilter};

    // Data
    pub use crate::data::{RawProfile, RawValue, SurveyDataset, SurveyLoader};

    // Preprocessing
    pub use crate::preprocessing::{Encoder, FeatureSchema, FieldKind, FieldSpec, Imputer};

    // Balancing
    pub use crate::synthetic::{BalanceReport, BalancedTrainingSet, SMOTE};

    // Training
    pub use crate::training::{ForestConfig, ModelTrainer, RandomForest, StratifiedSplit};

    // Pipeline
    pub use crate::pipeline::{TrainedArtifact, TreatmentPipeline};

    // Caching
    pub use crate::cache::{ArtifactCache, ArtifactKey, CacheStats};

    // Evaluation
    pub use crate::evaluation::{ConfusionMatrix, EvaluationReport, Evaluator};

    // Inference
    pub use crate::inference::{PredictionResult, PredictionService};
}
