//! Single-profile and batch prediction over a trained artifact

use crate::data::RawProfile;
use crate::error::{PipelineError, Result};
use crate::pipeline::TrainedArtifact;
use crate::preprocessing::Encoder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Disclaimer attached to every prediction
pub const NON_DIAGNOSIS_NOTE: &str = "statistical estimate, not a diagnosis";

/// Outcome for one profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Estimated probability of having sought treatment
    pub probability: f64,
    /// `true` when `probability` reaches the artifact's threshold
    pub label: bool,
    /// The profile as submitted, before imputation
    pub profile: RawProfile,
    pub note: String,
}

impl PredictionResult {
    pub fn is_positive(&self) -> bool {
        self.label
    }

    /// Advice wording shown next to the probability
    pub fn recommendation(&self) -> String {
        let pct = self.probability * 100.0;
        if self.is_positive() {
            format!(
                "The profile is consistent ({:.1}%) with people who sought help. \
                 Considering support from a mental health professional may be a positive step.",
                pct
            )
        } else {
            format!(
                "Although the profile does not match ({:.1}%) the most common patterns of \
                 people who seek help, mental health is an individual journey. \
                 Seeking support is always worthwhile if you feel the need.",
                pct
            )
        }
    }
}

/// Request counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionStats {
    pub total_predictions: u64,
    pub rejected: u64,
}

/// Serves predictions from one immutable artifact.
///
/// Cloning is cheap and every clone shares the same artifact.
#[derive(Debug, Clone)]
pub struct PredictionService {
    artifact: Arc<TrainedArtifact>,
    predictions: Arc<AtomicU64>,
    rejected: Arc<AtomicU64>,
}

impl PredictionService {
    pub fn new(artifact: Arc<TrainedArtifact>) -> Self {
        Self {
            artifact,
            predictions: Arc::new(AtomicU64::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn artifact(&self) -> &Arc<TrainedArtifact> {
        &self.artifact
    }

    /// Impute, encode and score one raw profile.
    ///
    /// Every schema field name must be present (a missing *value* is fine);
    /// otherwise the request fails with [`PipelineError::SchemaMismatch`].
    pub fn predict(&self, raw: &RawProfile) -> Result<PredictionResult> {
        let result = self.predict_inner(raw);
        match &result {
            Ok(_) => self.predictions.fetch_add(1, Ordering::Relaxed),
            Err(e) => {
                warn!(error = %e, "Prediction rejected");
                self.rejected.fetch_add(1, Ordering::Relaxed)
            }
        };
        result
    }

    fn predict_inner(&self, raw: &RawProfile) -> Result<PredictionResult> {
        let schema = self.artifact.schema();
        let missing = raw.missing_fields(schema.field_names());
        if !missing.is_empty() {
            return Err(PipelineError::SchemaMismatch { missing });
        }

        let imputed = self.artifact.imputer().apply(raw)?;
        let encoder = Encoder::new(schema);

        let unseen = encoder.unseen_categories(&imputed);
        if !unseen.is_empty() {
            debug!(?unseen, "Unseen categories encode to zero indicators");
        }

        let x = encoder.encode(&imputed)?;
        let probability = self.artifact.model().predict_proba_row(x.view())?;
        let label = probability >= self.artifact.threshold();

        Ok(PredictionResult {
            probability,
            label,
            profile: raw.clone(),
            note: NON_DIAGNOSIS_NOTE.to_string(),
        })
    }

    /// Score each profile independently; fails on the first rejected profile
    pub fn predict_batch(&self, raws: &[RawProfile]) -> Result<Vec<PredictionResult>> {
        raws.par_iter().map(|raw| self.predict(raw)).collect()
    }

    /// `(field, value)` pairs the fitted vocabulary does not contain
    pub fn unseen_fields(&self, raw: &RawProfile) -> Vec<(String, String)> {
        let unseen = Encoder::new(self.artifact.schema()).unseen_categories(raw);
        if !unseen.is_empty() {
            debug!(?unseen, "Profile carries unseen categories");
        }
        unseen
    }

    pub fn stats(&self) -> PredictionStats {
        PredictionStats {
            total_predictions: self.predictions.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::data::SurveyDataset;
    use crate::pipeline::TreatmentPipeline;
    use crate::preprocessing::FieldSpec;
    use crate::training::ForestConfig;

    fn service() -> PredictionService {
        let profiles: Vec<RawProfile> = (0..30)
            .map(|i| {
                RawProfile::new()
                    .with_number("age", 20.0 + i as f64)
                    .with_text("work_interfere", if i % 2 == 0 { "Often" } else { "Never" })
            })
            .collect();
        let labels = (0..30).map(|i| i64::from(i % 2 == 0)).collect();
        let dataset = SurveyDataset::new(profiles, labels).unwrap();
        let config = PipelineConfig::new()
            .with_fields(FieldSpec::new(["age"], ["work_interfere"]))
            .with_forest(ForestConfig::new().with_n_estimators(10));
        let artifact = TreatmentPipeline::new(config).unwrap().train(&dataset).unwrap();
        PredictionService::new(Arc::new(artifact))
    }

    #[test]
    fn test_predict_known_profile() {
        let service = service();
        let profile = RawProfile::new().with_number("age", 30.0).with_text("work_interfere", "Often");
        let result = service.predict(&profile).unwrap();

        assert!(result.probability > 0.5);
        assert!(result.label);
        assert_eq!(result.profile, profile);
        assert_eq!(result.note, NON_DIAGNOSIS_NOTE);
        assert!(result.recommendation().contains("consistent"));
    }

    #[test]
    fn test_response_json_shape() {
        let service = service();
        let profile = RawProfile::new().with_number("age", 30.0).with_text("work_interfere", "Never");
        let result = service.predict(&profile).unwrap();
        let json = serde_json::to_value(&result).unwrap();

        assert!(json["label"].is_boolean());
        assert_eq!(json["label"], serde_json::Value::Bool(result.probability >= 0.5));
        assert!(json["probability"].is_f64());
        assert_eq!(json["note"], NON_DIAGNOSIS_NOTE);
    }

    #[test]
    fn test_missing_field_name_rejected() {
        let service = service();
        let err = service
            .predict(&RawProfile::new().with_text("work_interfere", "Often"))
            .unwrap_err();
        match err {
            PipelineError::SchemaMismatch { missing } => assert_eq!(missing, vec!["age".to_string()]),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(service.stats().rejected, 1);
    }

    #[test]
    fn test_missing_value_is_imputed() {
        let service = service();
        let profile = RawProfile::new().with_missing("age").with_text("work_interfere", "Never");
        let result = service.predict(&profile).unwrap();
        assert!((0.0..=1.0).contains(&result.probability));
    }

    #[test]
    fn test_unseen_fields() {
        let service = service();
        let profile = RawProfile::new().with_number("age", 30.0).with_text("work_interfere", "Unicorn");
        assert_eq!(
            service.unseen_fields(&profile),
            vec![("work_interfere".to_string(), "Unicorn".to_string())]
        );
        assert!(service.predict(&profile).is_ok());
    }

    #[test]
    fn test_non_numeric_age_is_invalid_input() {
        let service = service();
        let profile = RawProfile::new().with_text("age", "thirty").with_text("work_interfere", "Often");
        assert!(matches!(service.predict(&profile), Err(PipelineError::InvalidInput(_))));
    }
}
