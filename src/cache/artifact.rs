//! Trained artifact cache

use super::once::{CacheStats, OnceCache};
use crate::config::PipelineConfig;
use crate::data::SurveyDataset;
use crate::error::Result;
use crate::pipeline::{TrainedArtifact, TreatmentPipeline};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;
use xxhash_rust::xxh3::xxh3_64;

/// Identity of one training run: dataset content plus configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub dataset: u64,
    pub params: u64,
}

impl ArtifactKey {
    pub fn new(dataset: &SurveyDataset, config: &PipelineConfig) -> Result<Self> {
        let params = serde_json::to_vec(config)?;
        Ok(Self {
            dataset: dataset.fingerprint(),
            params: xxh3_64(&params),
        })
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}:{:016x}", self.dataset, self.params)
    }
}

/// Process-wide store of trained artifacts.
///
/// Each (dataset, configuration) pair is trained at most once; concurrent
/// first requests wait for the single in-flight training. A failed training
/// publishes nothing. Training times are kept beside the artifacts, which
/// themselves carry no wall-clock data.
#[derive(Default)]
pub struct ArtifactCache {
    inner: OnceCache<ArtifactKey, TrainedArtifact>,
    trained_at: Mutex<HashMap<ArtifactKey, DateTime<Utc>>>,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached artifact for this dataset and configuration, training it on first use
    pub fn get_or_train(
        &self,
        dataset: &SurveyDataset,
        config: &PipelineConfig,
    ) -> Result<Arc<TrainedArtifact>> {
        let key = ArtifactKey::new(dataset, config)?;
        self.inner.get_or_try_init(&key, || {
            info!(%key, rows = dataset.len(), "Training artifact");
            let artifact = TreatmentPipeline::new(config.clone())?.train(dataset)?;
            self.trained_at.lock().insert(key, Utc::now());
            Ok(artifact)
        })
    }

    /// Train a fresh artifact and swap it in; on failure the old artifact stays
    pub fn retrain(
        &self,
        dataset: &SurveyDataset,
        config: &PipelineConfig,
    ) -> Result<Arc<TrainedArtifact>> {
        let key = ArtifactKey::new(dataset, config)?;
        self.inner.replace_with(&key, || {
            info!(%key, rows = dataset.len(), "Retraining artifact");
            let artifact = TreatmentPipeline::new(config.clone())?.train(dataset)?;
            self.trained_at.lock().insert(key, Utc::now());
            Ok(artifact)
        })
    }

    pub fn get(&self, key: &ArtifactKey) -> Option<Arc<TrainedArtifact>> {
        self.inner.get(key)
    }

    /// When the artifact published under `key` finished training
    pub fn trained_at(&self, key: &ArtifactKey) -> Option<DateTime<Utc>> {
        self.trained_at.lock().get(key).copied()
    }

    /// Drop a published artifact; readers holding it keep their `Arc`
    pub fn invalidate(&self, key: &ArtifactKey) -> bool {
        let removed = self.inner.invalidate(key).is_some();
        if removed {
            self.trained_at.lock().remove(key);
            info!(%key, "Artifact invalidated");
        }
        removed
    }

    pub fn clear(&self) {
        self.inner.clear();
        self.trained_at.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RawProfile;
    use crate::preprocessing::FieldSpec;

    fn tiny_dataset(shift: f64) -> SurveyDataset {
        let profiles = (0..10)
            .map(|i| {
                RawProfile::new()
                    .with_number("age", 20.0 + i as f64 + shift)
                    .with_text("benefits", if i % 2 == 0 { "Yes" } else { "No" })
            })
            .collect();
        SurveyDataset::new(profiles, vec![1, 1, 1, 1, 1, 0, 0, 0, 0, 0]).unwrap()
    }

    #[test]
    fn test_key_tracks_data_and_params() {
        let config = PipelineConfig::default().with_fields(FieldSpec::new(["age"], ["benefits"]));
        let a = ArtifactKey::new(&tiny_dataset(0.0), &config).unwrap();
        let b = ArtifactKey::new(&tiny_dataset(0.0), &config).unwrap();
        let c = ArtifactKey::new(&tiny_dataset(1.0), &config).unwrap();
        let d = ArtifactKey::new(&tiny_dataset(0.0), &config.clone().with_seed(7)).unwrap();

        assert_eq!(a, b);
        assert_ne!(a.dataset, c.dataset);
        assert_eq!(a.params, c.params);
        assert_ne!(a.params, d.params);
    }

    #[test]
    fn test_training_time_kept_beside_artifact() {
        let cache = ArtifactCache::new();
        let dataset = tiny_dataset(0.0);
        let config = PipelineConfig::default()
            .with_fields(FieldSpec::new(["age"], ["benefits"]))
            .with_forest(crate::training::ForestConfig::new().with_n_estimators(5));
        let key = ArtifactKey::new(&dataset, &config).unwrap();

        let before = Utc::now();
        let first = cache.get_or_train(&dataset, &config).unwrap();
        let stamped = cache.trained_at(&key).unwrap();
        assert!(stamped >= before);

        let rebuilt = TreatmentPipeline::new(config.clone()).unwrap().train(&dataset).unwrap();
        assert_eq!(*first, rebuilt);

        assert!(cache.invalidate(&key));
        assert!(cache.trained_at(&key).is_none());
    }

    #[test]
    fn test_key_display() {
        let key = ArtifactKey { dataset: 1, params: 255 };
        assert_eq!(key.to_string(), "0000000000000001:00000000000000ff");
    }
}
