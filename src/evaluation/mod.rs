//! Held-out evaluation
//!
//! Metrics are computed on the test partition exactly as it came out of the
//! split: imputed with training statistics, encoded with the training
//! schema, never oversampled.

use crate::error::{PipelineError, Result};
use crate::pipeline::TrainedArtifact;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Binary confusion counts, positive class = 1
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(y_true: &Array1<i64>, y_pred: &Array1<i64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }

        let mut cm = Self::default();
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t != 0, p != 0) {
                (true, true) => cm.tp += 1,
                (false, true) => cm.fp += 1,
                (false, false) => cm.tn += 1,
                (true, false) => cm.fn_ += 1,
            }
        }
        Ok(cm)
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }
}

/// Scores on the held-out partition.
///
/// Ratios whose denominator is zero are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1: Option<f64>,
    #[serde(rename = "confusionMatrix")]
    pub confusion_matrix: ConfusionMatrix,
    pub threshold: f64,
    pub n_samples: usize,
}

impl EvaluationReport {
    pub fn from_confusion(cm: ConfusionMatrix, threshold: f64) -> Self {
        let n = cm.total();
        let ratio = |num: usize, den: usize| (den > 0).then(|| num as f64 / den as f64);

        let accuracy = ratio(cm.tp + cm.tn, n).unwrap_or(0.0);
        let precision = ratio(cm.tp, cm.tp + cm.fp);
        let recall = ratio(cm.tp, cm.tp + cm.fn_);
        let f1 = match (precision, recall) {
            (Some(p), Some(r)) if p + r > 0.0 => Some(2.0 * p * r / (p + r)),
            (Some(_), Some(_)) => Some(0.0),
            _ => None,
        };

        Self {
            accuracy,
            precision,
            recall,
            f1,
            confusion_matrix: cm,
            threshold,
            n_samples: n,
        }
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v));
        let cm = &self.confusion_matrix;
        writeln!(f, "samples:   {}", self.n_samples)?;
        writeln!(f, "accuracy:  {:.4}", self.accuracy)?;
        writeln!(f, "precision: {}", show(self.precision))?;
        writeln!(f, "recall:    {}", show(self.recall))?;
        writeln!(f, "f1:        {}", show(self.f1))?;
        write!(f, "confusion: TP={} FP={} TN={} FN={}", cm.tp, cm.fp, cm.tn, cm.fn_)
    }
}

/// Scores a trained artifact on its own held-out partition
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, artifact: &TrainedArtifact) -> Result<EvaluationReport> {
        let holdout = artifact.holdout();
        let threshold = artifact.threshold();
        let y_pred = artifact.model().predict(&holdout.x, threshold)?;
        let cm = ConfusionMatrix::from_labels(&holdout.y, &y_pred)?;
        let report = EvaluationReport::from_confusion(cm, threshold);

        info!(
            n_samples = report.n_samples,
            accuracy = report.accuracy,
            precision = ?report.precision,
            recall = ?report.recall,
            "Held-out evaluation"
        );
        Ok(report)
    }
}
