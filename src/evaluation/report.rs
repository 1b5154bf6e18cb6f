//! Evaluation report and prediction baseline

use crate::dataset::{write_csv, CsvLayout};
use crate::{Error, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Probability above which a prediction is positive.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Evaluation result handed from the evaluate step to the register step.
///
/// Serializes as
/// `{"evaluation_result":{"classification_metrics":{"auc_score":{"value":0.93}}}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Metrics grouped by problem type
    pub evaluation_result: EvaluationResult,
}

/// Metric groups of an [`EvaluationReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Binary classification metrics
    pub classification_metrics: ClassificationMetrics,
}

/// Binary classification metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    /// Area under the ROC curve
    pub auc_score: MetricValue,
}

/// A single reported value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    /// The value
    pub value: f64,
}

impl EvaluationReport {
    /// Report carrying an AUC score.
    #[must_use]
    pub fn from_auc(auc_score: f64) -> Self {
        Self {
            evaluation_result: EvaluationResult {
                classification_metrics: ClassificationMetrics {
                    auc_score: MetricValue { value: auc_score },
                },
            },
        }
    }

    /// The AUC score.
    #[must_use]
    pub fn auc_score(&self) -> f64 {
        self.evaluation_result.classification_metrics.auc_score.value
    }
}

/// Prediction baseline for model-quality monitoring: CSV with header
/// `prediction,probability,label`, one row per scored sample.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the lengths differ.
#[allow(clippy::cast_possible_truncation)]
pub fn prediction_baseline(probabilities: &[f64], labels: &[f64]) -> Result<Vec<u8>> {
    if probabilities.len() != labels.len() {
        return Err(Error::InvalidInput(format!(
            "{} probabilities but {} labels",
            probabilities.len(),
            labels.len()
        )));
    }

    let predictions: Int64Array = probabilities
        .iter()
        .map(|&p| i64::from(p > DECISION_THRESHOLD))
        .collect();
    let labels: Int64Array = labels.iter().map(|&l| l.round() as i64).collect();

    let schema = Arc::new(Schema::new(vec![
        Field::new("prediction", DataType::Int64, false),
        Field::new("probability", DataType::Float64, false),
        Field::new("label", DataType::Int64, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(predictions),
        Arc::new(Float64Array::from(probabilities.to_vec())),
        Arc::new(labels),
    ];
    write_csv(&RecordBatch::try_new(schema, columns)?, CsvLayout::WITH_HEADER)
}
