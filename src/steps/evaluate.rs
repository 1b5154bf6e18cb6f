//! Evaluation: score the test set, ROC/AUC, prediction baseline.

use super::StepRuntime;
use crate::dataset::{column_as_f64, feature_matrix, read_csv, CsvLayout};
use crate::envelope::{StepEnvelope, StepError, StepInput, StepKind, StepResult};
use crate::evaluation::{prediction_baseline, roc_curve, EvaluationReport, ROC_CURVE_FILE};
use crate::model::load_model;
use crate::storage::join_prefix;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Input of [`evaluate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluateInput {
    /// Headerless test features
    pub test_x_data_uri: String,
    /// Headerless single-column test labels
    pub test_y_data_uri: String,
    /// Model archive
    pub model_uri: String,
    /// Where the prediction baseline goes
    pub output_prefix: String,
    /// Tracking configuration
    #[serde(flatten)]
    pub tracking: StepInput,
}

/// Output of [`evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateOutputs {
    /// AUC report, passed on to registration
    #[serde(flatten)]
    pub report: EvaluationReport,
    /// Prediction baseline CSV
    pub prediction_baseline_data: String,
}

fn read_labels(contents: &[u8]) -> Result<Vec<f64>> {
    let labels = read_csv(contents, CsvLayout::HEADERLESS)?;
    if labels.num_columns() != 1 {
        return Err(Error::Schema(format!(
            "test labels have {} columns, expected 1",
            labels.num_columns()
        )));
    }
    column_as_f64(labels.column(0).as_ref(), "label")
}

/// Score the test set with the model, compute ROC/AUC, and write the
/// prediction baseline to `{output_prefix}/prediction_baseline/prediction_baseline.csv`.
///
/// Logs `auc_score` as a metric and the ROC plot as an artifact.
///
/// # Errors
///
/// Returns a [`StepError`] wrapping the storage, model, evaluation or tracking
/// error that stopped the step.
pub fn evaluate(
    runtime: &StepRuntime,
    input: &EvaluateInput,
) -> std::result::Result<StepResult<EvaluateOutputs>, StepError> {
    StepEnvelope::new(StepKind::Evaluate).run(&input.tracking, runtime.connector.as_ref(), |ctx| {
        let objects = runtime.objects.as_ref();
        let features = feature_matrix(&read_csv(
            &objects.read(&input.test_x_data_uri)?,
            CsvLayout::HEADERLESS,
        )?)?;
        let labels = read_labels(&objects.read(&input.test_y_data_uri)?)?;

        let probabilities = load_model(objects, &input.model_uri)?.predict_proba(&features)?;

        let curve = roc_curve(&labels, &probabilities)?;
        let auc_score = curve.auc()?;
        tracing::info!(auc_score, samples = labels.len(), "evaluated model");

        ctx.log_metric("auc_score", auc_score)?;
        ctx.log_artifact(ROC_CURVE_FILE, curve.render_svg().as_bytes())?;

        let prediction_baseline_data =
            join_prefix(&input.output_prefix, "prediction_baseline/prediction_baseline.csv");
        objects.write(
            &prediction_baseline_data,
            &prediction_baseline(&probabilities, &labels)?,
        )?;

        Ok(EvaluateOutputs {
            report: EvaluationReport::from_auc(auc_score),
            prediction_baseline_data,
        })
    })
}
