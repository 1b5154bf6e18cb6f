//! Registration: submit the trained model to the model registry.

use super::StepRuntime;
use crate::envelope::{StepEnvelope, StepError, StepInput, StepKind, StepResult};
use crate::evaluation::EvaluationReport;
use crate::experiment::ParamValue;
use crate::registry::{ApprovalStatus, ModelMetrics, ModelPackageRequest};
use crate::storage::join_prefix;
use serde::{Deserialize, Serialize};

/// Artifact name of the evaluation report.
const EVALUATION_FILE: &str = "evaluation.json";

/// Input of [`register`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterInput {
    /// Training job that produced the model
    pub training_job_name: String,
    /// Package group
    pub model_package_group_name: String,
    /// Initial approval state
    pub model_approval_status: ApprovalStatus,
    /// Report from the evaluate step
    pub evaluation_result: EvaluationReport,
    /// Where the evaluation report is kept
    pub output_prefix: String,
    /// Model quality statistics
    #[serde(default)]
    pub model_statistics_uri: Option<String>,
    /// Model quality constraints
    #[serde(default)]
    pub model_constraints_uri: Option<String>,
    /// Data quality statistics
    #[serde(default)]
    pub model_data_statistics_uri: Option<String>,
    /// Data quality constraints
    #[serde(default)]
    pub model_data_constraints_uri: Option<String>,
    /// Tracking configuration
    #[serde(flatten)]
    pub tracking: StepInput,
}

/// Output of [`register`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterOutputs {
    /// Identifier of the new package
    pub model_package_arn: String,
    /// Package group
    pub model_package_group_name: String,
}

/// Register a model package and record the submission in tracking.
///
/// Logs `evaluation.json` as an artifact, and the package identifier and the
/// four metrics-source URIs (empty when absent) as parameters.
///
/// # Errors
///
/// Returns a [`StepError`] wrapping the registry, storage or tracking error
/// that stopped the step.
pub fn register(
    runtime: &StepRuntime,
    input: &RegisterInput,
) -> Result<StepResult<RegisterOutputs>, StepError> {
    StepEnvelope::new(StepKind::Register).run(&input.tracking, runtime.connector.as_ref(), |ctx| {
        let evaluation = serde_json::to_vec(&input.evaluation_result)?;
        runtime.objects.write(
            &join_prefix(&input.output_prefix, &format!("evaluation/{EVALUATION_FILE}")),
            &evaluation,
        )?;
        ctx.log_artifact(EVALUATION_FILE, &evaluation)?;

        let request = ModelPackageRequest {
            training_job_name: input.training_job_name.clone(),
            model_package_group_name: input.model_package_group_name.clone(),
            approval_status: input.model_approval_status,
            model_metrics: ModelMetrics::from_uris(
                input.model_statistics_uri.as_deref(),
                input.model_constraints_uri.as_deref(),
                input.model_data_statistics_uri.as_deref(),
                input.model_data_constraints_uri.as_deref(),
            ),
            settings: runtime.registry_settings.clone(),
        };
        let package = runtime.registry.register(&request)?;

        let uri = |value: &Option<String>| ParamValue::from(value.clone().unwrap_or_default());
        ctx.log_params(&[
            ("model_package_arn", package.model_package_arn.as_str().into()),
            ("model_statistics_uri", uri(&input.model_statistics_uri)),
            ("model_constraints_uri", uri(&input.model_constraints_uri)),
            ("data_statistics_uri", uri(&input.model_data_statistics_uri)),
            ("data_constraints_uri", uri(&input.model_data_constraints_uri)),
        ])?;

        Ok(RegisterOutputs {
            model_package_arn: package.model_package_arn,
            model_package_group_name: package.model_package_group_name,
        })
    })
}
