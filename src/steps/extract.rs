//! Feature extraction: latest feature records, split into train/validation/test.

use super::{log_split_shapes, write_split_outputs, SplitOutputs, StepRuntime};
use crate::dataset::{dataset_reference, drop_column, split_dataset, SPLIT_SEED};
use crate::envelope::{StepEnvelope, StepError, StepInput, StepKind, StepResult};
use crate::feature_store::{EVENT_TIME, RECORD_IDENTIFIER};
use serde::{Deserialize, Serialize};

/// Input of [`prepare_datasets`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareDatasetsInput {
    /// Feature group to read
    pub feature_group_name: String,
    /// Where the split datasets go
    pub output_prefix: String,
    /// Where the feature-store query leaves its result
    pub query_output_uri: String,
    /// Tracking configuration
    #[serde(flatten)]
    pub tracking: StepInput,
}

/// Extract the latest version of every record in the feature group, drop the
/// feature-store bookkeeping columns, and write the seeded split.
///
/// Logs the extracted table as a `featureset` input and the dataset shapes
/// as parameters.
///
/// # Errors
///
/// Returns a [`StepError`] wrapping the feature-store, storage or tracking
/// error that stopped the step.
pub fn prepare_datasets(
    runtime: &StepRuntime,
    input: &PrepareDatasetsInput,
) -> Result<StepResult<SplitOutputs>, StepError> {
    StepEnvelope::new(StepKind::PrepareDatasets).run(
        &input.tracking,
        runtime.connector.as_ref(),
        |ctx| {
            let records = runtime
                .feature_store
                .latest_records(&input.feature_group_name, &input.query_output_uri)?;
            let model_data = drop_column(&drop_column(&records, EVENT_TIME)?, RECORD_IDENTIFIER)?;
            tracing::info!(
                rows = model_data.num_rows(),
                feature_group = %input.feature_group_name,
                "extracted rows from feature group"
            );

            let featureset = dataset_reference(
                &model_data,
                &input.feature_group_name,
                &input.output_prefix,
            )?;
            ctx.log_input(&featureset, "featureset")?;

            let splits = split_dataset(&model_data, SPLIT_SEED)?;
            let shapes = log_split_shapes(ctx, &model_data, &splits)?;

            write_split_outputs(
                runtime.objects.as_ref(),
                &input.output_prefix,
                &model_data,
                &splits,
                shapes,
            )
        },
    )
}
