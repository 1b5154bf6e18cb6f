//! Preprocessing: raw marketing extract to the engineered model table.

use super::{log_split_shapes, write_split_outputs, SplitOutputs, StepRuntime};
use crate::dataset::{
    dataset_reference, engineer_features, read_csv, split_dataset, CsvLayout, SPLIT_SEED,
};
use crate::envelope::{StepEnvelope, StepError, StepInput, StepKind, StepResult};
use crate::experiment::DatasetRef;
use serde::{Deserialize, Serialize};

/// Which table is logged as the `model_dataset` input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelDatasetSnapshot {
    /// The table as read, before feature engineering
    Raw,
    /// The engineered table that is split and written
    #[default]
    Engineered,
}

/// Input of [`preprocess`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessInput {
    /// `;`-separated raw extract with a header row
    pub input_data_uri: String,
    /// Where the split datasets go
    pub output_prefix: String,
    /// Table logged as `model_dataset`
    #[serde(default)]
    pub model_dataset: ModelDatasetSnapshot,
    /// Tracking configuration
    #[serde(flatten)]
    pub tracking: StepInput,
}

/// Output of [`preprocess`]: the split locations plus both dataset references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessOutputs {
    /// Written datasets
    #[serde(flatten)]
    pub splits: SplitOutputs,
    /// The input table before feature engineering
    pub raw_dataset: DatasetRef,
    /// The engineered table
    pub engineered_dataset: DatasetRef,
}

/// Engineer features from the raw extract and write the seeded split.
///
/// Logs the raw table as `raw_input`, the table selected by
/// [`PreprocessInput::model_dataset`] as `model_dataset`, and the dataset
/// shapes as parameters.
///
/// # Errors
///
/// Returns a [`StepError`] wrapping the storage, schema or tracking error that
/// stopped the step.
pub fn preprocess(
    runtime: &StepRuntime,
    input: &PreprocessInput,
) -> Result<StepResult<PreprocessOutputs>, StepError> {
    StepEnvelope::new(StepKind::Preprocess).run(
        &input.tracking,
        runtime.connector.as_ref(),
        |ctx| {
            let raw = read_csv(
                &runtime.objects.read(&input.input_data_uri)?,
                CsvLayout::SEMICOLON_WITH_HEADER,
            )?;
            let raw_dataset = dataset_reference(&raw, "raw_input", &input.input_data_uri)?;
            ctx.log_input(&raw_dataset, "raw_input")?;

            let model_data = engineer_features(&raw)?;
            let engineered_dataset =
                dataset_reference(&model_data, "model_dataset", &input.input_data_uri)?;
            let logged = match input.model_dataset {
                ModelDatasetSnapshot::Raw => &raw_dataset,
                ModelDatasetSnapshot::Engineered => &engineered_dataset,
            };
            ctx.log_input(logged, "model_dataset")?;

            let splits = split_dataset(&model_data, SPLIT_SEED)?;
            let shapes = log_split_shapes(ctx, &model_data, &splits)?;

            let outputs = write_split_outputs(
                runtime.objects.as_ref(),
                &input.output_prefix,
                &model_data,
                &splits,
                shapes,
            )?;
            tracing::info!("data processing complete");

            Ok(PreprocessOutputs {
                splits: outputs,
                raw_dataset,
                engineered_dataset,
            })
        },
    )
}
