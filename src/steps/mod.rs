//! Pipeline steps
//!
//! Each step is a function of a [`StepRuntime`] (the collaborators) and a
//! typed input, run inside the [`crate::envelope`]. Steps hand data to each
//! other through object storage; the returned [`StepResult`] carries the
//! locations and tracking identifiers the orchestrator wires into the next
//! step.
//!
//! [`StepResult`]: crate::envelope::StepResult

mod evaluate;
mod extract;
mod preprocess;
mod register;

pub use evaluate::{evaluate, EvaluateInput, EvaluateOutputs};
pub use extract::{prepare_datasets, PrepareDatasetsInput};
pub use preprocess::{preprocess, ModelDatasetSnapshot, PreprocessInput, PreprocessOutputs};
pub use register::{register, RegisterInput, RegisterOutputs};

use crate::config::PipelineConfig;
use crate::dataset::{
    drop_column, select_column, shape, write_csv, CsvLayout, DatasetSplits, TARGET_COLUMN,
};
use crate::envelope::StepContext;
use crate::experiment::ParamValue;
use crate::feature_store::{FeatureStore, ParquetFeatureStore};
use crate::registry::{ModelRegistry, ObjectStoreRegistry, RegistrySettings};
use crate::storage::{join_prefix, LocalObjectStore, ObjectStore};
use crate::tracking::{DefaultConnector, TrackerConnector};
use crate::Result;
use arrow::array::RecordBatch;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Collaborators shared by all steps.
#[derive(Clone)]
pub struct StepRuntime {
    /// Object storage for step inputs and outputs
    pub objects: Arc<dyn ObjectStore>,
    /// Builds a tracker per step invocation
    pub connector: Arc<dyn TrackerConnector>,
    /// Source of feature records for extraction
    pub feature_store: Arc<dyn FeatureStore>,
    /// Destination of model packages
    pub registry: Arc<dyn ModelRegistry>,
    /// Deployment settings recorded with every package
    pub registry_settings: RegistrySettings,
}

impl StepRuntime {
    /// Runtime over `objects`, with the feature store and registry kept in
    /// the same storage under default prefixes.
    #[must_use]
    pub fn new(objects: Arc<dyn ObjectStore>) -> Self {
        let defaults = PipelineConfig::default();
        Self::with_prefixes(objects, &defaults.feature_store_prefix, &defaults.registry_prefix)
    }

    fn with_prefixes(objects: Arc<dyn ObjectStore>, feature_prefix: &str, registry_prefix: &str) -> Self {
        Self {
            feature_store: Arc::new(ParquetFeatureStore::new(objects.clone(), feature_prefix)),
            registry: Arc::new(ObjectStoreRegistry::new(objects.clone(), registry_prefix)),
            connector: Arc::new(DefaultConnector),
            registry_settings: RegistrySettings::default(),
            objects,
        }
    }

    /// Runtime described by `config`: a filesystem object store rooted at
    /// `storage_root`, the Parquet feature store and object-store registry
    /// under their configured prefixes.
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        let objects: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(&config.storage_root));
        let mut runtime = Self::with_prefixes(objects, &config.feature_store_prefix, &config.registry_prefix);
        runtime.registry_settings = config.registry.clone();
        runtime
    }

    /// Replace the tracker connector.
    #[must_use]
    pub fn with_connector(mut self, connector: Arc<dyn TrackerConnector>) -> Self {
        self.connector = connector;
        self
    }

    /// Replace the feature store.
    #[must_use]
    pub fn with_feature_store(mut self, feature_store: Arc<dyn FeatureStore>) -> Self {
        self.feature_store = feature_store;
        self
    }

    /// Replace the model registry.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<dyn ModelRegistry>) -> Self {
        self.registry = registry;
        self
    }
}

/// `(rows, columns)` of the full table and of each partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitShapes {
    /// Table before splitting
    pub full: (usize, usize),
    /// Training partition
    pub train: (usize, usize),
    /// Validation partition
    pub validate: (usize, usize),
    /// Test partition, label included
    pub test: (usize, usize),
}

impl SplitShapes {
    fn of(full: &RecordBatch, splits: &DatasetSplits) -> Self {
        let [train, validate, test] = splits.shapes();
        Self {
            full: shape(full),
            train,
            validate,
            test,
        }
    }
}

/// Split datasets written by extract and preprocess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitOutputs {
    /// Rows in the table that was split
    pub rows: usize,
    /// Dataset shapes
    pub shapes: SplitShapes,
    /// Training rows, label first
    pub train_data: String,
    /// Validation rows, label first
    pub validation_data: String,
    /// Test features
    pub test_x_data: String,
    /// Test labels
    pub test_y_data: String,
    /// Every row without the label, for data-quality monitoring
    pub baseline_data: String,
}

impl SplitOutputs {
    /// Standard layout under `prefix` for a split of the given shapes.
    #[must_use]
    pub fn under(prefix: &str, shapes: SplitShapes) -> Self {
        Self {
            rows: shapes.full.0,
            shapes,
            train_data: join_prefix(prefix, "train/train.csv"),
            validation_data: join_prefix(prefix, "validation/validation.csv"),
            test_x_data: join_prefix(prefix, "test/test_x.csv"),
            test_y_data: join_prefix(prefix, "test/test_y.csv"),
            baseline_data: join_prefix(prefix, "baseline/baseline.csv"),
        }
    }
}

/// Log the dataset shapes of a split.
fn log_split_shapes(
    ctx: &StepContext<'_>,
    full: &RecordBatch,
    splits: &DatasetSplits,
) -> Result<SplitShapes> {
    let shapes = SplitShapes::of(full, splits);
    tracing::info!(train = ?shapes.train, validate = ?shapes.validate, test = ?shapes.test, "data split");
    ctx.log_params(&[
        ("full_dataset", ParamValue::from(shapes.full)),
        ("train", shapes.train.into()),
        ("validate", shapes.validate.into()),
        ("test", shapes.test.into()),
    ])?;
    Ok(shapes)
}

/// Write a split as headerless CSV objects under `prefix`.
fn write_split_outputs(
    objects: &dyn ObjectStore,
    prefix: &str,
    full: &RecordBatch,
    splits: &DatasetSplits,
    shapes: SplitShapes,
) -> Result<SplitOutputs> {
    let outputs = SplitOutputs::under(prefix, shapes);
    let csv = |batch: &RecordBatch| write_csv(batch, CsvLayout::HEADERLESS);

    objects.write(&outputs.train_data, &csv(&splits.train)?)?;
    objects.write(&outputs.validation_data, &csv(&splits.validation)?)?;
    objects.write(
        &outputs.test_y_data,
        &csv(&select_column(&splits.test, TARGET_COLUMN)?)?,
    )?;
    objects.write(
        &outputs.test_x_data,
        &csv(&drop_column(&splits.test, TARGET_COLUMN)?)?,
    )?;
    objects.write(
        &outputs.baseline_data,
        &csv(&drop_column(full, TARGET_COLUMN)?)?,
    )?;

    tracing::info!(prefix, "datasets uploaded");
    Ok(outputs)
}
