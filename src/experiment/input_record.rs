//! Input Record - datasets a run consumed

use serde::{Deserialize, Serialize};

/// Reference to a dataset, as logged to a tracking backend.
///
/// Only the description travels: name, digest of the contents, where it came
/// from, the column layout and size. The rows themselves stay in storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasetRef {
    /// Dataset name
    pub name: String,
    /// Short content digest (8 hex chars)
    pub digest: String,
    /// Where the dataset was read from (URI), empty when built in memory
    pub source: String,
    /// Column names and types, in order
    pub schema: Vec<ColumnSpec>,
    /// Number of rows
    pub num_rows: usize,
}

/// One column of a [`DatasetRef`] schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name
    pub name: String,
    /// Arrow data type, rendered
    pub data_type: String,
}

impl DatasetRef {
    /// Number of columns.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.schema.len()
    }

    /// `(rows, columns)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.num_rows, self.num_columns())
    }
}

/// A dataset logged against a run under a context tag
/// (`featureset`, `raw_input`, `model_dataset`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputRecord {
    run_id: String,
    context: String,
    dataset: DatasetRef,
}

impl InputRecord {
    /// Create an input record.
    #[must_use]
    pub fn new(run_id: impl Into<String>, dataset: DatasetRef, context: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            context: context.into(),
            dataset,
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the context tag.
    #[must_use]
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Get the dataset reference.
    #[must_use]
    pub const fn dataset(&self) -> &DatasetRef {
        &self.dataset
    }
}
