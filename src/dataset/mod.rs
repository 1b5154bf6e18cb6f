//! Tabular datasets
//!
//! Steps read and write whole CSV objects and hold them in memory as Arrow
//! [`RecordBatch`]es. This module covers decoding/encoding, the bank-marketing
//! feature engineering, the seeded train/validation/test split, and the
//! [`DatasetRef`] description logged to tracking.

pub mod csv;
pub mod features;
pub mod split;

pub use self::csv::{column_as_f64, feature_matrix, read_csv, write_csv, CsvLayout};
pub use features::{engineer_features, TARGET_COLUMN};
pub use split::{split_bounds, split_dataset, DatasetSplits, SPLIT_SEED};

use crate::experiment::{sha256_hex, ColumnSpec, DatasetRef};
use crate::Result;
use arrow::array::RecordBatch;

/// Length of the content digest in a [`DatasetRef`].
const DIGEST_LEN: usize = 8;

/// `(rows, columns)` of a batch.
#[must_use]
pub fn shape(batch: &RecordBatch) -> (usize, usize) {
    (batch.num_rows(), batch.num_columns())
}

/// Describe `batch` for logging as a tracking input.
///
/// The digest is the first 8 hex characters of the sha256 of the batch
/// encoded as headerless CSV, so two batches with the same cells in the same
/// order share a digest regardless of where they were read from.
///
/// # Errors
///
/// Returns an error if the batch cannot be encoded as CSV.
pub fn dataset_reference(
    batch: &RecordBatch,
    name: impl Into<String>,
    source: impl Into<String>,
) -> Result<DatasetRef> {
    let encoded = write_csv(batch, CsvLayout::HEADERLESS)?;
    let mut digest = sha256_hex(&encoded);
    digest.truncate(DIGEST_LEN);

    let schema = batch.schema();
    Ok(DatasetRef {
        name: name.into(),
        digest,
        source: source.into(),
        schema: schema
            .fields()
            .iter()
            .map(|field| ColumnSpec {
                name: field.name().clone(),
                data_type: field.data_type().to_string(),
            })
            .collect(),
        num_rows: batch.num_rows(),
    })
}

/// Drop `name` from `batch`, keeping the other columns in order.
///
/// # Errors
///
/// Returns [`crate::Error::Schema`] if the column does not exist.
pub fn drop_column(batch: &RecordBatch, name: &str) -> Result<RecordBatch> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|_| crate::Error::Schema(format!("missing column `{name}`")))?;
    let mut batch = batch.clone();
    batch.remove_column(idx);
    Ok(batch)
}

/// Keep only `name` from `batch`.
///
/// # Errors
///
/// Returns [`crate::Error::Schema`] if the column does not exist.
pub fn select_column(batch: &RecordBatch, name: &str) -> Result<RecordBatch> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|_| crate::Error::Schema(format!("missing column `{name}`")))?;
    Ok(batch.project(&[idx])?)
}
