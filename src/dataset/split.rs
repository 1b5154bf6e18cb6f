//! Train / validation / test split
//!
//! Rows are shuffled with a seeded RNG, then cut at 70% and 90%. The ratio
//! is fixed; only the seed is a parameter so tests can vary it.

use crate::{Error, Result};
use arrow::array::{RecordBatch, UInt32Array};
use arrow::compute::take;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Seed used by the extract and preprocess steps.
pub const SPLIT_SEED: u64 = 1729;

/// The three partitions of a split.
#[derive(Debug, Clone)]
pub struct DatasetSplits {
    /// First 70% of the shuffled rows
    pub train: RecordBatch,
    /// Next 20%
    pub validation: RecordBatch,
    /// Remaining 10%
    pub test: RecordBatch,
}

impl DatasetSplits {
    /// `(rows, columns)` of train, validation and test.
    #[must_use]
    pub fn shapes(&self) -> [(usize, usize); 3] {
        [
            (self.train.num_rows(), self.train.num_columns()),
            (self.validation.num_rows(), self.validation.num_columns()),
            (self.test.num_rows(), self.test.num_columns()),
        ]
    }
}

/// Cut points for `num_rows` rows: `(floor(0.7 * n), floor(0.9 * n))`.
///
/// Computed in `f64`: `0.7 * 90` is `62.99…`, so the first cut is 62.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn split_bounds(num_rows: usize) -> (usize, usize) {
    let n = num_rows as f64;
    ((0.7 * n) as usize, (0.9 * n) as usize)
}

/// Row permutation produced by `seed`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if `num_rows` exceeds the `u32` index range.
pub fn shuffled_indices(num_rows: usize, seed: u64) -> Result<Vec<u32>> {
    let upper = u32::try_from(num_rows).map_err(|_| {
        Error::InvalidInput(format!("{num_rows} rows exceed the u32 index range"))
    })?;
    let mut indices: Vec<u32> = (0..upper).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    Ok(indices)
}

/// Shuffle `batch` with `seed` and cut it into train/validation/test.
///
/// # Errors
///
/// Returns an error if the row count exceeds the index range or a column
/// cannot be reordered.
pub fn split_dataset(batch: &RecordBatch, seed: u64) -> Result<DatasetSplits> {
    let indices = UInt32Array::from(shuffled_indices(batch.num_rows(), seed)?);
    let columns = batch
        .columns()
        .iter()
        .map(|column| take(column.as_ref(), &indices, None))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let shuffled = RecordBatch::try_new(batch.schema(), columns)?;

    let (train_end, validation_end) = split_bounds(shuffled.num_rows());
    Ok(DatasetSplits {
        train: shuffled.slice(0, train_end),
        validation: shuffled.slice(train_end, validation_end - train_end),
        test: shuffled.slice(validation_end, shuffled.num_rows() - validation_end),
    })
}
