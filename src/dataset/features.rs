//! Feature engineering for the bank-marketing extract
//!
//! Input is the raw `;`-separated extract with a header row. Output is an
//! all-integer/float table with the label `y` as the first column, ready to
//! be split and written headerless.
//!
//! Column order of the output:
//! `y`, the remaining numeric columns in input order, the derived indicators
//! (`no_previous_contact`, `not_working`, `age_*`), then one `<col>_<value>`
//! indicator per distinct value of every text column, values sorted.

use super::csv::column_as_f64;
use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Label column of the engineered table.
pub const TARGET_COLUMN: &str = "y";

/// Columns that leak the outcome or describe the macro-economy at call time.
const DROPPED_COLUMNS: [&str; 6] = [
    "duration",
    "emp.var.rate",
    "cons.price.idx",
    "cons.conf.idx",
    "euribor3m",
    "nr.employed",
];

const NOT_WORKING_JOBS: [&str; 3] = ["student", "retired", "unemployed"];

/// `pdays` value meaning "never contacted before".
const NO_PREVIOUS_CONTACT: f64 = 999.0;

const AGE_EDGES: [f64; 7] = [18.0, 30.0, 40.0, 50.0, 60.0, 70.0, 90.0];
const AGE_LABELS: [&str; 6] = ["18-29", "30-39", "40-49", "50-59", "60-69", "70-plus"];

const SCALED_COLUMNS: [&str; 3] = ["pdays", "previous", "campaign"];

/// Turn the raw extract into the model table.
///
/// # Errors
///
/// Returns [`Error::Schema`] when an expected column is missing or has the
/// wrong type, or when the label has no positive (`yes`) rows.
pub fn engineer_features(raw: &RecordBatch) -> Result<RecordBatch> {
    let mut frame = Frame::from_batch(raw);

    let pdays = column_as_f64(frame.column("pdays")?.as_ref(), "pdays")?;
    frame.push(
        "no_previous_contact",
        indicator(pdays.iter().map(|&d| d == NO_PREVIOUS_CONTACT)),
    );

    let not_working = {
        let jobs = frame.column("job")?.as_string_opt::<i32>().ok_or_else(|| {
            Error::Schema("column `job` is not text".to_string())
        })?;
        indicator(
            jobs.iter()
                .map(|job| job.is_some_and(|j| NOT_WORKING_JOBS.contains(&j))),
        )
    };
    frame.push("not_working", not_working);

    for name in DROPPED_COLUMNS {
        frame.remove(name)?;
    }

    let age = column_as_f64(frame.column("age")?.as_ref(), "age")?;
    let bins: Vec<Option<usize>> = age.iter().map(|&a| age_bin(a)).collect();
    for (bin, label) in AGE_LABELS.iter().enumerate() {
        frame.push(
            &format!("age_{label}"),
            indicator(bins.iter().map(|b| *b == Some(bin))),
        );
    }
    frame.remove("age")?;

    for name in SCALED_COLUMNS {
        let values = column_as_f64(frame.column(name)?.as_ref(), name)?;
        frame.replace(name, Arc::new(Float64Array::from(min_max_scale(&values))))?;
    }

    let mut frame = frame.one_hot_text_columns();

    let label = frame.remove("y_yes").map_err(|_| {
        Error::Schema("label column `y` has no `yes` rows".to_string())
    })?;
    frame.remove("y_no")?;
    frame.insert_first(TARGET_COLUMN, label);

    frame.into_batch()
}

/// Index into [`AGE_LABELS`]: right-closed bins with the lowest edge included.
/// Ages outside `[18, 90]` fall in no bin.
fn age_bin(age: f64) -> Option<usize> {
    if !(age >= AGE_EDGES[0] && age <= AGE_EDGES[AGE_EDGES.len() - 1]) {
        return None;
    }
    AGE_EDGES[1..].iter().position(|&upper| age <= upper)
}

/// `(x - min) / (max - min)`; a constant column scales to all zeros.
fn min_max_scale(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = if max - min > 0.0 { max - min } else { 1.0 };
    values.iter().map(|v| (v - min) / range).collect()
}

fn indicator(flags: impl Iterator<Item = bool>) -> ArrayRef {
    Arc::new(Int64Array::from_iter_values(flags.map(i64::from)))
}

/// Ordered, named columns being reshaped.
struct Frame {
    columns: Vec<(String, ArrayRef)>,
}

impl Frame {
    fn from_batch(batch: &RecordBatch) -> Self {
        let schema = batch.schema();
        Self {
            columns: schema
                .fields()
                .iter()
                .zip(batch.columns())
                .map(|(field, array)| (field.name().clone(), array.clone()))
                .collect(),
        }
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| Error::Schema(format!("missing column `{name}`")))
    }

    fn column(&self, name: &str) -> Result<&ArrayRef> {
        let idx = self.position(name)?;
        Ok(&self.columns[idx].1)
    }

    fn push(&mut self, name: &str, array: ArrayRef) {
        self.columns.push((name.to_string(), array));
    }

    fn insert_first(&mut self, name: &str, array: ArrayRef) {
        self.columns.insert(0, (name.to_string(), array));
    }

    fn replace(&mut self, name: &str, array: ArrayRef) -> Result<()> {
        let idx = self.position(name)?;
        self.columns[idx].1 = array;
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<ArrayRef> {
        let idx = self.position(name)?;
        Ok(self.columns.remove(idx).1)
    }

    /// Replace every text column with one indicator column per distinct value.
    /// Non-text columns keep their order and come first.
    fn one_hot_text_columns(self) -> Self {
        let (text, numeric): (Vec<_>, Vec<_>) = self
            .columns
            .into_iter()
            .partition(|(_, array)| array.data_type() == &DataType::Utf8);

        let mut out = Self { columns: numeric };
        for (name, array) in text {
            let values = array.as_string::<i32>();
            let categories: BTreeSet<&str> = values.iter().flatten().collect();
            for category in categories {
                out.push(
                    &format!("{name}_{category}"),
                    indicator(values.iter().map(|v| v == Some(category))),
                );
            }
        }
        out
    }

    fn into_batch(self) -> Result<RecordBatch> {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|(name, array)| Field::new(name, array.data_type().clone(), true))
            .collect();
        let arrays: Vec<ArrayRef> = self.columns.into_iter().map(|(_, a)| a).collect();
        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }
}
