//! Feature store (offline, Parquet)
//!
//! A feature group is an append-only table of feature records. Every record
//! carries a record identifier and an event time; ingesting the same
//! identifier again appends a newer version rather than updating in place.
//!
//! Queries return the most recent version of each record:
//!
//! ```text
//! record_id  event_time  age  y           record_id  event_time  age  y
//! 1          100         30   no    ──►   1          250         31   yes
//! 2          120         45   no          2          120         45   no
//! 1          250         31   yes
//! ```

use crate::dataset::{write_csv, CsvLayout};
use crate::storage::{join_prefix, ObjectStore, ObjectUri};
use crate::{Error, Result};
use arrow::array::{Array, AsArray, RecordBatch, UInt32Array};
use arrow::compute::{cast, concat_batches, take};
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use std::collections::HashMap;
use std::sync::Arc;

/// Column identifying a record across versions.
pub const RECORD_IDENTIFIER: &str = "record_id";

/// Column ordering versions of the same record.
pub const EVENT_TIME: &str = "event_time";

/// Source of feature records.
pub trait FeatureStore: Send + Sync {
    /// Latest version of every record in `feature_group`.
    ///
    /// The query result is also written as CSV (with header) under
    /// `query_output_uri`, the way managed stores leave query results behind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FeatureStore`] if the group does not exist or lacks
    /// the identifier/event-time columns, or the storage error.
    fn latest_records(&self, feature_group: &str, query_output_uri: &str) -> Result<RecordBatch>;
}

/// Offline store keeping one Parquet object per feature group under a prefix:
/// `{prefix}/{group}.parquet`.
pub struct ParquetFeatureStore {
    objects: Arc<dyn ObjectStore>,
    offline_prefix: String,
}

impl ParquetFeatureStore {
    /// Create a store over `objects` rooted at `offline_prefix`.
    #[must_use]
    pub fn new(objects: Arc<dyn ObjectStore>, offline_prefix: impl Into<String>) -> Self {
        Self {
            objects,
            offline_prefix: offline_prefix.into(),
        }
    }

    /// Object URI holding `feature_group`.
    #[must_use]
    pub fn group_uri(&self, feature_group: &str) -> String {
        join_prefix(&self.offline_prefix, &format!("{feature_group}.parquet"))
    }

    /// Append `records` to `feature_group`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FeatureStore`] if `records` lacks the identifier or
    /// event-time column or its schema differs from the stored group.
    pub fn ingest(&self, feature_group: &str, records: &RecordBatch) -> Result<()> {
        let schema = records.schema();
        for required in [RECORD_IDENTIFIER, EVENT_TIME] {
            if schema.index_of(required).is_err() {
                return Err(Error::FeatureStore(format!(
                    "records for `{feature_group}` have no `{required}` column"
                )));
            }
        }

        let uri = self.group_uri(feature_group);
        let combined = if self.objects.exists(&uri.parse::<ObjectUri>()?)? {
            let existing = self.load(feature_group)?;
            if existing.schema().fields() != schema.fields() {
                return Err(Error::FeatureStore(format!(
                    "schema mismatch for `{feature_group}`: expected {:?}, got {:?}",
                    existing.schema(),
                    schema
                )));
            }
            concat_batches(&schema, [&existing, records])?
        } else {
            records.clone()
        };

        let mut writer = ArrowWriter::try_new(Vec::new(), combined.schema(), None)?;
        writer.write(&combined)?;
        let encoded = writer.into_inner()?;

        tracing::info!(
            feature_group,
            rows = records.num_rows(),
            total = combined.num_rows(),
            "ingested feature records"
        );
        self.objects.write(&uri, &encoded)
    }

    /// Every stored version of every record in `feature_group`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FeatureStore`] if the group is missing or unreadable.
    pub fn load(&self, feature_group: &str) -> Result<RecordBatch> {
        let uri = self.group_uri(feature_group);
        let contents = self.objects.read(&uri).map_err(|e| match e {
            Error::ObjectNotFound(_) => {
                Error::FeatureStore(format!("feature group `{feature_group}` not found"))
            }
            other => other,
        })?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(contents))
            .map_err(|e| Error::FeatureStore(format!("Failed to parse Parquet object: {e}")))?;
        let schema = builder.schema().clone();
        let reader = builder
            .build()
            .map_err(|e| Error::FeatureStore(format!("Failed to create Parquet reader: {e}")))?;

        let mut batches = Vec::new();
        for batch in reader {
            let batch = batch
                .map_err(|e| Error::FeatureStore(format!("Failed to read record batch: {e}")))?;
            batches.push(batch);
        }
        Ok(concat_batches(&schema, &batches)?)
    }
}

impl FeatureStore for ParquetFeatureStore {
    fn latest_records(&self, feature_group: &str, query_output_uri: &str) -> Result<RecordBatch> {
        let all = self.load(feature_group)?;
        let latest = latest_per_record(&all)?;

        let output = join_prefix(query_output_uri, &format!("{feature_group}.csv"));
        self.objects
            .write(&output, &write_csv(&latest, CsvLayout::WITH_HEADER)?)?;

        tracing::info!(
            feature_group,
            versions = all.num_rows(),
            records = latest.num_rows(),
            output = %output,
            "queried latest feature records"
        );
        Ok(latest)
    }
}

/// Event time, comparable across rows of one column.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
enum EventTime {
    Text(String),
    Numeric(f64),
}

fn event_times(column: &dyn Array) -> Result<Vec<EventTime>> {
    if column.null_count() > 0 {
        return Err(Error::FeatureStore(format!("`{EVENT_TIME}` has missing values")));
    }
    match column.data_type() {
        DataType::Utf8 => Ok(column
            .as_string::<i32>()
            .iter()
            .map(|v| EventTime::Text(v.unwrap_or_default().to_string()))
            .collect()),
        data_type if data_type.is_temporal() => {
            let ticks = cast(column, &DataType::Int64)?;
            #[allow(clippy::cast_precision_loss)]
            let times = ticks
                .as_primitive::<Int64Type>()
                .values()
                .iter()
                .map(|&t| EventTime::Numeric(t as f64))
                .collect();
            Ok(times)
        }
        _ => {
            let floats = cast(column, &DataType::Float64).map_err(|e| {
                Error::FeatureStore(format!("`{EVENT_TIME}` is not orderable: {e}"))
            })?;
            Ok(floats
                .as_primitive::<Float64Type>()
                .values()
                .iter()
                .map(|&t| EventTime::Numeric(t))
                .collect())
        }
    }
}

/// Keep the row with the greatest event time for each record identifier.
/// Ties go to the row stored last. Output rows keep their stored order.
///
/// # Errors
///
/// Returns [`Error::FeatureStore`] if either key column is missing or has nulls.
pub fn latest_per_record(records: &RecordBatch) -> Result<RecordBatch> {
    let column = |name: &str| {
        records.column_by_name(name).ok_or_else(|| {
            Error::FeatureStore(format!("feature records have no `{name}` column"))
        })
    };

    let ids = cast(column(RECORD_IDENTIFIER)?.as_ref(), &DataType::Utf8)?;
    if ids.null_count() > 0 {
        return Err(Error::FeatureStore(format!(
            "`{RECORD_IDENTIFIER}` has missing values"
        )));
    }
    let ids = ids.as_string::<i32>();
    let times = event_times(column(EVENT_TIME)?.as_ref())?;

    let mut latest: HashMap<&str, usize> = HashMap::new();
    for (row, id) in ids.iter().enumerate() {
        let id = id.unwrap_or_default();
        latest
            .entry(id)
            .and_modify(|kept| {
                if times[row] >= times[*kept] {
                    *kept = row;
                }
            })
            .or_insert(row);
    }

    let mut rows: Vec<usize> = latest.into_values().collect();
    rows.sort_unstable();
    let indices = rows
        .into_iter()
        .map(u32::try_from)
        .collect::<std::result::Result<UInt32Array, _>>()
        .map_err(|_| Error::FeatureStore("feature group too large".to_string()))?;

    let columns = records
        .columns()
        .iter()
        .map(|c| take(c.as_ref(), &indices, None))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(RecordBatch::try_new(records.schema(), columns)?)
}
