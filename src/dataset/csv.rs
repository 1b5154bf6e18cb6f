//! CSV tables backed by Arrow record batches

use crate::{Error, Result};
use arrow::array::{Array, AsArray, RecordBatch};
use arrow::compute::{cast, concat_batches};
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Float64Type};
use std::io::Cursor;
use std::sync::Arc;

/// How a CSV object is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvLayout {
    /// First line holds column names
    pub header: bool,
    /// Field delimiter
    pub delimiter: u8,
}

impl CsvLayout {
    /// Headerless, comma separated: the format steps exchange.
    pub const HEADERLESS: Self = Self {
        header: false,
        delimiter: b',',
    };

    /// Comma separated with a header row.
    pub const WITH_HEADER: Self = Self {
        header: true,
        delimiter: b',',
    };

    /// Semicolon separated with a header row (raw marketing extracts).
    pub const SEMICOLON_WITH_HEADER: Self = Self {
        header: true,
        delimiter: b';',
    };
}

/// Decode a CSV object into one record batch, inferring column types from
/// the whole input.
///
/// Headerless inputs get Arrow's generated names (`column_1`, `column_2`, ...).
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for an empty input and [`Error::Arrow`]
/// when decoding fails.
pub fn read_csv(contents: &[u8], layout: CsvLayout) -> Result<RecordBatch> {
    if contents.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::InvalidInput("CSV input is empty".to_string()));
    }

    let format = Format::default()
        .with_header(layout.header)
        .with_delimiter(layout.delimiter);
    let (schema, _) = format.infer_schema(Cursor::new(contents), None)?;
    let schema = Arc::new(schema);

    let reader = ReaderBuilder::new(schema.clone())
        .with_header(layout.header)
        .with_delimiter(layout.delimiter)
        .build(Cursor::new(contents))?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }

    Ok(concat_batches(&schema, &batches)?)
}

/// Encode a record batch as CSV.
///
/// # Errors
///
/// Returns [`Error::Arrow`] if a column type cannot be written as CSV.
pub fn write_csv(batch: &RecordBatch, layout: CsvLayout) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .with_header(layout.header)
        .with_delimiter(layout.delimiter)
        .build(Vec::new());
    writer.write(batch)?;
    Ok(writer.into_inner())
}

/// Convert a numeric column to `f64` values.
///
/// # Errors
///
/// Returns [`Error::Schema`] if the column cannot be cast to `Float64` or
/// contains nulls.
pub fn column_as_f64(column: &dyn Array, name: &str) -> Result<Vec<f64>> {
    let floats = cast(column, &DataType::Float64)
        .map_err(|e| Error::Schema(format!("column `{name}` is not numeric: {e}")))?;
    if floats.null_count() > 0 {
        return Err(Error::Schema(format!(
            "column `{name}` has {} missing values",
            floats.null_count()
        )));
    }
    Ok(floats.as_primitive::<Float64Type>().values().to_vec())
}

/// Row-major numeric matrix of every column in the batch.
///
/// # Errors
///
/// Returns [`Error::Schema`] if any column is non-numeric or has nulls.
pub fn feature_matrix(batch: &RecordBatch) -> Result<Vec<Vec<f64>>> {
    let schema = batch.schema();
    let columns = batch
        .columns()
        .iter()
        .zip(schema.fields())
        .map(|(column, field)| column_as_f64(column.as_ref(), field.name()))
        .collect::<Result<Vec<_>>>()?;

    Ok((0..batch.num_rows())
        .map(|row| columns.iter().map(|column| column[row]).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_headerless_infers_types() {
        let batch = read_csv(b"1,0.5,yes\n0,1.5,no\n", CsvLayout::HEADERLESS).unwrap();

        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 3);
        let schema = batch.schema();
        assert_eq!(schema.field(0).data_type(), &DataType::Int64);
        assert_eq!(schema.field(1).data_type(), &DataType::Float64);
        assert_eq!(schema.field(2).data_type(), &DataType::Utf8);
    }

    #[test]
    fn test_read_semicolon_header() {
        let batch = read_csv(
            b"\"age\";\"job\"\n56;\"housemaid\"\n",
            CsvLayout::SEMICOLON_WITH_HEADER,
        )
        .unwrap();

        assert!(batch.column_by_name("age").is_some());
        assert_eq!(batch.column_by_name("job").unwrap().as_string::<i32>().value(0), "housemaid");
    }

    #[test]
    fn test_write_headerless() {
        let batch = read_csv(b"1,2\n3,4\n", CsvLayout::HEADERLESS).unwrap();
        let bytes = write_csv(&batch, CsvLayout::HEADERLESS).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "1,2\n3,4\n");
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(
            read_csv(b"  \n", CsvLayout::HEADERLESS),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_feature_matrix_row_major() {
        let batch = read_csv(b"1,0.5\n2,1.5\n", CsvLayout::HEADERLESS).unwrap();
        let matrix = feature_matrix(&batch).unwrap();
        assert_eq!(matrix, vec![vec![1.0, 0.5], vec![2.0, 1.5]]);
    }

    #[test]
    fn test_feature_matrix_rejects_text() {
        let batch = read_csv(b"1,abc\n", CsvLayout::HEADERLESS).unwrap();
        assert!(matches!(feature_matrix(&batch), Err(Error::Schema(_))));
    }
}
