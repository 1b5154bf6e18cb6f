//! Data-capture record preprocessing for data-quality monitoring
//!
//! A deployed endpoint captures each inference as a JSON line:
//!
//! ```json
//! {
//!   "captureData": {
//!     "endpointInput":  {"observedContentType": "text/csv", "mode": "INPUT",  "data": "0.1,0.2,0.3,4", "encoding": "CSV"},
//!     "endpointOutput": {"observedContentType": "text/csv", "mode": "OUTPUT", "data": "0.87\n",        "encoding": "CSV"}
//!   },
//!   "eventMetadata": {"eventId": "…", "inferenceTime": "2024-03-07T09:05:02Z"},
//!   "eventVersion": "0"
//! }
//! ```
//!
//! The monitor only analyses the request features, so the output is dropped
//! and the features are renamed positionally (`_c0`, `_c1`, …).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Leading fields kept as floats; the rest are integers.
const FLOAT_FIELDS: usize = 3;

/// Encoding of a captured payload.
pub const CSV_ENCODING: &str = "CSV";

/// One side of a captured inference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedPayload {
    /// Content type the endpoint saw
    #[serde(default)]
    pub observed_content_type: String,
    /// `INPUT` or `OUTPUT`
    #[serde(default)]
    pub mode: String,
    /// Payload text
    pub data: String,
    /// Payload encoding (`CSV`, `JSON`, `BASE64`)
    pub encoding: String,
}

/// Request and response of a captured inference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureData {
    /// Request
    pub endpoint_input: CapturedPayload,
    /// Response
    pub endpoint_output: CapturedPayload,
}

/// Metadata of a captured inference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    /// Capture event id
    #[serde(default)]
    pub event_id: String,
    /// When the inference happened
    #[serde(default)]
    pub inference_time: String,
    /// Caller-supplied attributes; the first entry holds a JSON document
    #[serde(default)]
    pub custom_attribute: Option<Vec<String>>,
}

impl EventMetadata {
    /// First custom attribute parsed as JSON, if present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serde`] if the attribute is not valid JSON.
    pub fn custom_attributes(&self) -> Result<Option<serde_json::Value>> {
        match self.custom_attribute.as_ref().and_then(|a| a.first()) {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }
}

/// One captured inference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceRecord {
    /// Request and response
    pub capture_data: CaptureData,
    /// Event metadata
    #[serde(default)]
    pub event_metadata: EventMetadata,
    /// Capture format version
    #[serde(default)]
    pub event_version: String,
}

/// A feature value handed to the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Continuous feature
    Float(f64),
    /// Indicator or count feature
    Int(i64),
}

/// Map the request features of `record` to `_c{i}` fields: the first three
/// as floats, the rest as integers (truncating any fractional part).
///
/// # Errors
///
/// Returns [`Error::UnsupportedEncoding`] unless the request is CSV, without
/// looking at the payload, and [`Error::InvalidInput`] for a field that is
/// not a number or an integer field that is not finite or exceeds `i64`.
pub fn preprocess_record(record: &InferenceRecord) -> Result<BTreeMap<String, FieldValue>> {
    let input = &record.capture_data.endpoint_input;
    if input.encoding != CSV_ENCODING {
        return Err(Error::UnsupportedEncoding(input.encoding.clone()));
    }
    if let Some(attributes) = record.event_metadata.custom_attributes()? {
        tracing::debug!(%attributes, "custom attributes");
    }

    input
        .data
        .trim_end_matches(['\r', '\n'])
        .split(',')
        .enumerate()
        .map(|(i, raw)| {
            let number: f64 = raw.trim().parse().map_err(|_| {
                Error::InvalidInput(format!("field {i} is not a number: `{raw}`"))
            })?;
            let value = if i < FLOAT_FIELDS {
                FieldValue::Float(number)
            } else {
                FieldValue::Int(integer_field(i, number)?)
            };
            Ok((format!("_c{i}"), value))
        })
        .collect()
}

/// Truncate toward zero, rejecting values with no `i64` counterpart.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integer_field(index: usize, number: f64) -> Result<i64> {
    let truncated = number.trunc();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    if !truncated.is_finite() || truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(Error::InvalidInput(format!(
            "field {index} is not a representable integer: `{number}`"
        )));
    }
    Ok(truncated as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(encoding: &str, data: &str) -> InferenceRecord {
        InferenceRecord {
            capture_data: CaptureData {
                endpoint_input: CapturedPayload {
                    observed_content_type: "text/csv".to_string(),
                    mode: "INPUT".to_string(),
                    data: data.to_string(),
                    encoding: encoding.to_string(),
                },
                endpoint_output: CapturedPayload {
                    observed_content_type: "text/csv".to_string(),
                    mode: "OUTPUT".to_string(),
                    data: "0.87\n".to_string(),
                    encoding: "CSV".to_string(),
                },
            },
            event_metadata: EventMetadata::default(),
            event_version: "0".to_string(),
        }
    }

    #[test]
    fn test_csv_fields_typed_by_position() {
        let fields = preprocess_record(&record("CSV", "1.0,2.0,3.0,4")).unwrap();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields["_c0"], FieldValue::Float(1.0));
        assert_eq!(fields["_c2"], FieldValue::Float(3.0));
        assert_eq!(fields["_c3"], FieldValue::Int(4));
    }

    #[test]
    fn test_integer_fields_truncate() {
        let fields = preprocess_record(&record("CSV", "0,0,0,1.0,2.9")).unwrap();
        assert_eq!(fields["_c3"], FieldValue::Int(1));
        assert_eq!(fields["_c4"], FieldValue::Int(2));
    }

    #[test]
    fn test_non_finite_integer_fields_rejected() {
        for data in ["1,2,3,nan,inf", "1,2,3,nan,4", "1,2,3,4,inf", "1,2,3,-inf,4", "1,2,3,1e19,4"] {
            assert!(
                matches!(preprocess_record(&record("CSV", data)), Err(Error::InvalidInput(_))),
                "{data}"
            );
        }
    }

    #[test]
    fn test_non_finite_float_fields_pass_through() {
        let fields = preprocess_record(&record("CSV", "nan,inf,0,1")).unwrap();
        assert!(matches!(fields["_c0"], FieldValue::Float(v) if v.is_nan()));
        assert_eq!(fields["_c1"], FieldValue::Float(f64::INFINITY));
    }

    #[test]
    fn test_other_encodings_rejected() {
        let err = preprocess_record(&record("JSON", "{\"a\": 1}")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedEncoding(ref e) if e == "JSON"));
    }

    #[test]
    fn test_non_numeric_field() {
        assert!(matches!(
            preprocess_record(&record("CSV", "1.0,abc")),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_capture_json_shape() {
        let line = r#"{
            "captureData": {
                "endpointInput": {"observedContentType": "text/csv", "mode": "INPUT", "data": "0.5,0.1,0.2,1", "encoding": "CSV"},
                "endpointOutput": {"observedContentType": "text/csv", "mode": "OUTPUT", "data": "0.9\n", "encoding": "CSV"}
            },
            "eventMetadata": {"eventId": "e-1", "inferenceTime": "2024-03-07T09:05:02Z", "customAttribute": ["{\"tenant\": \"a\"}"]},
            "eventVersion": "0"
        }"#;
        let record: InferenceRecord = serde_json::from_str(line).unwrap();

        assert_eq!(record.event_metadata.event_id, "e-1");
        assert_eq!(
            record.event_metadata.custom_attributes().unwrap(),
            Some(serde_json::json!({"tenant": "a"}))
        );
        assert_eq!(preprocess_record(&record).unwrap()["_c3"], FieldValue::Int(1));
    }
}
