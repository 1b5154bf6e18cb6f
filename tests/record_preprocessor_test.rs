//! Captured inference record preprocessing, driven from raw JSON lines.

use pipeline_steps::monitoring::{preprocess_record, FieldValue, InferenceRecord};
use pipeline_steps::Error;

fn capture_line(encoding: &str, data: &str) -> String {
    serde_json::json!({
        "captureData": {
            "endpointInput": {
                "observedContentType": "text/csv",
                "mode": "INPUT",
                "data": data,
                "encoding": encoding
            },
            "endpointOutput": {
                "observedContentType": "text/csv",
                "mode": "OUTPUT",
                "data": "0.42\n",
                "encoding": "CSV"
            }
        },
        "eventMetadata": {
            "eventId": "0b7d4f1e",
            "inferenceTime": "2024-03-07T09:05:02Z"
        },
        "eventVersion": "0"
    })
    .to_string()
}

#[test]
fn test_engineered_row_maps_to_positional_fields() {
    let line = capture_line("CSV", "0.0909,0.0,1.0,0,1,0,0,0,1");
    let record: InferenceRecord = serde_json::from_str(&line).unwrap();

    let fields = preprocess_record(&record).unwrap();

    assert_eq!(fields.len(), 9);
    assert_eq!(fields["_c0"], FieldValue::Float(0.0909));
    assert_eq!(fields["_c1"], FieldValue::Float(0.0));
    assert_eq!(fields["_c2"], FieldValue::Float(1.0));
    assert_eq!(fields["_c8"], FieldValue::Int(1));
}

#[test]
fn test_output_serializes_as_plain_numbers() {
    let record: InferenceRecord =
        serde_json::from_str(&capture_line("CSV", "1.5,2.0,3.25,7")).unwrap();
    let fields = preprocess_record(&record).unwrap();

    assert_eq!(
        serde_json::to_value(&fields).unwrap(),
        serde_json::json!({"_c0": 1.5, "_c1": 2.0, "_c2": 3.25, "_c3": 7})
    );
}

#[test]
fn test_base64_payload_is_unsupported() {
    let record: InferenceRecord =
        serde_json::from_str(&capture_line("BASE64", "MS4wLDIuMA==")).unwrap();

    let err = preprocess_record(&record).unwrap_err();
    assert!(matches!(err, Error::UnsupportedEncoding(ref encoding) if encoding == "BASE64"));
}

#[test]
fn test_trailing_newline_is_ignored() {
    let record: InferenceRecord =
        serde_json::from_str(&capture_line("CSV", "1.0,2.0,3.0,4\n")).unwrap();
    assert_eq!(preprocess_record(&record).unwrap()["_c3"], FieldValue::Int(4));
}

#[test]
fn test_malformed_capture_line() {
    let err = serde_json::from_str::<InferenceRecord>(r#"{"captureData": {}}"#);
    assert!(err.is_err());
}
