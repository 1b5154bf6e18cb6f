//! Model monitoring helpers.

pub mod record_preprocessor;

pub use record_preprocessor::{
    preprocess_record, CaptureData, CapturedPayload, EventMetadata, FieldValue, InferenceRecord,
};
