//! Error types for pipeline-steps
//!
//! One enum covers every collaborator a step talks to. Transient service
//! failures and data errors share it: a step either produces its full result
//! or propagates one of these unchanged.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// pipeline-steps error types
#[derive(Error, Debug)]
pub enum Error {
    /// Object storage read/write failed
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Object does not exist at the given URI
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Malformed object storage URI
    #[error("Invalid object URI `{0}`: expected scheme://bucket/key")]
    InvalidUri(String),

    /// Tracking backend rejected or failed a call
    #[error("Tracking error: {0}")]
    Tracking(String),

    /// Referenced run is unknown to the tracking backend
    #[error("Run not found: {0}")]
    RunNotFound(String),

    /// Feature store query failed
    #[error("Feature store error: {0}")]
    FeatureStore(String),

    /// Model archive could not be loaded or scored
    #[error("Model error: {0}")]
    Model(String),

    /// Model registry submission failed
    #[error("Registry error: {0}")]
    Registry(String),

    /// Table is missing a column or has an unexpected type
    #[error("Schema error: {0}")]
    Schema(String),

    /// Captured inference record uses an encoding other than CSV
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// Caller supplied invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error (CSV decode/encode, compute kernels)
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Model archive error
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// HTTP transport error (boxed: `ureq::Error` is large)
    #[error("HTTP error: {0}")]
    Http(Box<ureq::Error>),
}

impl From<ureq::Error> for Error {
    fn from(error: ureq::Error) -> Self {
        Self::Http(Box::new(error))
    }
}
