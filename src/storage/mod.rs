//! Object storage
//!
//! Steps hand each other data as whole objects addressed by
//! `scheme://bucket/key` URIs. Everything a step writes is complete when the
//! write returns: the filesystem store renames a fully written temp file into
//! place, the memory store swaps the entry.

mod local;
mod memory;

pub use local::LocalObjectStore;
pub(crate) use local::write_atomic;
pub use memory::MemoryObjectStore;

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Parsed `scheme://bucket/key` location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUri {
    scheme: String,
    bucket: String,
    key: String,
}

impl ObjectUri {
    /// Parse a URI of the form `scheme://bucket/key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUri`] when the scheme, bucket or key is missing,
    /// or the bucket is `.` or `..`.
    pub fn parse(uri: &str) -> Result<Self> {
        let invalid = || Error::InvalidUri(uri.to_string());
        let (scheme, rest) = uri.split_once("://").ok_or_else(invalid)?;
        let (bucket, key) = rest.split_once('/').ok_or_else(invalid)?;
        let key = key.trim_start_matches('/');
        if scheme.is_empty() || matches!(bucket, "" | "." | "..") || key.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            scheme: scheme.to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// URI scheme (`s3`, `file`, ...).
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key inside the bucket.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Last path segment of the key.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    /// Append a relative path to the key.
    #[must_use]
    pub fn join(&self, relative: &str) -> Self {
        Self {
            scheme: self.scheme.clone(),
            bucket: self.bucket.clone(),
            key: format!(
                "{}/{}",
                self.key.trim_end_matches('/'),
                relative.trim_start_matches('/')
            ),
        }
    }
}

impl fmt::Display for ObjectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key)
    }
}

impl FromStr for ObjectUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Join an output prefix and a relative path the way step outputs are named:
/// `{prefix}/{relative}`.
#[must_use]
pub fn join_prefix(prefix: &str, relative: &str) -> String {
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

/// Whole-object storage used by every step.
///
/// Calls block until the object is fully read or written.
pub trait ObjectStore: Send + Sync {
    /// Read a whole object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ObjectNotFound`] if nothing is stored at `uri`, or the
    /// backend's IO error.
    fn get(&self, uri: &ObjectUri) -> Result<Vec<u8>>;

    /// Write a whole object, replacing any previous contents.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the write fails.
    fn put(&self, uri: &ObjectUri, contents: &[u8]) -> Result<()>;

    /// Check whether an object exists.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if existence cannot be determined.
    fn exists(&self, uri: &ObjectUri) -> Result<bool>;

    /// Parse `uri` and read it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUri`] or the error of [`ObjectStore::get`].
    fn read(&self, uri: &str) -> Result<Vec<u8>> {
        let uri = ObjectUri::parse(uri)?;
        tracing::debug!(uri = %uri, "reading object");
        self.get(&uri)
    }

    /// Parse `uri` and write `contents` to it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUri`] or the error of [`ObjectStore::put`].
    fn write(&self, uri: &str, contents: &[u8]) -> Result<()> {
        let uri = ObjectUri::parse(uri)?;
        tracing::debug!(uri = %uri, bytes = contents.len(), "writing object");
        self.put(&uri, contents)
    }
}
