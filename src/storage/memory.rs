//! In-memory object store using `DashMap`.
//!
//! Data is lost on process restart. Used by tests and single-process runs
//! that chain steps without touching disk.

use super::{ObjectStore, ObjectUri};
use crate::{Error, Result};
use dashmap::DashMap;

/// In-memory object store keyed by the full URI string.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, Vec<u8>>,
}

impl MemoryObjectStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// URIs of all stored objects, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get(&self, uri: &ObjectUri) -> Result<Vec<u8>> {
        self.objects
            .get(&uri.to_string())
            .map(|v| v.value().clone())
            .ok_or_else(|| Error::ObjectNotFound(uri.to_string()))
    }

    fn put(&self, uri: &ObjectUri, contents: &[u8]) -> Result<()> {
        self.objects.insert(uri.to_string(), contents.to_vec());
        Ok(())
    }

    fn exists(&self, uri: &ObjectUri) -> Result<bool> {
        Ok(self.objects.contains_key(&uri.to_string()))
    }
}
