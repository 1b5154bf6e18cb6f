//! Artifact Record - content-addressed files logged by a run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Artifact Record represents a file logged against a run.
///
/// The `cas_hash` follows the format `algorithm:hex_digest`, e.g.
/// `sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855`.
/// `location` is where the backend put the bytes (a path or URL).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    run_id: String,
    name: String,
    cas_hash: String,
    size_bytes: u64,
    location: String,
    created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Describe `contents` logged as `name` and stored at `location`.
    #[must_use]
    pub fn from_contents(
        run_id: impl Into<String>,
        name: impl Into<String>,
        contents: &[u8],
        location: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            name: name.into(),
            cas_hash: sha256_cas(contents),
            size_bytes: contents.len() as u64,
            location: location.into(),
            created_at: Utc::now(),
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the artifact file name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the content-addressable hash.
    #[must_use]
    pub fn cas_hash(&self) -> &str {
        &self.cas_hash
    }

    /// Get the artifact size in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Get where the backend stored the artifact.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// `sha256:<hex>` content hash.
#[must_use]
pub fn sha256_cas(contents: &[u8]) -> String {
    format!("sha256:{}", sha256_hex(contents))
}

/// Lowercase hex sha256 digest.
#[must_use]
pub fn sha256_hex(contents: &[u8]) -> String {
    Sha256::digest(contents)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
