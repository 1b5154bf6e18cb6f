//! Filesystem-backed object store.
//!
//! `scheme://bucket/key` maps to `<root>/<bucket>/<key>`; the scheme is not
//! part of the path, so `s3://b/k` and `file://b/k` name the same object.

use super::{ObjectStore, ObjectUri};
use crate::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

/// Object store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path backing `uri`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUri`] if the bucket is not a single directory
    /// name or the key escapes the bucket directory.
    pub fn path_for(&self, uri: &ObjectUri) -> Result<PathBuf> {
        let bucket = Path::new(uri.bucket());
        let key = Path::new(uri.key());
        let mut bucket_parts = bucket.components();
        let bucket_ok = matches!(bucket_parts.next(), Some(Component::Normal(_)))
            && bucket_parts.next().is_none();
        if !bucket_ok
            || key
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(Error::InvalidUri(uri.to_string()));
        }
        Ok(self.root.join(bucket).join(key))
    }
}

/// Write `contents` to `path` through a hidden sibling temp file and a rename.
/// The temp name is unique per write.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::StorageError(format!("{} has no parent", path.display())))?;
    fs::create_dir_all(parent)?;
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("object");
    let tmp = parent.join(format!(".{name}.tmp-{}-{}", std::process::id(), Uuid::new_v4().simple()));

    let written = fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&tmp)
        .and_then(|mut file| {
            file.write_all(contents)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(Error::Io(e));
    }
    Ok(())
}

impl ObjectStore for LocalObjectStore {
    fn get(&self, uri: &ObjectUri) -> Result<Vec<u8>> {
        let path = self.path_for(uri)?;
        fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::ObjectNotFound(uri.to_string()),
            _ => Error::Io(e),
        })
    }

    fn put(&self, uri: &ObjectUri, contents: &[u8]) -> Result<()> {
        write_atomic(&self.path_for(uri)?, contents)
    }

    fn exists(&self, uri: &ObjectUri) -> Result<bool> {
        Ok(self.path_for(uri)?.is_file())
    }
}
