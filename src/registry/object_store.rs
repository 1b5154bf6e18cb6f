//! Registry persisted to object storage
//!
//! Layout under the registry prefix:
//!
//! ```text
//! {prefix}/{group}/index.json   every package of the group, oldest first
//! {prefix}/{group}/{version}.json
//! ```

use super::{ModelPackage, ModelPackageRequest, ModelRegistry};
use crate::storage::{join_prefix, ObjectStore};
use crate::{Error, Result};
use chrono::Utc;
use std::sync::{Arc, Mutex};

/// Registry storing packages as JSON objects.
pub struct ObjectStoreRegistry {
    objects: Arc<dyn ObjectStore>,
    prefix: String,
    // Serializes read-modify-write of a group index within this process.
    lock: Mutex<()>,
}

impl ObjectStoreRegistry {
    /// Create a registry under `prefix`.
    #[must_use]
    pub fn new(objects: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            objects,
            prefix: prefix.into(),
            lock: Mutex::new(()),
        }
    }

    fn index_uri(&self, group: &str) -> String {
        join_prefix(&self.prefix, &format!("{group}/index.json"))
    }

    fn read_index(&self, group: &str) -> Result<Vec<ModelPackage>> {
        match self.objects.read(&self.index_uri(group)) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(Error::ObjectNotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

/// Identifier of version `version` in `group`.
#[must_use]
pub fn package_arn(group: &str, version: u32) -> String {
    format!("arn:local:model-registry:::model-package/{group}/{version}")
}

impl ModelRegistry for ObjectStoreRegistry {
    fn register(&self, request: &ModelPackageRequest) -> Result<ModelPackage> {
        let group = request.model_package_group_name.as_str();
        if group.is_empty() || group.contains('/') {
            return Err(Error::Registry(format!("invalid package group name `{group}`")));
        }
        if request.training_job_name.is_empty() {
            return Err(Error::Registry("training job name is empty".to_string()));
        }

        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::Registry("registry lock poisoned".to_string()))?;

        let mut packages = self.read_index(group)?;
        let version = packages.last().map_or(1, |p| p.version + 1);
        let package = ModelPackage {
            model_package_arn: package_arn(group, version),
            model_package_group_name: group.to_string(),
            version,
            approval_status: request.approval_status,
            registered_at: Utc::now(),
            request: request.clone(),
        };

        self.objects.write(
            &join_prefix(&self.prefix, &format!("{group}/{version}.json")),
            &serde_json::to_vec_pretty(&package)?,
        )?;
        packages.push(package.clone());
        self.objects
            .write(&self.index_uri(group), &serde_json::to_vec_pretty(&packages)?)?;

        tracing::info!(
            group,
            version,
            approval = %package.approval_status,
            arn = %package.model_package_arn,
            "registered model package"
        );
        Ok(package)
    }

    fn list_packages(&self, group: &str) -> Result<Vec<ModelPackage>> {
        self.read_index(group)
    }
}
