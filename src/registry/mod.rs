//! Model registry
//!
//! A model package is a versioned, approvable record of a trained model and
//! its deployment metadata. Packages are grouped by name; each registration
//! in a group gets the next version number, starting at 1.

mod object_store;

pub use object_store::ObjectStoreRegistry;

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Content type of every metrics source.
pub const METRICS_CONTENT_TYPE: &str = "application/json";

/// Approval state a package is registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalStatus {
    /// Cleared for deployment
    Approved,
    /// Waiting on a reviewer
    PendingManualApproval,
    /// Not to be deployed
    Rejected,
}

impl ApprovalStatus {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "Approved",
            Self::PendingManualApproval => "PendingManualApproval",
            Self::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Approved" => Ok(Self::Approved),
            "PendingManualApproval" => Ok(Self::PendingManualApproval),
            "Rejected" => Ok(Self::Rejected),
            other => Err(Error::InvalidInput(format!(
                "unknown approval status `{other}`"
            ))),
        }
    }
}

/// Location of a statistics or constraints document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSource {
    /// Object URI
    pub s3_uri: String,
    /// Media type of the document
    pub content_type: String,
}

impl MetricsSource {
    /// JSON document at `s3_uri`.
    #[must_use]
    pub fn json(s3_uri: impl Into<String>) -> Self {
        Self {
            s3_uri: s3_uri.into(),
            content_type: METRICS_CONTENT_TYPE.to_string(),
        }
    }
}

/// Optional monitoring baselines attached to a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Model quality statistics
    pub model_statistics: Option<MetricsSource>,
    /// Model quality constraints
    pub model_constraints: Option<MetricsSource>,
    /// Data quality statistics
    pub model_data_statistics: Option<MetricsSource>,
    /// Data quality constraints
    pub model_data_constraints: Option<MetricsSource>,
}

impl ModelMetrics {
    /// Build from optional URIs; an absent or empty URI leaves the slot empty.
    #[must_use]
    pub fn from_uris(
        model_statistics: Option<&str>,
        model_constraints: Option<&str>,
        model_data_statistics: Option<&str>,
        model_data_constraints: Option<&str>,
    ) -> Self {
        let source = |uri: Option<&str>| uri.filter(|u| !u.is_empty()).map(MetricsSource::json);
        Self {
            model_statistics: source(model_statistics),
            model_constraints: source(model_constraints),
            model_data_statistics: source(model_data_statistics),
            model_data_constraints: source(model_data_constraints),
        }
    }
}

/// Deployment settings shared by every registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Accepted request media types
    pub content_types: Vec<String>,
    /// Produced response media types
    pub response_types: Vec<String>,
    /// Instance classes allowed for real-time inference
    pub inference_instances: Vec<String>,
    /// Instance classes allowed for batch transform
    pub transform_instances: Vec<String>,
    /// Model name recorded on the package
    pub model_name: String,
    /// ML domain
    pub domain: String,
    /// ML task
    pub task: String,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        let instances = vec!["ml.m5.xlarge".to_string(), "ml.m5.large".to_string()];
        Self {
            content_types: vec!["text/csv".to_string()],
            response_types: vec!["text/csv".to_string()],
            inference_instances: instances.clone(),
            transform_instances: instances,
            model_name: "from-idea-to-prod-pipeline-model".to_string(),
            domain: "MACHINE_LEARNING".to_string(),
            task: "CLASSIFICATION".to_string(),
        }
    }
}

/// One registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPackageRequest {
    /// Training job that produced the model
    pub training_job_name: String,
    /// Package group
    pub model_package_group_name: String,
    /// Initial approval state
    pub approval_status: ApprovalStatus,
    /// Monitoring baselines
    pub model_metrics: ModelMetrics,
    /// Deployment settings
    #[serde(flatten)]
    pub settings: RegistrySettings,
}

/// A registered package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPackage {
    /// Package identifier
    pub model_package_arn: String,
    /// Package group
    pub model_package_group_name: String,
    /// Version within the group, from 1
    pub version: u32,
    /// Approval state
    pub approval_status: ApprovalStatus,
    /// Registration time
    pub registered_at: DateTime<Utc>,
    /// What was submitted
    pub request: ModelPackageRequest,
}

/// Registry accepting model packages.
pub trait ModelRegistry: Send + Sync {
    /// Register a new package version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Registry`] if the request is rejected, or the backend error.
    fn register(&self, request: &ModelPackageRequest) -> Result<ModelPackage>;

    /// Every package in `group`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    fn list_packages(&self, group: &str) -> Result<Vec<ModelPackage>>;
}
