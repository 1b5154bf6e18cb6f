//! Runtime configuration
//!
//! Layered with `figment`, highest priority first:
//!
//! 1. Environment variables prefixed with `PIPELINE_STEPS_`
//!    (`PIPELINE_STEPS_REGISTRY__MODEL_NAME`, `PIPELINE_STEPS_STORAGE_ROOT`, ...)
//! 2. The TOML file passed to [`PipelineConfig::load`], if it exists
//! 3. Built-in defaults

use crate::registry::RegistrySettings;
use crate::{Error, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "PIPELINE_STEPS_";

/// Collaborator settings shared by every step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory backing `scheme://bucket/key` objects
    pub storage_root: PathBuf,
    /// Tracking endpoint used when a step input names none
    pub tracking_endpoint: String,
    /// Object prefix of the offline feature store
    pub feature_store_prefix: String,
    /// Object prefix of the model registry
    pub registry_prefix: String,
    /// Settings recorded on every model package
    pub registry: RegistrySettings,
    /// Default log filter, overridden by `RUST_LOG`
    pub log_filter: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("objects"),
            tracking_endpoint: "file://mlruns".to_string(),
            feature_store_prefix: "s3://feature-store/offline".to_string(),
            registry_prefix: "s3://model-registry/packages".to_string(),
            registry: RegistrySettings::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load defaults, then `file` (if given and present), then the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a source is malformed.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file.filter(|f| f.exists()) {
            figment = figment.merge(Toml::file(file));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }
}
