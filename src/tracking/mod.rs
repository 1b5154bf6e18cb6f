//! Experiment tracking clients
//!
//! A [`Tracker`] is a handle bound to one tracking endpoint. Steps receive
//! the handle explicitly; nothing about the endpoint is process-wide, so two
//! steps in one process may track to different servers at the same time.
//!
//! Endpoints:
//!
//! | Endpoint                     | Backend                                 |
//! |------------------------------|-----------------------------------------|
//! | `http://…`, `https://…`      | [`MlflowTracker`] (MLflow REST API)     |
//! | `file:///path/to/dir`        | [`LocalTracker`] persisted under the dir|
//! | `memory:`                    | [`LocalTracker`] held in memory         |

mod local;
mod mlflow;

pub use local::LocalTracker;
pub use mlflow::MlflowTracker;

use crate::experiment::{ArtifactRecord, DatasetRef, ExperimentRecord, ParamValue, RunRecord, RunStatus};
use crate::{Error, Result};
use std::sync::Arc;

/// Endpoint selecting an in-memory [`LocalTracker`].
pub const MEMORY_ENDPOINT: &str = "memory:";

/// How a run is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunRequest {
    /// Reopen an existing run.
    Resume {
        /// Run to reopen
        run_id: String,
    },
    /// Create a fresh run.
    Create {
        /// Display name
        run_name: String,
        /// Run to nest under
        parent_run_id: Option<String>,
    },
}

/// Client for one tracking endpoint.
///
/// Every call blocks until the backend acknowledged it.
pub trait Tracker: Send + Sync {
    /// Endpoint this client talks to.
    fn endpoint(&self) -> &str;

    /// Find the experiment called `name`, creating it if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tracking`] or the transport error.
    fn set_experiment(&self, name: &str) -> Result<ExperimentRecord>;

    /// Open a run in `experiment_id` and mark it running.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RunNotFound`] when resuming (or nesting under) an
    /// unknown run, or the backend error.
    fn start_run(&self, experiment_id: &str, request: &RunRequest) -> Result<RunRecord>;

    /// Record a parameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RunNotFound`] or the backend error.
    fn log_param(&self, run_id: &str, key: &str, value: &ParamValue) -> Result<()>;

    /// Record several parameters, in order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing parameter and returns its error.
    fn log_params(&self, run_id: &str, params: &[(&str, ParamValue)]) -> Result<()> {
        for (key, value) in params {
            self.log_param(run_id, key, value)?;
        }
        Ok(())
    }

    /// Record a metric value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RunNotFound`] or the backend error.
    fn log_metric(&self, run_id: &str, key: &str, value: f64) -> Result<()>;

    /// Store `contents` as an artifact file called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `name` is not a plain file name,
    /// [`Error::RunNotFound`], or the backend error.
    fn log_artifact(&self, run_id: &str, name: &str, contents: &[u8]) -> Result<ArtifactRecord>;

    /// Record that the run consumed `dataset`, tagged with `context`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RunNotFound`] or the backend error.
    fn log_input(&self, run_id: &str, dataset: &DatasetRef, context: &str) -> Result<()>;

    /// Close the run with a final status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RunNotFound`] or the backend error.
    fn end_run(&self, run_id: &str, status: RunStatus) -> Result<()>;
}

/// Builds tracker handles for endpoints.
pub trait TrackerConnector: Send + Sync {
    /// Handle for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not supported or unreachable.
    fn connect(&self, endpoint: &str) -> Result<Arc<dyn Tracker>>;
}

impl<F> TrackerConnector for F
where
    F: Fn(&str) -> Result<Arc<dyn Tracker>> + Send + Sync,
{
    fn connect(&self, endpoint: &str) -> Result<Arc<dyn Tracker>> {
        self(endpoint)
    }
}

/// Connector choosing the backend by endpoint scheme; see [`connect`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConnector;

impl TrackerConnector for DefaultConnector {
    fn connect(&self, endpoint: &str) -> Result<Arc<dyn Tracker>> {
        connect(endpoint)
    }
}

/// Open a tracker for `endpoint`.
///
/// Each `memory:` connection is a separate, empty store.
///
/// # Errors
///
/// Returns [`Error::Tracking`] for ARN endpoints and [`Error::InvalidInput`]
/// for any other unsupported scheme.
pub fn connect(endpoint: &str) -> Result<Arc<dyn Tracker>> {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(Arc::new(MlflowTracker::new(endpoint)))
    } else if let Some(path) = endpoint.strip_prefix("file://") {
        Ok(Arc::new(LocalTracker::open(path)?))
    } else if endpoint == MEMORY_ENDPOINT {
        Ok(Arc::new(LocalTracker::in_memory()))
    } else if endpoint.starts_with("arn:") {
        Err(Error::Tracking(format!(
            "`{endpoint}` is a managed server ARN; pass the server's HTTPS URL instead"
        )))
    } else {
        Err(Error::InvalidInput(format!(
            "unsupported tracking endpoint `{endpoint}`"
        )))
    }
}

/// Reject artifact names that are not a single path segment.
pub(crate) fn check_artifact_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(Error::InvalidInput(format!(
            "artifact name `{name}` must be a plain file name"
        )));
    }
    Ok(())
}
