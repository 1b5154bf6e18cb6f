//! Run Record - one step execution inside an experiment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ParamValue;

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run is created but not yet started.
    Pending,
    /// Run is currently executing.
    Running,
    /// Run completed successfully.
    Success,
    /// Run failed with an error.
    Failed,
    /// Run was cancelled by user or system.
    Cancelled,
}

impl RunStatus {
    /// Whether the run can no longer change state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }

    /// Status name as understood by the MLflow REST API.
    #[must_use]
    pub const fn as_mlflow(self) -> &'static str {
        match self {
            Self::Pending => "SCHEDULED",
            Self::Running => "RUNNING",
            Self::Success => "FINISHED",
            Self::Failed => "FAILED",
            Self::Cancelled => "KILLED",
        }
    }

    /// Parse an MLflow status name.
    #[must_use]
    pub fn from_mlflow(status: &str) -> Option<Self> {
        match status {
            "SCHEDULED" => Some(Self::Pending),
            "RUNNING" => Some(Self::Running),
            "FINISHED" => Some(Self::Success),
            "FAILED" => Some(Self::Failed),
            "KILLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Run Record represents a single execution of a pipeline step.
///
/// A run optionally nests under a parent run (the pipeline-level run) and
/// carries the parameters logged against it. Metrics, artifacts and inputs are
/// kept by the [`ExperimentStore`](super::ExperimentStore) keyed by run ID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    run_id: String,
    experiment_id: String,
    run_name: Option<String>,
    parent_run_id: Option<String>,
    status: RunStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    params: BTreeMap<String, ParamValue>,
}

impl RunRecord {
    /// Create a new run record in Pending status.
    #[must_use]
    pub fn new(run_id: impl Into<String>, experiment_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            experiment_id: experiment_id.into(),
            run_name: None,
            parent_run_id: None,
            status: RunStatus::Pending,
            started_at: None,
            ended_at: None,
            params: BTreeMap::new(),
        }
    }

    /// Create a builder for constructing a run record with optional fields.
    #[must_use]
    pub fn builder(
        run_id: impl Into<String>,
        experiment_id: impl Into<String>,
    ) -> RunRecordBuilder {
        RunRecordBuilder::new(run_id, experiment_id)
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the parent experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the run name, if one was given.
    #[must_use]
    pub fn run_name(&self) -> Option<&str> {
        self.run_name.as_deref()
    }

    /// Get the ID of the run this one is nested under.
    #[must_use]
    pub fn parent_run_id(&self) -> Option<&str> {
        self.parent_run_id.as_deref()
    }

    /// Get the current run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the start timestamp, if the run has started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Get the end timestamp, if the run has completed.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Get the parameters logged so far.
    #[must_use]
    pub const fn params(&self) -> &BTreeMap<String, ParamValue> {
        &self.params
    }

    /// Record a parameter, overwriting any previous value for the key.
    pub fn set_param(&mut self, key: impl Into<String>, value: ParamValue) {
        self.params.insert(key.into(), value);
    }

    /// Start (or resume) the run.
    ///
    /// Resuming keeps the original `started_at` and clears any end marker.
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.ended_at = None;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    /// Complete the run with the given final status.
    ///
    /// Returns `false` without touching the record when the run already
    /// reached a terminal status.
    pub fn complete(&mut self, status: RunStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.ended_at = Some(Utc::now());
        true
    }
}

/// Builder for `RunRecord`.
#[derive(Debug)]
pub struct RunRecordBuilder {
    record: RunRecord,
}

impl RunRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(run_id: impl Into<String>, experiment_id: impl Into<String>) -> Self {
        Self {
            record: RunRecord::new(run_id, experiment_id),
        }
    }

    /// Set the run name.
    #[must_use]
    pub fn run_name(mut self, name: impl Into<String>) -> Self {
        self.record.run_name = Some(name.into());
        self
    }

    /// Nest the run under a parent run.
    #[must_use]
    pub fn parent_run_id(mut self, parent_run_id: impl Into<String>) -> Self {
        self.record.parent_run_id = Some(parent_run_id.into());
        self
    }

    /// Set the status reported by a remote backend.
    #[must_use]
    pub const fn status(mut self, status: RunStatus) -> Self {
        self.record.status = status;
        self
    }

    /// Set the start timestamp reported by a remote backend.
    #[must_use]
    pub const fn started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.record.started_at = Some(started_at);
        self
    }

    /// Build the `RunRecord`.
    #[must_use]
    pub fn build(self) -> RunRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_default() {
        let run = RunRecord::new("run-1", "exp-1");
        assert_eq!(run.status(), RunStatus::Pending);
    }

    #[test]
    fn test_run_lifecycle() {
        let mut run = RunRecord::new("run-1", "exp-1");
        run.start();
        assert_eq!(run.status(), RunStatus::Running);
        assert!(run.complete(RunStatus::Success));
        assert_eq!(run.status(), RunStatus::Success);
    }

    #[test]
    fn test_complete_is_idempotent() {
        let mut run = RunRecord::new("run-1", "exp-1");
        run.start();
        assert!(run.complete(RunStatus::Failed));
        let ended = run.ended_at();

        assert!(!run.complete(RunStatus::Success));
        assert_eq!(run.status(), RunStatus::Failed);
        assert_eq!(run.ended_at(), ended);
    }

    #[test]
    fn test_resume_keeps_start_time() {
        let mut run = RunRecord::new("run-1", "exp-1");
        run.start();
        let started = run.started_at();
        run.start();
        assert_eq!(run.started_at(), started);
    }

    #[test]
    fn test_mlflow_status_names() {
        assert_eq!(RunStatus::Success.as_mlflow(), "FINISHED");
        assert_eq!(RunStatus::Failed.as_mlflow(), "FAILED");
        assert_eq!(RunStatus::Cancelled.as_mlflow(), "KILLED");
        assert_eq!(RunStatus::from_mlflow("RUNNING"), Some(RunStatus::Running));
        assert_eq!(RunStatus::from_mlflow("UNKNOWN"), None);
    }
}
