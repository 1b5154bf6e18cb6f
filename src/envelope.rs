//! Tracked step envelope
//!
//! Every pipeline step runs its body inside the same protocol:
//!
//! 1. derive a `DD-HH-MM-SS` (UTC) suffix for default names
//! 2. connect a tracker for the step's endpoint (a handle, never global state)
//! 3. resolve or create the experiment (`<step>-<suffix>` by default)
//! 4. resolve the [`RunContext`]: resume the parent run by id, create it by
//!    name, or run standalone
//! 5. resume the step run by id, or create `<run-prefix>-<suffix>` nested
//!    under the parent
//! 6. run the body with a [`StepContext`] for logging
//! 7. close the step run exactly once, `Success` or `Failed`, on every exit
//!    path including panics
//!
//! The parent run belongs to the pipeline and is left open.
//!
//! ```rust
//! use pipeline_steps::envelope::{StepEnvelope, StepInput, StepKind};
//! use pipeline_steps::tracking::DefaultConnector;
//!
//! let input = StepInput::builder("memory:").experiment_name("bank").build();
//! let result = StepEnvelope::new(StepKind::Evaluate)
//!     .run(&input, &DefaultConnector, |ctx| {
//!         ctx.log_metric("auc_score", 0.91)?;
//!         Ok(0.91)
//!     })
//!     .unwrap();
//!
//! assert_eq!(result.outputs, 0.91);
//! assert_eq!(result.experiment_name, "bank");
//! assert_eq!(result.pipeline_run_id, "");
//! ```

use crate::experiment::{ArtifactRecord, DatasetRef, ParamValue, RunStatus};
use crate::tracking::{RunRequest, Tracker, TrackerConnector};
use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The four pipeline steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// Feature-store extraction and split
    PrepareDatasets,
    /// Raw CSV feature engineering and split
    Preprocess,
    /// Model scoring and ROC/AUC
    Evaluate,
    /// Model registry submission
    Register,
}

impl StepKind {
    /// Step name, used for default experiment names.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PrepareDatasets => "prepare_datasets",
            Self::Preprocess => "preprocess",
            Self::Evaluate => "evaluate",
            Self::Register => "register",
        }
    }

    /// Prefix of default run names.
    #[must_use]
    pub const fn run_prefix(self) -> &'static str {
        match self {
            Self::PrepareDatasets => "feature-extraction",
            Self::Preprocess => "processing",
            Self::Evaluate => "evaluate",
            Self::Register => "register",
        }
    }
}

/// Pipeline-level run a step nests under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentRun {
    /// Existing run, resumed by id
    Id(String),
    /// New run created with this name
    Name(String),
}

/// Tracking configuration of one step invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInput {
    /// Tracking endpoint (see [`crate::tracking::connect`])
    pub tracking_endpoint: String,
    /// Experiment to log into; defaults to `<step>-<suffix>`
    #[serde(default)]
    pub experiment_name: Option<String>,
    /// Pipeline run to nest under
    #[serde(default)]
    pub parent: Option<ParentRun>,
    /// Step run to resume instead of creating one
    #[serde(default)]
    pub run_id: Option<String>,
}

impl StepInput {
    /// Builder for an input tracking to `tracking_endpoint`.
    #[must_use]
    pub fn builder(tracking_endpoint: impl Into<String>) -> StepInputBuilder {
        StepInputBuilder {
            input: Self {
                tracking_endpoint: tracking_endpoint.into(),
                experiment_name: None,
                parent: None,
                run_id: None,
            },
        }
    }
}

/// Builder for [`StepInput`].
#[derive(Debug)]
pub struct StepInputBuilder {
    input: StepInput,
}

impl StepInputBuilder {
    /// Log into this experiment.
    #[must_use]
    pub fn experiment_name(mut self, name: impl Into<String>) -> Self {
        self.input.experiment_name = Some(name.into());
        self
    }

    /// Nest under an existing pipeline run.
    #[must_use]
    pub fn parent_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.input.parent = Some(ParentRun::Id(run_id.into()));
        self
    }

    /// Nest under a new pipeline run with this name.
    #[must_use]
    pub fn parent_run_name(mut self, name: impl Into<String>) -> Self {
        self.input.parent = Some(ParentRun::Name(name.into()));
        self
    }

    /// Resume this step run.
    #[must_use]
    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.input.run_id = Some(run_id.into());
        self
    }

    /// Build the input.
    #[must_use]
    pub fn build(self) -> StepInput {
        self.input
    }
}

/// Where the step run sits, resolved once at entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunContext {
    /// No pipeline run
    Standalone,
    /// Nested under the pipeline run with this id
    NestedUnder(String),
}

impl RunContext {
    /// Parent run id, if nested.
    #[must_use]
    pub fn parent_run_id(&self) -> Option<&str> {
        match self {
            Self::Standalone => None,
            Self::NestedUnder(id) => Some(id),
        }
    }
}

/// Result of a successful step.
///
/// `outputs` is flattened when serialized, so a step's output locations sit
/// next to the tracking identifiers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult<T> {
    /// Step-specific outputs
    #[serde(flatten)]
    pub outputs: T,
    /// Experiment the step logged into
    pub experiment_name: String,
    /// Parent run id; empty when the step ran standalone
    pub pipeline_run_id: String,
    /// The step's own run
    pub run_id: String,
}

/// A failed step: the underlying error, unchanged, plus where it happened.
#[derive(Debug, thiserror::Error)]
#[error("step `{step}` failed: {source}")]
pub struct StepError {
    step: &'static str,
    run_id: Option<String>,
    #[source]
    source: Error,
}

impl StepError {
    /// Step name.
    #[must_use]
    pub const fn step(&self) -> &'static str {
        self.step
    }

    /// Step run id, if the run was opened before the failure.
    #[must_use]
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// The underlying error.
    #[must_use]
    pub const fn cause(&self) -> &Error {
        &self.source
    }

    /// Take the underlying error.
    #[must_use]
    pub fn into_cause(self) -> Error {
        self.source
    }
}

/// `DD-HH-MM-SS` of `now`.
#[must_use]
pub fn time_suffix(now: DateTime<Utc>) -> String {
    now.format("%d-%H-%M-%S").to_string()
}

/// Handle the step body logs through. Every call targets the step run.
pub struct StepContext<'a> {
    tracker: &'a dyn Tracker,
    step: StepKind,
    experiment_name: &'a str,
    run_id: &'a str,
    run_context: &'a RunContext,
}

impl StepContext<'_> {
    /// Which step is running.
    #[must_use]
    pub const fn step(&self) -> StepKind {
        self.step
    }

    /// The step run id.
    #[must_use]
    pub const fn run_id(&self) -> &str {
        self.run_id
    }

    /// Experiment name.
    #[must_use]
    pub const fn experiment_name(&self) -> &str {
        self.experiment_name
    }

    /// Parent run, if any.
    #[must_use]
    pub const fn run_context(&self) -> &RunContext {
        self.run_context
    }

    /// Tracker the step logs to.
    #[must_use]
    pub fn tracker(&self) -> &dyn Tracker {
        self.tracker
    }

    /// Log a parameter.
    ///
    /// # Errors
    ///
    /// Returns the tracker error.
    pub fn log_param(&self, key: &str, value: impl Into<ParamValue>) -> crate::Result<()> {
        self.tracker.log_param(self.run_id, key, &value.into())
    }

    /// Log several parameters.
    ///
    /// # Errors
    ///
    /// Returns the tracker error.
    pub fn log_params(&self, params: &[(&str, ParamValue)]) -> crate::Result<()> {
        self.tracker.log_params(self.run_id, params)
    }

    /// Log a metric.
    ///
    /// # Errors
    ///
    /// Returns the tracker error.
    pub fn log_metric(&self, key: &str, value: f64) -> crate::Result<()> {
        self.tracker.log_metric(self.run_id, key, value)
    }

    /// Log a file artifact.
    ///
    /// # Errors
    ///
    /// Returns the tracker error.
    pub fn log_artifact(&self, name: &str, contents: &[u8]) -> crate::Result<ArtifactRecord> {
        self.tracker.log_artifact(self.run_id, name, contents)
    }

    /// Log a consumed dataset.
    ///
    /// # Errors
    ///
    /// Returns the tracker error.
    pub fn log_input(&self, dataset: &DatasetRef, context: &str) -> crate::Result<()> {
        self.tracker.log_input(self.run_id, dataset, context)
    }
}

/// Closes the step run once. Dropping an unclosed guard (a panicking body)
/// closes the run as failed.
struct RunGuard<'a> {
    tracker: &'a dyn Tracker,
    run_id: &'a str,
    closed: bool,
}

impl<'a> RunGuard<'a> {
    const fn new(tracker: &'a dyn Tracker, run_id: &'a str) -> Self {
        Self {
            tracker,
            run_id,
            closed: false,
        }
    }

    fn close(mut self, status: RunStatus) -> crate::Result<()> {
        self.closed = true;
        self.tracker.end_run(self.run_id, status)
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.tracker.end_run(self.run_id, RunStatus::Failed) {
                tracing::warn!(run_id = self.run_id, error = %e, "failed to close run");
            }
        }
    }
}

/// Runs step bodies inside the tracking protocol.
#[derive(Debug, Clone, Copy)]
pub struct StepEnvelope {
    kind: StepKind,
    now: Option<DateTime<Utc>>,
}

impl StepEnvelope {
    /// Envelope for `kind`, naming runs after the current time.
    #[must_use]
    pub const fn new(kind: StepKind) -> Self {
        Self { kind, now: None }
    }

    /// Name runs after `now` instead of the current time.
    #[must_use]
    pub const fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Run `body` as this step.
    ///
    /// # Errors
    ///
    /// Returns a [`StepError`] wrapping the first error from the tracker or
    /// the body. The body's error is passed through unchanged.
    pub fn run<T, F>(
        &self,
        input: &StepInput,
        connector: &dyn TrackerConnector,
        body: F,
    ) -> Result<StepResult<T>, StepError>
    where
        F: FnOnce(&StepContext<'_>) -> crate::Result<T>,
    {
        let step = self.kind.name();
        let fail = |run_id: Option<&str>, source: Error| {
            tracing::error!(step, run_id, error = %source, "exception in step");
            StepError {
                step,
                run_id: run_id.map(str::to_string),
                source,
            }
        };

        let suffix = time_suffix(self.now.unwrap_or_else(Utc::now));
        let tracker: Arc<dyn Tracker> = connector
            .connect(&input.tracking_endpoint)
            .map_err(|e| fail(None, e))?;

        let experiment_name = input
            .experiment_name
            .clone()
            .unwrap_or_else(|| format!("{step}-{suffix}"));
        let experiment = tracker
            .set_experiment(&experiment_name)
            .map_err(|e| fail(None, e))?;

        let run_context = match &input.parent {
            None => RunContext::Standalone,
            Some(ParentRun::Id(run_id)) => {
                let resume = RunRequest::Resume {
                    run_id: run_id.clone(),
                };
                tracker
                    .start_run(experiment.experiment_id(), &resume)
                    .map_err(|e| fail(None, e))?;
                RunContext::NestedUnder(run_id.clone())
            }
            Some(ParentRun::Name(run_name)) => {
                let create = RunRequest::Create {
                    run_name: run_name.clone(),
                    parent_run_id: None,
                };
                let parent = tracker
                    .start_run(experiment.experiment_id(), &create)
                    .map_err(|e| fail(None, e))?;
                RunContext::NestedUnder(parent.run_id().to_string())
            }
        };

        let request = match &input.run_id {
            Some(run_id) => RunRequest::Resume {
                run_id: run_id.clone(),
            },
            None => RunRequest::Create {
                run_name: format!("{}-{suffix}", self.kind.run_prefix()),
                parent_run_id: run_context.parent_run_id().map(str::to_string),
            },
        };
        let run = tracker
            .start_run(experiment.experiment_id(), &request)
            .map_err(|e| fail(None, e))?;
        let run_id = run.run_id();

        tracing::info!(
            step,
            run_id,
            experiment = experiment.name(),
            parent = run_context.parent_run_id().unwrap_or_default(),
            "step started"
        );

        let guard = RunGuard::new(tracker.as_ref(), run_id);
        let ctx = StepContext {
            tracker: tracker.as_ref(),
            step: self.kind,
            experiment_name: experiment.name(),
            run_id,
            run_context: &run_context,
        };

        match body(&ctx) {
            Ok(outputs) => {
                guard
                    .close(RunStatus::Success)
                    .map_err(|e| fail(Some(run_id), e))?;
                tracing::info!(step, run_id, "step finished");
                Ok(StepResult {
                    outputs,
                    experiment_name: experiment.name().to_string(),
                    pipeline_run_id: run_context
                        .parent_run_id()
                        .unwrap_or_default()
                        .to_string(),
                    run_id: run_id.to_string(),
                })
            }
            Err(error) => {
                let error = fail(Some(run_id), error);
                if let Err(close_error) = guard.close(RunStatus::Failed) {
                    tracing::warn!(step, run_id, error = %close_error, "failed to close run");
                }
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_suffix_format() {
        let now = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        assert_eq!(time_suffix(now), "07-09-05-02");
    }

    #[test]
    fn test_step_names() {
        assert_eq!(StepKind::PrepareDatasets.name(), "prepare_datasets");
        assert_eq!(StepKind::PrepareDatasets.run_prefix(), "feature-extraction");
        assert_eq!(StepKind::Preprocess.run_prefix(), "processing");
    }

    #[test]
    fn test_builder_last_parent_wins() {
        let input = StepInput::builder("memory:")
            .parent_run_name("pipeline")
            .parent_run_id("abc")
            .build();
        assert_eq!(input.parent, Some(ParentRun::Id("abc".to_string())));
    }

    #[test]
    fn test_run_context_parent() {
        assert_eq!(RunContext::Standalone.parent_run_id(), None);
        assert_eq!(
            RunContext::NestedUnder("p".to_string()).parent_run_id(),
            Some("p")
        );
    }
}
