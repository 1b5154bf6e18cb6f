//! Experiment Store - in-memory storage for experiment tracking data
//!
//! Backs the local tracking client. The whole store serializes to one JSON
//! document, which is how the file-backed tracker persists it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{ArtifactRecord, ExperimentRecord, InputRecord, MetricRecord, RunRecord};

/// In-memory store for experiment tracking data.
///
/// Hash maps give O(1) lookups by ID; metrics, artifacts and inputs are kept
/// as append-only vectors filtered per run.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ExperimentStore {
    experiments: HashMap<String, ExperimentRecord>,
    runs: HashMap<String, RunRecord>,
    metrics: Vec<MetricRecord>,
    #[serde(default)]
    artifacts: Vec<ArtifactRecord>,
    #[serde(default)]
    inputs: Vec<InputRecord>,
}

impl ExperimentStore {
    /// Create a new empty experiment store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the store is empty (no experiments, runs, or metrics).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty() && self.runs.is_empty() && self.metrics.is_empty()
    }

    /// Get the number of experiments in the store.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Get the number of runs in the store.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Add an experiment to the store.
    pub fn add_experiment(&mut self, experiment: ExperimentRecord) {
        self.experiments
            .insert(experiment.experiment_id().to_string(), experiment);
    }

    /// Get an experiment by ID.
    #[must_use]
    pub fn get_experiment(&self, experiment_id: &str) -> Option<&ExperimentRecord> {
        self.experiments.get(experiment_id)
    }

    /// Find an experiment by its (unique) name.
    #[must_use]
    pub fn find_experiment_by_name(&self, name: &str) -> Option<&ExperimentRecord> {
        self.experiments.values().find(|e| e.name() == name)
    }

    /// Add a run to the store, replacing any run with the same ID.
    pub fn add_run(&mut self, run: RunRecord) {
        self.runs.insert(run.run_id().to_string(), run);
    }

    /// Get a run by ID.
    #[must_use]
    pub fn get_run(&self, run_id: &str) -> Option<&RunRecord> {
        self.runs.get(run_id)
    }

    /// Get a run by ID for mutation.
    pub fn get_run_mut(&mut self, run_id: &str) -> Option<&mut RunRecord> {
        self.runs.get_mut(run_id)
    }

    /// Get all runs for an experiment.
    #[must_use]
    pub fn get_runs_for_experiment(&self, experiment_id: &str) -> Vec<&RunRecord> {
        self.runs
            .values()
            .filter(|run| run.experiment_id() == experiment_id)
            .collect()
    }

    /// Get the runs nested directly under `parent_run_id`.
    #[must_use]
    pub fn get_child_runs(&self, parent_run_id: &str) -> Vec<&RunRecord> {
        self.runs
            .values()
            .filter(|run| run.parent_run_id() == Some(parent_run_id))
            .collect()
    }

    /// Append a metric point, numbering it after the existing points for the
    /// same run and key.
    pub fn log_metric(&mut self, run_id: &str, key: &str, value: f64) -> &MetricRecord {
        let step = self
            .metrics
            .iter()
            .filter(|m| m.run_id() == run_id && m.key() == key)
            .count() as u64;
        self.metrics.push(MetricRecord::new(run_id, key, step, value));
        &self.metrics[self.metrics.len() - 1]
    }

    /// Add a metric to the store.
    pub fn add_metric(&mut self, metric: MetricRecord) {
        self.metrics.push(metric);
    }

    /// Get metrics for a specific run and key, ordered by step.
    #[must_use]
    pub fn get_metrics_for_run(&self, run_id: &str, key: &str) -> Vec<MetricRecord> {
        let mut metrics: Vec<MetricRecord> = self
            .metrics
            .iter()
            .filter(|m| m.run_id() == run_id && m.key() == key)
            .cloned()
            .collect();

        metrics.sort_by_key(MetricRecord::step);

        metrics
    }

    /// Latest value of a metric on a run.
    #[must_use]
    pub fn latest_metric(&self, run_id: &str, key: &str) -> Option<f64> {
        self.get_metrics_for_run(run_id, key)
            .last()
            .map(MetricRecord::value)
    }

    /// Add an artifact record.
    pub fn add_artifact(&mut self, artifact: ArtifactRecord) {
        self.artifacts.push(artifact);
    }

    /// Get the artifacts logged by a run.
    #[must_use]
    pub fn get_artifacts_for_run(&self, run_id: &str) -> Vec<&ArtifactRecord> {
        self.artifacts
            .iter()
            .filter(|a| a.run_id() == run_id)
            .collect()
    }

    /// Add an input dataset record.
    pub fn add_input(&mut self, input: InputRecord) {
        self.inputs.push(input);
    }

    /// Get the datasets logged as inputs of a run.
    #[must_use]
    pub fn get_inputs_for_run(&self, run_id: &str) -> Vec<&InputRecord> {
        self.inputs.iter().filter(|i| i.run_id() == run_id).collect()
    }
}
