//! Tracker backed by an in-process [`ExperimentStore`].
//!
//! In file mode the store is written to `<root>/tracking.json` after every
//! change and artifacts land in `<root>/artifacts/<run_id>/<name>`. In memory
//! mode artifacts are kept alongside the store.

use super::{check_artifact_name, RunRequest, Tracker, MEMORY_ENDPOINT};
use crate::experiment::{
    ArtifactRecord, DatasetRef, ExperimentRecord, ExperimentStore, InputRecord, ParamValue,
    RunRecord, RunStatus,
};
use crate::storage::write_atomic;
use crate::{Error, Result};
use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const STATE_FILE: &str = "tracking.json";
const ARTIFACT_DIR: &str = "artifacts";

/// Local tracking backend.
#[derive(Debug)]
pub struct LocalTracker {
    endpoint: String,
    root: Option<PathBuf>,
    state: Mutex<ExperimentStore>,
    blobs: DashMap<String, Vec<u8>>,
}

impl LocalTracker {
    /// Tracker that keeps everything in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            endpoint: MEMORY_ENDPOINT.to_string(),
            root: None,
            state: Mutex::new(ExperimentStore::new()),
            blobs: DashMap::new(),
        }
    }

    /// Tracker persisted under `root`, loading earlier state if present.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the directory cannot be created, or
    /// [`Error::Serde`] if an existing state file is corrupt.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        let state_path = root.join(STATE_FILE);
        let store = if state_path.is_file() {
            serde_json::from_slice(&fs::read(&state_path)?)?
        } else {
            ExperimentStore::new()
        };

        Ok(Self {
            endpoint: format!("file://{}", root.display()),
            root: Some(root),
            state: Mutex::new(store),
            blobs: DashMap::new(),
        })
    }

    /// Copy of everything tracked so far.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tracking`] if a previous call panicked mid-update.
    pub fn snapshot(&self) -> Result<ExperimentStore> {
        Ok(self.lock()?.clone())
    }

    /// Contents of an artifact logged against `run_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ObjectNotFound`] if no such artifact was logged.
    pub fn artifact(&self, run_id: &str, name: &str) -> Result<Vec<u8>> {
        let key = format!("{run_id}/{name}");
        match &self.root {
            Some(root) => fs::read(root.join(ARTIFACT_DIR).join(run_id).join(name))
                .map_err(|_| Error::ObjectNotFound(key)),
            None => self
                .blobs
                .get(&key)
                .map(|blob| blob.value().clone())
                .ok_or(Error::ObjectNotFound(key)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ExperimentStore>> {
        self.state
            .lock()
            .map_err(|_| Error::Tracking("tracking state lock poisoned".to_string()))
    }

    /// Apply `change` to the store and persist the result.
    fn update<T>(&self, change: impl FnOnce(&mut ExperimentStore) -> Result<T>) -> Result<T> {
        let mut store = self.lock()?;
        let out = change(&mut store)?;
        self.persist(&store)?;
        Ok(out)
    }

    fn persist(&self, store: &ExperimentStore) -> Result<()> {
        let Some(root) = &self.root else {
            return Ok(());
        };
        write_atomic(&root.join(STATE_FILE), &serde_json::to_vec_pretty(store)?)
    }
}

fn run_mut<'a>(store: &'a mut ExperimentStore, run_id: &str) -> Result<&'a mut RunRecord> {
    store
        .get_run_mut(run_id)
        .ok_or_else(|| Error::RunNotFound(run_id.to_string()))
}

impl Tracker for LocalTracker {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn set_experiment(&self, name: &str) -> Result<ExperimentRecord> {
        self.update(|store| {
            if let Some(existing) = store.find_experiment_by_name(name) {
                return Ok(existing.clone());
            }
            let experiment = ExperimentRecord::new(store.experiment_count().to_string(), name);
            store.add_experiment(experiment.clone());
            tracing::debug!(experiment = name, id = experiment.experiment_id(), "created experiment");
            Ok(experiment)
        })
    }

    fn start_run(&self, experiment_id: &str, request: &RunRequest) -> Result<RunRecord> {
        self.update(|store| {
            if store.get_experiment(experiment_id).is_none() {
                return Err(Error::Tracking(format!(
                    "experiment `{experiment_id}` does not exist"
                )));
            }
            match request {
                RunRequest::Resume { run_id } => {
                    let run = run_mut(store, run_id)?;
                    run.start();
                    Ok(run.clone())
                }
                RunRequest::Create {
                    run_name,
                    parent_run_id,
                } => {
                    let mut builder = RunRecord::builder(Uuid::new_v4().simple().to_string(), experiment_id)
                        .run_name(run_name.as_str());
                    if let Some(parent) = parent_run_id {
                        if store.get_run(parent).is_none() {
                            return Err(Error::RunNotFound(parent.clone()));
                        }
                        builder = builder.parent_run_id(parent.as_str());
                    }
                    let mut run = builder.build();
                    run.start();
                    store.add_run(run.clone());
                    Ok(run)
                }
            }
        })
    }

    fn log_param(&self, run_id: &str, key: &str, value: &ParamValue) -> Result<()> {
        self.update(|store| {
            run_mut(store, run_id)?.set_param(key, value.clone());
            Ok(())
        })
    }

    fn log_metric(&self, run_id: &str, key: &str, value: f64) -> Result<()> {
        self.update(|store| {
            run_mut(store, run_id)?;
            store.log_metric(run_id, key, value);
            Ok(())
        })
    }

    fn log_artifact(&self, run_id: &str, name: &str, contents: &[u8]) -> Result<ArtifactRecord> {
        check_artifact_name(name)?;
        self.update(|store| {
            run_mut(store, run_id)?;
            let location = match &self.root {
                Some(root) => {
                    let path = root.join(ARTIFACT_DIR).join(run_id).join(name);
                    write_atomic(&path, contents)?;
                    path.display().to_string()
                }
                None => {
                    self.blobs.insert(format!("{run_id}/{name}"), contents.to_vec());
                    format!("memory://{run_id}/{name}")
                }
            };
            let artifact = ArtifactRecord::from_contents(run_id, name, contents, location);
            store.add_artifact(artifact.clone());
            Ok(artifact)
        })
    }

    fn log_input(&self, run_id: &str, dataset: &DatasetRef, context: &str) -> Result<()> {
        self.update(|store| {
            run_mut(store, run_id)?;
            store.add_input(InputRecord::new(run_id, dataset.clone(), context));
            Ok(())
        })
    }

    fn end_run(&self, run_id: &str, status: RunStatus) -> Result<()> {
        self.update(|store| {
            run_mut(store, run_id)?.complete(status);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(name: &str, parent: Option<&str>) -> RunRequest {
        RunRequest::Create {
            run_name: name.to_string(),
            parent_run_id: parent.map(str::to_string),
        }
    }

    #[test]
    fn test_set_experiment_is_idempotent() {
        let tracker = LocalTracker::in_memory();
        let first = tracker.set_experiment("bank").unwrap();
        let second = tracker.set_experiment("bank").unwrap();
        let other = tracker.set_experiment("churn").unwrap();

        assert_eq!(first.experiment_id(), second.experiment_id());
        assert_ne!(first.experiment_id(), other.experiment_id());
    }

    #[test]
    fn test_nested_run_and_resume() {
        let tracker = LocalTracker::in_memory();
        let exp = tracker.set_experiment("bank").unwrap();
        let parent = tracker.start_run(exp.experiment_id(), &create("pipeline", None)).unwrap();
        let child = tracker
            .start_run(exp.experiment_id(), &create("evaluate", Some(parent.run_id())))
            .unwrap();
        assert_eq!(child.parent_run_id(), Some(parent.run_id()));

        tracker.end_run(child.run_id(), RunStatus::Success).unwrap();
        let resumed = tracker
            .start_run(
                exp.experiment_id(),
                &RunRequest::Resume {
                    run_id: child.run_id().to_string(),
                },
            )
            .unwrap();
        assert_eq!(resumed.status(), RunStatus::Running);
        assert_eq!(resumed.started_at(), child.started_at());
    }

    #[test]
    fn test_unknown_runs() {
        let tracker = LocalTracker::in_memory();
        let exp = tracker.set_experiment("bank").unwrap();
        assert!(matches!(
            tracker.start_run(exp.experiment_id(), &create("x", Some("missing"))),
            Err(Error::RunNotFound(_))
        ));
        assert!(matches!(
            tracker.log_metric("missing", "auc_score", 1.0),
            Err(Error::RunNotFound(_))
        ));
        assert!(matches!(
            tracker.end_run("missing", RunStatus::Failed),
            Err(Error::RunNotFound(_))
        ));
    }

    #[test]
    fn test_logging_lands_in_store() {
        let tracker = LocalTracker::in_memory();
        let exp = tracker.set_experiment("bank").unwrap();
        let run = tracker.start_run(exp.experiment_id(), &create("evaluate", None)).unwrap();

        tracker
            .log_params(run.run_id(), &[("train", (7, 3).into()), ("seed", 1729_i64.into())])
            .unwrap();
        tracker.log_metric(run.run_id(), "auc_score", 0.9).unwrap();
        let artifact = tracker.log_artifact(run.run_id(), "roc-curve.svg", b"<svg/>").unwrap();

        let store = tracker.snapshot().unwrap();
        let stored = store.get_run(run.run_id()).unwrap();
        assert_eq!(stored.params()["train"].to_string(), "(7, 3)");
        assert_eq!(store.latest_metric(run.run_id(), "auc_score"), Some(0.9));
        assert_eq!(artifact.location(), format!("memory://{}/roc-curve.svg", run.run_id()));
        assert_eq!(tracker.artifact(run.run_id(), "roc-curve.svg").unwrap(), b"<svg/>");
    }

    #[test]
    fn test_file_mode_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let run_id = {
            let tracker = LocalTracker::open(dir.path()).unwrap();
            let exp = tracker.set_experiment("bank").unwrap();
            let run = tracker.start_run(exp.experiment_id(), &create("register", None)).unwrap();
            tracker.log_artifact(run.run_id(), "evaluation.json", b"{}").unwrap();
            tracker.end_run(run.run_id(), RunStatus::Success).unwrap();
            run.run_id().to_string()
        };

        let reopened = LocalTracker::open(dir.path()).unwrap();
        let store = reopened.snapshot().unwrap();
        assert_eq!(store.get_run(&run_id).unwrap().status(), RunStatus::Success);
        assert_eq!(reopened.artifact(&run_id, "evaluation.json").unwrap(), b"{}");
        assert!(dir.path().join("artifacts").join(&run_id).join("evaluation.json").is_file());
    }

    #[test]
    fn test_file_mode_artifacts_sharing_a_stem() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = LocalTracker::open(dir.path()).unwrap();
        let exp = tracker.set_experiment("bank").unwrap();
        let run = tracker.start_run(exp.experiment_id(), &create("evaluate", None)).unwrap();

        tracker.log_artifact(run.run_id(), "roc-curve.tmp", b"draft").unwrap();
        tracker.log_artifact(run.run_id(), "roc-curve.svg", b"<svg/>").unwrap();

        assert_eq!(tracker.artifact(run.run_id(), "roc-curve.tmp").unwrap(), b"draft");
        assert_eq!(tracker.artifact(run.run_id(), "roc-curve.svg").unwrap(), b"<svg/>");
    }
}
