//! MLflow tracking server client (REST API 2.0).
//!
//! Artifacts are uploaded through the server's artifact proxy, so runs must
//! have an `mlflow-artifacts:/` artifact root (the default when the server
//! runs with `--serve-artifacts`).

use super::{check_artifact_name, RunRequest, Tracker};
use crate::experiment::{
    ArtifactRecord, DatasetRef, ExperimentRecord, ParamValue, RunRecord, RunStatus,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const API: &str = "api/2.0/mlflow";
const ARTIFACT_API: &str = "api/2.0/mlflow-artifacts/artifacts";
const PROXIED_ARTIFACT_SCHEME: &str = "mlflow-artifacts:/";
const PARENT_RUN_TAG: &str = "mlflow.parentRunId";
const RUN_NAME_TAG: &str = "mlflow.runName";
const CONTEXT_TAG: &str = "mlflow.data.context";

#[derive(Debug, Deserialize)]
struct Experiment {
    experiment_id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ExperimentResponse {
    experiment: Experiment,
}

#[derive(Debug, Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Debug, Deserialize)]
struct RunInfo {
    run_id: String,
    experiment_id: String,
    status: String,
    #[serde(default)]
    run_name: Option<String>,
    #[serde(default)]
    start_time: Option<i64>,
    #[serde(default)]
    artifact_uri: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RunTag {
    key: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct RunData {
    #[serde(default)]
    tags: Vec<RunTag>,
}

#[derive(Debug, Deserialize)]
struct Run {
    info: RunInfo,
    #[serde(default)]
    data: RunData,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    run: Run,
}

impl Run {
    fn tag(&self, key: &str) -> Option<&str> {
        self.data
            .tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    fn into_record(self) -> RunRecord {
        let mut builder = RunRecord::builder(&self.info.run_id, &self.info.experiment_id)
            .status(RunStatus::from_mlflow(&self.info.status).unwrap_or(RunStatus::Running));
        if let Some(name) = self.info.run_name.as_deref().or_else(|| self.tag(RUN_NAME_TAG)) {
            builder = builder.run_name(name);
        }
        if let Some(parent) = self.tag(PARENT_RUN_TAG) {
            builder = builder.parent_run_id(parent);
        }
        if let Some(started) = self.info.start_time.and_then(DateTime::<Utc>::from_timestamp_millis) {
            builder = builder.started_at(started);
        }
        builder.build()
    }
}

/// Client for an MLflow tracking server.
#[derive(Debug)]
pub struct MlflowTracker {
    endpoint: String,
    agent: ureq::Agent,
}

impl MlflowTracker {
    /// Client for the server at `endpoint` (`http(s)://host[:port][/prefix]`).
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .build();
        Self {
            endpoint: endpoint.into(),
            agent,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), path)
    }

    fn get<T: DeserializeOwned>(&self, method: &str, query: &[(&str, &str)]) -> Result<T> {
        let mut request = self.agent.get(&self.url(&format!("{API}/{method}")));
        for (key, value) in query {
            request = request.query(key, value);
        }
        Ok(request.call().map_err(|e| api_error(method, e))?.into_json()?)
    }

    fn post<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T> {
        let response = self
            .agent
            .post(&self.url(&format!("{API}/{method}")))
            .send_json(body)
            .map_err(|e| api_error(method, e))?;
        Ok(response.into_json()?)
    }

    fn get_run(&self, run_id: &str) -> Result<Run> {
        match self.get::<RunResponse>("runs/get", &[("run_id", run_id)]) {
            Ok(response) => Ok(response.run),
            Err(Error::RunNotFound(_)) => Err(Error::RunNotFound(run_id.to_string())),
            Err(e) => Err(e),
        }
    }
}

/// Map a transport error, turning `RESOURCE_DOES_NOT_EXIST` into
/// [`Error::RunNotFound`] and other HTTP statuses into [`Error::Tracking`].
fn api_error(method: &str, error: ureq::Error) -> Error {
    match error {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            if status == 404 || body.contains("RESOURCE_DOES_NOT_EXIST") {
                Error::RunNotFound(format!("{method}: {body}"))
            } else {
                Error::Tracking(format!("{method} returned HTTP {status}: {body}"))
            }
        }
        transport => Error::from(transport),
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl Tracker for MlflowTracker {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn set_experiment(&self, name: &str) -> Result<ExperimentRecord> {
        match self.get::<ExperimentResponse>("experiments/get-by-name", &[("experiment_name", name)]) {
            Ok(found) => {
                return Ok(ExperimentRecord::new(
                    found.experiment.experiment_id,
                    found.experiment.name,
                ))
            }
            Err(Error::RunNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let created: CreateExperimentResponse =
            self.post("experiments/create", &json!({ "name": name }))?;
        tracing::debug!(experiment = name, id = %created.experiment_id, "created experiment");
        Ok(ExperimentRecord::new(created.experiment_id, name))
    }

    fn start_run(&self, experiment_id: &str, request: &RunRequest) -> Result<RunRecord> {
        match request {
            RunRequest::Resume { run_id } => {
                let run = self.get_run(run_id)?;
                let _: Value = self.post(
                    "runs/update",
                    &json!({ "run_id": run_id, "status": RunStatus::Running.as_mlflow() }),
                )?;
                let mut record = run.into_record();
                record.start();
                Ok(record)
            }
            RunRequest::Create {
                run_name,
                parent_run_id,
            } => {
                let mut tags = vec![RunTag {
                    key: RUN_NAME_TAG.to_string(),
                    value: run_name.clone(),
                }];
                if let Some(parent) = parent_run_id {
                    self.get_run(parent)?;
                    tags.push(RunTag {
                        key: PARENT_RUN_TAG.to_string(),
                        value: parent.clone(),
                    });
                }
                let response: RunResponse = self.post(
                    "runs/create",
                    &json!({
                        "experiment_id": experiment_id,
                        "run_name": run_name,
                        "start_time": now_millis(),
                        "tags": tags,
                    }),
                )?;
                let mut record = response.run.into_record();
                record.start();
                Ok(record)
            }
        }
    }

    fn log_param(&self, run_id: &str, key: &str, value: &ParamValue) -> Result<()> {
        let _: Value = self.post(
            "runs/log-parameter",
            &json!({ "run_id": run_id, "key": key, "value": value.to_string() }),
        )?;
        Ok(())
    }

    fn log_metric(&self, run_id: &str, key: &str, value: f64) -> Result<()> {
        let _: Value = self.post(
            "runs/log-metric",
            &json!({
                "run_id": run_id,
                "key": key,
                "value": value,
                "timestamp": now_millis(),
                "step": 0,
            }),
        )?;
        Ok(())
    }

    fn log_artifact(&self, run_id: &str, name: &str, contents: &[u8]) -> Result<ArtifactRecord> {
        check_artifact_name(name)?;
        let run = self.get_run(run_id)?;
        let artifact_uri = run.info.artifact_uri.unwrap_or_default();
        let Some(path) = artifact_uri.strip_prefix(PROXIED_ARTIFACT_SCHEME) else {
            return Err(Error::Tracking(format!(
                "artifact root `{artifact_uri}` is not served by the tracking server"
            )));
        };

        let url = self.url(&format!("{ARTIFACT_API}/{}/{name}", path.trim_matches('/')));
        self.agent
            .put(&url)
            .set("Content-Type", "application/octet-stream")
            .send_bytes(contents)
            .map_err(|e| api_error("artifacts/put", e))?;

        Ok(ArtifactRecord::from_contents(
            run_id,
            name,
            contents,
            format!("{artifact_uri}/{name}"),
        ))
    }

    fn log_input(&self, run_id: &str, dataset: &DatasetRef, context: &str) -> Result<()> {
        let schema = json!({
            "mlflow_colspec": dataset
                .schema
                .iter()
                .map(|c| json!({ "name": c.name, "type": c.data_type }))
                .collect::<Vec<_>>()
        });
        let profile = json!({ "num_rows": dataset.num_rows, "num_elements": dataset.num_rows * dataset.num_columns() });
        let _: Value = self.post(
            "runs/log-inputs",
            &json!({
                "run_id": run_id,
                "datasets": [{
                    "dataset": {
                        "name": dataset.name,
                        "digest": dataset.digest,
                        "source_type": "s3",
                        "source": json!({ "uri": dataset.source }).to_string(),
                        "schema": schema.to_string(),
                        "profile": profile.to_string(),
                    },
                    "tags": [{ "key": CONTEXT_TAG, "value": context }],
                }],
            }),
        )?;
        Ok(())
    }

    fn end_run(&self, run_id: &str, status: RunStatus) -> Result<()> {
        let _: Value = self.post(
            "runs/update",
            &json!({ "run_id": run_id, "status": status.as_mlflow(), "end_time": now_millis() }),
        )?;
        Ok(())
    }
}
