//! Experiment Tracking Schema
//!
//! Records produced by the tracking backends while a step runs.
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentRecord (1) ──< RunRecord (N) ──┐ parent_run_id (nesting)
//!                              │  ^────────┘
//!                              ├──< MetricRecord (N) [time-series]
//!                              ├──< ArtifactRecord (N) [CAS]
//!                              └──< InputRecord (N) [dataset references]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use pipeline_steps::experiment::{ExperimentRecord, ExperimentStore, RunRecord, RunStatus};
//!
//! let mut store = ExperimentStore::new();
//! let experiment = ExperimentRecord::new("0", "bank-marketing");
//!
//! let mut run = RunRecord::builder("run-001", experiment.experiment_id())
//!     .run_name("evaluate-17-10-42-03")
//!     .build();
//! run.start();
//!
//! store.add_experiment(experiment);
//! store.add_run(run);
//! store.log_metric("run-001", "auc_score", 0.91);
//!
//! let run = store.get_run_mut("run-001").unwrap();
//! run.complete(RunStatus::Success);
//! ```

mod artifact_record;
mod experiment_record;
mod input_record;
mod metric_record;
mod param;
mod run_record;
mod store;

pub use artifact_record::{sha256_cas, sha256_hex, ArtifactRecord};
pub use experiment_record::{ExperimentRecord, ExperimentRecordBuilder};
pub use input_record::{ColumnSpec, DatasetRef, InputRecord};
pub use metric_record::MetricRecord;
pub use param::ParamValue;
pub use run_record::{RunRecord, RunRecordBuilder, RunStatus};
pub use store::ExperimentStore;
