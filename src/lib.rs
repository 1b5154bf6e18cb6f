//! # pipeline-steps: Tracked ML Pipeline Steps
//!
//! **Version**: 0.1.0
//!
//! The steps of a bank-marketing model pipeline, each run inside one
//! tracked envelope:
//!
//! - **prepare_datasets**: latest feature-store records, split 70/20/10
//! - **preprocess**: raw CSV, feature engineering, the same split
//! - **evaluate**: score the test set, ROC/AUC, prediction baseline
//! - **register**: submit the model package to the registry
//!
//! The envelope connects a tracker for the step's endpoint, resolves the
//! experiment and the parent pipeline run, nests a step run under it and
//! closes that run exactly once, `Success` or `Failed`. Steps exchange data
//! as headerless CSV objects in an [`storage::ObjectStore`].
//!
//! A standalone [`monitoring::preprocess_record`] maps captured inference
//! records for data-quality monitoring.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use pipeline_steps::envelope::StepInput;
//! use pipeline_steps::steps::{preprocess, PreprocessInput, StepRuntime};
//! use pipeline_steps::storage::LocalObjectStore;
//! use std::sync::Arc;
//!
//! let runtime = StepRuntime::new(Arc::new(LocalObjectStore::new("objects")));
//! let input = PreprocessInput {
//!     input_data_uri: "s3://bucket/raw/bank-additional-full.csv".to_string(),
//!     output_prefix: "s3://bucket/pipeline/run-1".to_string(),
//!     model_dataset: Default::default(),
//!     tracking: StepInput::builder("file://mlruns")
//!         .parent_run_name("pipeline-run-1")
//!         .build(),
//! };
//!
//! let result = preprocess(&runtime, &input)?;
//! println!("train: {}", result.outputs.splits.train_data);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod dataset;
pub mod envelope;
pub mod error;
pub mod evaluation;
pub mod experiment;
pub mod feature_store;
pub mod logging;
pub mod model;
pub mod monitoring;
pub mod registry;
pub mod steps;
pub mod storage;
pub mod tracking;

pub use error::{Error, Result};
