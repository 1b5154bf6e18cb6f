//! `pipeline-step`: run one pipeline step and print its result as JSON.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pipeline_steps::config::PipelineConfig;
use pipeline_steps::envelope::StepInput;
use pipeline_steps::evaluation::EvaluationReport;
use pipeline_steps::monitoring::{preprocess_record, InferenceRecord};
use pipeline_steps::registry::ApprovalStatus;
use pipeline_steps::steps::{
    evaluate, prepare_datasets, preprocess, register, EvaluateInput, ModelDatasetSnapshot,
    PrepareDatasetsInput, PreprocessInput, RegisterInput, StepRuntime,
};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pipeline-step", version, about = "Run a tracked ML pipeline step")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, default_value = "pipeline-steps.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct TrackingArgs {
    /// Tracking endpoint (http(s)://, file://, memory:); defaults to the configured one
    #[arg(long)]
    tracking_endpoint: Option<String>,
    /// Experiment to log into
    #[arg(long)]
    experiment_name: Option<String>,
    /// Pipeline run to resume and nest under
    #[arg(long, conflicts_with = "parent_run_name")]
    parent_run_id: Option<String>,
    /// Name of a new pipeline run to nest under
    #[arg(long)]
    parent_run_name: Option<String>,
    /// Step run to resume
    #[arg(long)]
    run_id: Option<String>,
}

impl TrackingArgs {
    fn into_input(self, config: &PipelineConfig) -> StepInput {
        let endpoint = self
            .tracking_endpoint
            .unwrap_or_else(|| config.tracking_endpoint.clone());
        let mut builder = StepInput::builder(endpoint);
        if let Some(name) = self.experiment_name {
            builder = builder.experiment_name(name);
        }
        if let Some(id) = self.parent_run_id {
            builder = builder.parent_run_id(id);
        }
        if let Some(name) = self.parent_run_name {
            builder = builder.parent_run_name(name);
        }
        if let Some(id) = self.run_id {
            builder = builder.run_id(id);
        }
        builder.build()
    }
}

#[derive(Subcommand)]
enum Command {
    /// Extract the latest feature-store records and split them
    Extract {
        #[arg(long)]
        feature_group_name: String,
        #[arg(long)]
        output_prefix: String,
        #[arg(long)]
        query_output_uri: String,
        #[command(flatten)]
        tracking: TrackingArgs,
    },
    /// Engineer features from a raw CSV extract and split them
    Preprocess {
        #[arg(long)]
        input_data_uri: String,
        #[arg(long)]
        output_prefix: String,
        /// Log the raw table as `model_dataset` instead of the engineered one
        #[arg(long)]
        log_raw_dataset: bool,
        #[command(flatten)]
        tracking: TrackingArgs,
    },
    /// Score the test set and compute ROC/AUC
    Evaluate {
        #[arg(long)]
        test_x_data_uri: String,
        #[arg(long)]
        test_y_data_uri: String,
        #[arg(long)]
        model_uri: String,
        #[arg(long)]
        output_prefix: String,
        #[command(flatten)]
        tracking: TrackingArgs,
    },
    /// Register the model package
    Register {
        #[arg(long)]
        training_job_name: String,
        #[arg(long)]
        model_package_group_name: String,
        #[arg(long, default_value = "PendingManualApproval")]
        model_approval_status: ApprovalStatus,
        /// Evaluation report JSON as printed by `evaluate`
        #[arg(long)]
        evaluation_result: String,
        #[arg(long)]
        output_prefix: String,
        #[arg(long)]
        model_statistics_uri: Option<String>,
        #[arg(long)]
        model_constraints_uri: Option<String>,
        #[arg(long)]
        model_data_statistics_uri: Option<String>,
        #[arg(long)]
        model_data_constraints_uri: Option<String>,
        #[command(flatten)]
        tracking: TrackingArgs,
    },
    /// Map one captured inference record (JSON) to monitoring fields
    PreprocessRecord {
        /// File holding the record; stdin when omitted
        file: Option<PathBuf>,
    },
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PipelineConfig::load(Some(&cli.config))
        .with_context(|| format!("loading {}", cli.config.display()))?;
    pipeline_steps::logging::init(&config.log_filter);

    let runtime = StepRuntime::from_config(&config);

    match cli.command {
        Command::Extract {
            feature_group_name,
            output_prefix,
            query_output_uri,
            tracking,
        } => {
            let input = PrepareDatasetsInput {
                feature_group_name,
                output_prefix,
                query_output_uri,
                tracking: tracking.into_input(&config),
            };
            print_json(&prepare_datasets(&runtime, &input)?)
        }
        Command::Preprocess {
            input_data_uri,
            output_prefix,
            log_raw_dataset,
            tracking,
        } => {
            let input = PreprocessInput {
                input_data_uri,
                output_prefix,
                model_dataset: if log_raw_dataset {
                    ModelDatasetSnapshot::Raw
                } else {
                    ModelDatasetSnapshot::Engineered
                },
                tracking: tracking.into_input(&config),
            };
            print_json(&preprocess(&runtime, &input)?)
        }
        Command::Evaluate {
            test_x_data_uri,
            test_y_data_uri,
            model_uri,
            output_prefix,
            tracking,
        } => {
            let input = EvaluateInput {
                test_x_data_uri,
                test_y_data_uri,
                model_uri,
                output_prefix,
                tracking: tracking.into_input(&config),
            };
            print_json(&evaluate(&runtime, &input)?)
        }
        Command::Register {
            training_job_name,
            model_package_group_name,
            model_approval_status,
            evaluation_result,
            output_prefix,
            model_statistics_uri,
            model_constraints_uri,
            model_data_statistics_uri,
            model_data_constraints_uri,
            tracking,
        } => {
            let evaluation_result: EvaluationReport = serde_json::from_str(&evaluation_result)
                .context("parsing --evaluation-result")?;
            let input = RegisterInput {
                training_job_name,
                model_package_group_name,
                model_approval_status,
                evaluation_result,
                output_prefix,
                model_statistics_uri,
                model_constraints_uri,
                model_data_statistics_uri,
                model_data_constraints_uri,
                tracking: tracking.into_input(&config),
            };
            print_json(&register(&runtime, &input)?)
        }
        Command::PreprocessRecord { file } => {
            let line = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => {
                    let mut line = String::new();
                    std::io::stdin().read_to_string(&mut line)?;
                    line
                }
            };
            let record: InferenceRecord = serde_json::from_str(&line)?;
            print_json(&preprocess_record(&record)?)
        }
    }
}
