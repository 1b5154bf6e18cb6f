//! End-to-end step tests over in-memory storage and tracking.

use arrow::array::{Float64Array, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use pipeline_steps::dataset::{read_csv, CsvLayout};
use pipeline_steps::envelope::StepInput;
use pipeline_steps::evaluation::EvaluationReport;
use pipeline_steps::experiment::{ParamValue, RunStatus};
use pipeline_steps::feature_store::ParquetFeatureStore;
use pipeline_steps::model::{write_archive, LogisticModel, ModelDocument};
use pipeline_steps::registry::{ApprovalStatus, ModelRegistry, ObjectStoreRegistry};
use pipeline_steps::steps::{
    evaluate, prepare_datasets, preprocess, register, EvaluateInput, ModelDatasetSnapshot,
    PrepareDatasetsInput, PreprocessInput, RegisterInput, SplitShapes, StepRuntime,
};
use pipeline_steps::storage::{MemoryObjectStore, ObjectStore, ObjectUri};
use pipeline_steps::tracking::{LocalTracker, Tracker};
use pipeline_steps::{Error, Result};
use std::sync::Arc;

const JOBS: [&str; 4] = ["admin.", "student", "retired", "technician"];

/// Raw marketing extract with `rows` rows; every third row is a `yes`.
fn bank_csv(rows: usize) -> Vec<u8> {
    let mut csv = String::from(
        "age;job;marital;duration;campaign;pdays;previous;\
         emp.var.rate;cons.price.idx;cons.conf.idx;euribor3m;nr.employed;y\n",
    );
    for i in 0..rows {
        let age = 20 + (i * 7) % 60;
        let job = JOBS[i % JOBS.len()];
        let marital = if i % 2 == 0 { "married" } else { "single" };
        let pdays = if i % 5 == 0 { 6 } else { 999 };
        let y = if i % 3 == 0 { "yes" } else { "no" };
        csv.push_str(&format!(
            "{age};{job};{marital};{};{};{pdays};{};1.1;93.9;-36.4;4.857;5191.0;{y}\n",
            100 + i,
            1 + i % 4,
            i % 2,
        ));
    }
    csv.into_bytes()
}

struct Fixture {
    objects: Arc<MemoryObjectStore>,
    tracker: Arc<LocalTracker>,
    runtime: StepRuntime,
}

fn fixture() -> Fixture {
    let objects = Arc::new(MemoryObjectStore::new());
    let tracker = Arc::new(LocalTracker::in_memory());
    let shared = tracker.clone();
    let runtime = StepRuntime::new(objects.clone()).with_connector(Arc::new(
        move |_endpoint: &str| -> Result<Arc<dyn Tracker>> { Ok(shared.clone()) },
    ));
    Fixture {
        objects,
        tracker,
        runtime,
    }
}

fn tracking() -> StepInput {
    StepInput::builder("memory:")
        .experiment_name("bank-marketing")
        .parent_run_name("pipeline-run")
        .build()
}

#[test]
fn test_preprocess_writes_split_and_logs() {
    let fx = fixture();
    fx.objects
        .write("s3://bucket/raw/bank.csv", &bank_csv(30))
        .unwrap();

    let input = PreprocessInput {
        input_data_uri: "s3://bucket/raw/bank.csv".to_string(),
        output_prefix: "s3://bucket/run-1".to_string(),
        model_dataset: ModelDatasetSnapshot::Engineered,
        tracking: tracking(),
    };
    let result = preprocess(&fx.runtime, &input).unwrap();
    let outputs = &result.outputs;

    assert_eq!(outputs.splits.train_data, "s3://bucket/run-1/train/train.csv");
    assert_eq!(result.experiment_name, "bank-marketing");
    assert!(!result.pipeline_run_id.is_empty());

    let read = |uri: &str| read_csv(&fx.objects.read(uri).unwrap(), CsvLayout::HEADERLESS).unwrap();
    let train = read(&outputs.splits.train_data);
    let validation = read(&outputs.splits.validation_data);
    let test_x = read(&outputs.splits.test_x_data);
    let test_y = read(&outputs.splits.test_y_data);
    let baseline = read(&outputs.splits.baseline_data);

    assert_eq!(train.num_rows(), 21);
    assert_eq!(validation.num_rows(), 6);
    assert_eq!(test_x.num_rows(), 3);
    assert_eq!(test_y.num_columns(), 1);
    assert_eq!(test_x.num_columns(), train.num_columns() - 1);
    assert_eq!(baseline.num_rows(), 30);
    assert_eq!(baseline.num_columns(), train.num_columns() - 1);

    assert_eq!(outputs.raw_dataset.num_rows, 30);
    assert_eq!(outputs.engineered_dataset.schema[0].name, "y");
    assert_eq!(outputs.engineered_dataset.num_columns(), train.num_columns());

    let store = fx.tracker.snapshot().unwrap();
    let run = store.get_run(&result.run_id).unwrap();
    assert_eq!(run.status(), RunStatus::Success);
    assert_eq!(run.parent_run_id(), Some(result.pipeline_run_id.as_str()));
    assert_eq!(run.params()["full_dataset"], ParamValue::Shape(30, train.num_columns()));
    assert_eq!(run.params()["train"], ParamValue::Shape(21, train.num_columns()));

    let cols = train.num_columns();
    assert_eq!(outputs.splits.rows, 30);
    assert_eq!(
        outputs.splits.shapes,
        SplitShapes {
            full: (30, cols),
            train: (21, cols),
            validate: (6, cols),
            test: (3, cols),
        }
    );

    let inputs = store.get_inputs_for_run(&result.run_id);
    let contexts: Vec<&str> = inputs.iter().map(|i| i.context()).collect();
    assert_eq!(contexts, vec!["raw_input", "model_dataset"]);
    assert_eq!(inputs[1].dataset(), &outputs.engineered_dataset);
}

#[test]
fn test_preprocess_can_log_raw_snapshot() {
    let fx = fixture();
    fx.objects
        .write("s3://bucket/raw/bank.csv", &bank_csv(20))
        .unwrap();

    let input = PreprocessInput {
        input_data_uri: "s3://bucket/raw/bank.csv".to_string(),
        output_prefix: "s3://bucket/run-2".to_string(),
        model_dataset: ModelDatasetSnapshot::Raw,
        tracking: tracking(),
    };
    let result = preprocess(&fx.runtime, &input).unwrap();

    let store = fx.tracker.snapshot().unwrap();
    let inputs = store.get_inputs_for_run(&result.run_id);
    assert_eq!(inputs[1].context(), "model_dataset");
    assert_eq!(inputs[1].dataset(), &result.outputs.raw_dataset);
}

#[test]
fn test_preprocess_missing_input_fails_run() {
    let fx = fixture();
    let input = PreprocessInput {
        input_data_uri: "s3://bucket/raw/missing.csv".to_string(),
        output_prefix: "s3://bucket/run-3".to_string(),
        model_dataset: ModelDatasetSnapshot::default(),
        tracking: tracking(),
    };

    let err = preprocess(&fx.runtime, &input).unwrap_err();
    assert!(matches!(err.cause(), Error::ObjectNotFound(_)));

    let run_id = err.run_id().unwrap();
    let store = fx.tracker.snapshot().unwrap();
    assert_eq!(store.get_run(run_id).unwrap().status(), RunStatus::Failed);
}

/// Object store that refuses writes to objects named `train.csv`.
struct RejectTrainWrites(MemoryObjectStore);

impl ObjectStore for RejectTrainWrites {
    fn get(&self, uri: &ObjectUri) -> Result<Vec<u8>> {
        self.0.get(uri)
    }

    fn put(&self, uri: &ObjectUri, contents: &[u8]) -> Result<()> {
        if uri.file_name() == "train.csv" {
            return Err(Error::StorageError("access denied".to_string()));
        }
        self.0.put(uri, contents)
    }

    fn exists(&self, uri: &ObjectUri) -> Result<bool> {
        self.0.exists(uri)
    }
}

#[test]
fn test_storage_failure_passes_through_and_closes_run() {
    let objects = Arc::new(RejectTrainWrites(MemoryObjectStore::new()));
    objects
        .write("s3://bucket/raw/bank.csv", &bank_csv(20))
        .unwrap();
    let tracker = Arc::new(LocalTracker::in_memory());
    let shared = tracker.clone();
    let runtime = StepRuntime::new(objects).with_connector(Arc::new(
        move |_endpoint: &str| -> Result<Arc<dyn Tracker>> { Ok(shared.clone()) },
    ));

    let input = PreprocessInput {
        input_data_uri: "s3://bucket/raw/bank.csv".to_string(),
        output_prefix: "s3://bucket/run-4".to_string(),
        model_dataset: ModelDatasetSnapshot::default(),
        tracking: tracking(),
    };
    let err = preprocess(&runtime, &input).unwrap_err();

    assert!(matches!(err.cause(), Error::StorageError(msg) if msg == "access denied"));
    let store = tracker.snapshot().unwrap();
    let run = store.get_run(err.run_id().unwrap()).unwrap();
    assert_eq!(run.status(), RunStatus::Failed);
    assert!(run.ended_at().is_some());
}

fn write_model(objects: &MemoryObjectStore, uri: &str) {
    let archive = write_archive(&ModelDocument::Logistic(LogisticModel::new(vec![2.0], 0.0))).unwrap();
    objects.write(uri, &archive).unwrap();
}

#[test]
fn test_evaluate_reports_auc_and_baseline() {
    let fx = fixture();
    fx.objects.write("s3://bucket/test/test_x.csv", b"-0.7\n0.7\n").unwrap();
    fx.objects.write("s3://bucket/test/test_y.csv", b"0\n1\n").unwrap();
    write_model(&fx.objects, "s3://bucket/model/model.zip");

    let input = EvaluateInput {
        test_x_data_uri: "s3://bucket/test/test_x.csv".to_string(),
        test_y_data_uri: "s3://bucket/test/test_y.csv".to_string(),
        model_uri: "s3://bucket/model/model.zip".to_string(),
        output_prefix: "s3://bucket/run-5".to_string(),
        tracking: tracking(),
    };
    let result = evaluate(&fx.runtime, &input).unwrap();

    assert!((result.outputs.report.auc_score() - 1.0).abs() < 1e-12);
    assert_eq!(
        result.outputs.prediction_baseline_data,
        "s3://bucket/run-5/prediction_baseline/prediction_baseline.csv"
    );

    let baseline = read_csv(
        &fx.objects.read(&result.outputs.prediction_baseline_data).unwrap(),
        CsvLayout::WITH_HEADER,
    )
    .unwrap();
    assert_eq!(baseline.num_rows(), 2);
    assert_eq!(baseline.schema().field(0).name(), "prediction");

    let store = fx.tracker.snapshot().unwrap();
    assert_eq!(store.latest_metric(&result.run_id, "auc_score"), Some(1.0));
    let svg = fx.tracker.artifact(&result.run_id, "roc-curve.svg").unwrap();
    assert!(String::from_utf8(svg).unwrap().starts_with("<svg"));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(
        json["evaluation_result"]["classification_metrics"]["auc_score"]["value"],
        1.0
    );
    assert_eq!(json["run_id"], result.run_id.as_str());
}

#[test]
fn test_evaluate_single_class_labels_fail() {
    let fx = fixture();
    fx.objects.write("s3://bucket/test/test_x.csv", b"-0.7\n0.7\n").unwrap();
    fx.objects.write("s3://bucket/test/test_y.csv", b"1\n1\n").unwrap();
    write_model(&fx.objects, "s3://bucket/model/model.zip");

    let input = EvaluateInput {
        test_x_data_uri: "s3://bucket/test/test_x.csv".to_string(),
        test_y_data_uri: "s3://bucket/test/test_y.csv".to_string(),
        model_uri: "s3://bucket/model/model.zip".to_string(),
        output_prefix: "s3://bucket/run-6".to_string(),
        tracking: tracking(),
    };
    let err = evaluate(&fx.runtime, &input).unwrap_err();
    assert!(matches!(err.cause(), Error::InvalidInput(_)));
}

#[test]
fn test_register_creates_versioned_packages() {
    let fx = fixture();
    let input = RegisterInput {
        training_job_name: "training-job-1".to_string(),
        model_package_group_name: "bank-marketing".to_string(),
        model_approval_status: ApprovalStatus::PendingManualApproval,
        evaluation_result: EvaluationReport::from_auc(0.91),
        output_prefix: "s3://bucket/run-7".to_string(),
        model_statistics_uri: Some("s3://bucket/monitoring/statistics.json".to_string()),
        model_constraints_uri: None,
        model_data_statistics_uri: None,
        model_data_constraints_uri: None,
        tracking: tracking(),
    };

    let first = register(&fx.runtime, &input).unwrap();
    let second = register(&fx.runtime, &input).unwrap();

    assert_eq!(first.outputs.model_package_group_name, "bank-marketing");
    assert!(first.outputs.model_package_arn.ends_with("/bank-marketing/1"));
    assert!(second.outputs.model_package_arn.ends_with("/bank-marketing/2"));

    let stored: EvaluationReport = serde_json::from_slice(
        &fx.objects.read("s3://bucket/run-7/evaluation/evaluation.json").unwrap(),
    )
    .unwrap();
    assert_eq!(stored, input.evaluation_result);

    let store = fx.tracker.snapshot().unwrap();
    let params = store.get_run(&first.run_id).unwrap().params();
    assert_eq!(
        params["model_package_arn"],
        ParamValue::from(first.outputs.model_package_arn.clone())
    );
    assert_eq!(
        params["model_statistics_uri"],
        ParamValue::from("s3://bucket/monitoring/statistics.json")
    );
    assert_eq!(params["data_constraints_uri"], ParamValue::from(""));
    assert!(fx.tracker.artifact(&first.run_id, "evaluation.json").is_ok());

    let packages = fx.runtime.registry.list_packages("bank-marketing").unwrap();
    assert_eq!(packages.len(), 2);
    assert_eq!(
        packages[0].request.model_metrics.model_statistics.as_ref().unwrap().s3_uri,
        "s3://bucket/monitoring/statistics.json"
    );
}

#[test]
fn test_register_rejected_group_fails_run() {
    let fx = fixture();
    let registry: Arc<dyn ModelRegistry> = Arc::new(ObjectStoreRegistry::new(
        fx.objects.clone(),
        "s3://registry/packages",
    ));
    let runtime = fx.runtime.clone().with_registry(registry);
    let input = RegisterInput {
        training_job_name: "training-job-1".to_string(),
        model_package_group_name: "bad/group".to_string(),
        model_approval_status: ApprovalStatus::Approved,
        evaluation_result: EvaluationReport::from_auc(0.5),
        output_prefix: "s3://bucket/run-8".to_string(),
        model_statistics_uri: None,
        model_constraints_uri: None,
        model_data_statistics_uri: None,
        model_data_constraints_uri: None,
        tracking: tracking(),
    };

    let err = register(&runtime, &input).unwrap_err();
    assert!(matches!(err.cause(), Error::Registry(_)));
}

fn feature_records(ids: &[i64], times: &[f64], amounts: &[f64], labels: &[i64]) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("record_id", DataType::Int64, false),
        Field::new("event_time", DataType::Float64, false),
        Field::new("y", DataType::Int64, false),
        Field::new("amount", DataType::Float64, false),
        Field::new("segment", DataType::Utf8, false),
    ]));
    let segments: Vec<&str> = ids.iter().map(|i| if i % 2 == 0 { "a" } else { "b" }).collect();
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(ids.to_vec())),
            Arc::new(Float64Array::from(times.to_vec())),
            Arc::new(Int64Array::from(labels.to_vec())),
            Arc::new(Float64Array::from(amounts.to_vec())),
            Arc::new(StringArray::from(segments)),
        ],
    )
    .unwrap()
}

#[test]
fn test_prepare_datasets_uses_latest_records() {
    let fx = fixture();
    let store = ParquetFeatureStore::new(fx.objects.clone(), "s3://feature-store/offline");

    let ids: Vec<i64> = (0..10).collect();
    let times = vec![1.0; 10];
    let amounts: Vec<f64> = (0..10).map(|i| f64::from(i) * 10.0).collect();
    let labels: Vec<i64> = (0..10).map(|i| i % 2).collect();
    store
        .ingest("bank", &feature_records(&ids, &times, &amounts, &labels))
        .unwrap();
    // Newer versions of records 0 and 1
    store
        .ingest("bank", &feature_records(&[0, 1], &[2.0, 2.0], &[-1.0, -2.0], &[1, 1]))
        .unwrap();

    let runtime = fx.runtime.clone().with_feature_store(Arc::new(store));
    let input = PrepareDatasetsInput {
        feature_group_name: "bank".to_string(),
        output_prefix: "s3://bucket/run-9".to_string(),
        query_output_uri: "s3://bucket/query-results".to_string(),
        tracking: tracking(),
    };
    let result = prepare_datasets(&runtime, &input).unwrap();

    let baseline = read_csv(
        &fx.objects.read(&result.outputs.baseline_data).unwrap(),
        CsvLayout::HEADERLESS,
    )
    .unwrap();
    // record_id, event_time and y are gone: amount, segment
    assert_eq!(baseline.num_rows(), 10);
    assert_eq!(baseline.num_columns(), 2);

    let query = read_csv(
        &fx.objects.read("s3://bucket/query-results/bank.csv").unwrap(),
        CsvLayout::WITH_HEADER,
    )
    .unwrap();
    assert_eq!(query.num_rows(), 10);

    let tracked = fx.tracker.snapshot().unwrap();
    let inputs = tracked.get_inputs_for_run(&result.run_id);
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].context(), "featureset");
    assert_eq!(inputs[0].dataset().name, "bank");
    assert_eq!(
        tracked.get_run(&result.run_id).unwrap().params()["test"],
        ParamValue::Shape(1, 3)
    );

    assert_eq!(result.outputs.rows, 10);
    assert_eq!(
        result.outputs.shapes,
        SplitShapes {
            full: (10, 3),
            train: (7, 3),
            validate: (2, 3),
            test: (1, 3),
        }
    );
}

#[test]
fn test_prepare_datasets_unknown_group() {
    let fx = fixture();
    let input = PrepareDatasetsInput {
        feature_group_name: "missing".to_string(),
        output_prefix: "s3://bucket/run-10".to_string(),
        query_output_uri: "s3://bucket/query-results".to_string(),
        tracking: tracking(),
    };
    let err = prepare_datasets(&fx.runtime, &input).unwrap_err();
    assert!(matches!(err.cause(), Error::FeatureStore(_)));
}
