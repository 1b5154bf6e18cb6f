//! Property-based tests for pipeline-steps
//!
//! - Split sizes and determinism
//! - ROC/AUC bounds and rank invariance
//! - Envelope identifier echo
//! - Run with ProptestConfig::with_cases(100)

use arrow::array::{Int64Array, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema};
use pipeline_steps::dataset::{split_bounds, split_dataset};
use pipeline_steps::envelope::{StepEnvelope, StepInput, StepKind};
use pipeline_steps::evaluation::roc_curve;
use pipeline_steps::tracking::{LocalTracker, RunRequest, Tracker};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Batch with a single `id` column holding 0..rows
fn numbered_batch(rows: usize) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
    let ids = (0..rows).map(|i| i64::try_from(i).unwrap());
    RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from_iter_values(ids))]).unwrap()
}

fn ids(batch: &RecordBatch) -> Vec<i64> {
    batch
        .column(0)
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap()
        .values()
        .to_vec()
}

/// Binary labels with at least one of each class, plus matching scores
fn arb_labelled_scores() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (2usize..60)
        .prop_flat_map(|n| {
            (
                proptest::collection::vec(prop::bool::ANY, n),
                proptest::collection::vec(0.0f64..1.0, n),
            )
        })
        .prop_filter("both classes present", |(labels, _)| {
            labels.iter().any(|&l| l) && labels.iter().any(|&l| !l)
        })
        .prop_map(|(labels, scores)| {
            (
                labels.into_iter().map(|l| if l { 1.0 } else { 0.0 }).collect(),
                scores,
            )
        })
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: the split partitions every row exactly once
    #[test]
    fn prop_split_is_a_partition(rows in 0usize..500, seed in any::<u64>()) {
        let splits = split_dataset(&numbered_batch(rows), seed).unwrap();
        let (train_end, validation_end) = split_bounds(rows);

        prop_assert_eq!(splits.train.num_rows(), train_end);
        prop_assert_eq!(splits.validation.num_rows(), validation_end - train_end);
        prop_assert_eq!(splits.test.num_rows(), rows - validation_end);

        let mut seen: Vec<i64> = ids(&splits.train);
        seen.extend(ids(&splits.validation));
        seen.extend(ids(&splits.test));
        let unique: BTreeSet<i64> = seen.iter().copied().collect();
        prop_assert_eq!(seen.len(), rows);
        prop_assert_eq!(unique.len(), rows);
    }

    /// Property: the same seed produces the same split
    #[test]
    fn prop_split_is_deterministic(rows in 1usize..300, seed in any::<u64>()) {
        let batch = numbered_batch(rows);
        let first = split_dataset(&batch, seed).unwrap();
        let second = split_dataset(&batch, seed).unwrap();

        prop_assert_eq!(ids(&first.train), ids(&second.train));
        prop_assert_eq!(ids(&first.validation), ids(&second.validation));
        prop_assert_eq!(ids(&first.test), ids(&second.test));
    }

    /// Property: AUC lies in [0, 1] and the curve spans (0,0) to (1,1)
    #[test]
    fn prop_auc_is_bounded((labels, scores) in arb_labelled_scores()) {
        let curve = roc_curve(&labels, &scores).unwrap();
        let auc = curve.auc().unwrap();

        prop_assert!((0.0..=1.0).contains(&auc), "auc {} out of range", auc);
        prop_assert_eq!((curve.fpr[0], curve.tpr[0]), (0.0, 0.0));
        prop_assert_eq!(curve.fpr.last().copied(), Some(1.0));
        prop_assert_eq!(curve.tpr.last().copied(), Some(1.0));
    }

    /// Property: AUC depends only on the ranking of the scores
    #[test]
    fn prop_auc_is_rank_invariant((labels, scores) in arb_labelled_scores()) {
        // Power-of-two scaling is exact, so ties and order survive
        let scaled: Vec<f64> = scores.iter().map(|s| s * 4.0).collect();
        let original = roc_curve(&labels, &scores).unwrap().auc().unwrap();
        let transformed = roc_curve(&labels, &scaled).unwrap().auc().unwrap();
        prop_assert!((original - transformed).abs() < 1e-9);
    }

    /// Property: a step nested under a parent run echoes that parent's id
    #[test]
    fn prop_parent_run_id_is_echoed(name in "[a-z][a-z0-9-]{0,20}") {
        let tracker = Arc::new(LocalTracker::in_memory());
        let experiment = tracker.set_experiment("pipeline").unwrap();
        let parent = tracker
            .start_run(
                experiment.experiment_id(),
                &RunRequest::Create { run_name: name, parent_run_id: None },
            )
            .unwrap();

        let shared = tracker.clone();
        let connector = move |_endpoint: &str| -> pipeline_steps::Result<Arc<dyn Tracker>> {
            Ok(shared.clone())
        };
        let input = StepInput::builder("memory:")
            .experiment_name("pipeline")
            .parent_run_id(parent.run_id())
            .build();
        let result = StepEnvelope::new(StepKind::Register)
            .run(&input, &connector, |_ctx| Ok(()))
            .unwrap();

        prop_assert_eq!(result.pipeline_run_id.as_str(), parent.run_id());
        prop_assert_ne!(result.run_id.as_str(), parent.run_id());
    }
}
