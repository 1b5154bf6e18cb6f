//! Model evaluation: ROC/AUC, the ROC plot, and the evaluation report.

mod plot;
mod report;
mod roc;

pub use plot::ROC_CURVE_FILE;
pub use report::{
    prediction_baseline, ClassificationMetrics, EvaluationReport, EvaluationResult, MetricValue,
    DECISION_THRESHOLD,
};
pub use roc::{auc, roc_curve, RocCurve};
