//! Logistic regression scorer

use super::{check_width, sigmoid, Classifier};
use crate::Result;
use serde::{Deserialize, Serialize};

/// `p = sigmoid(w · x + b)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    /// One weight per feature column
    pub weights: Vec<f64>,
    /// Bias term
    #[serde(default)]
    pub intercept: f64,
}

impl LogisticModel {
    /// Create a model from weights and intercept.
    #[must_use]
    pub fn new(weights: Vec<f64>, intercept: f64) -> Self {
        Self { weights, intercept }
    }
}

impl Classifier for LogisticModel {
    fn num_features(&self) -> usize {
        self.weights.len()
    }

    fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                check_width(i, row, self.weights.len())?;
                let margin: f64 = self
                    .weights
                    .iter()
                    .zip(row)
                    .map(|(w, x)| w * x)
                    .sum::<f64>()
                    + self.intercept;
                Ok(sigmoid(margin))
            })
            .collect()
    }
}
