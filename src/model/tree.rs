//! Boosted tree ensemble (binary logistic objective)
//!
//! Trees are stored as flat node arrays; node 0 is the root. A split sends a
//! row to `yes` when `x[feature] < threshold`, otherwise to `no`. The
//! probability is `sigmoid(base_margin + Σ leaf values)`.

use super::{check_width, sigmoid, Classifier};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// One node of a regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// Internal node
    Split {
        /// Feature column index
        feature: usize,
        /// Rows with a smaller value go to `yes`
        threshold: f64,
        /// Node index for `x < threshold`
        yes: usize,
        /// Node index otherwise
        no: usize,
    },
    /// Terminal node
    Leaf {
        /// Margin contribution
        value: f64,
    },
}

/// A single regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    /// Nodes, root first
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    fn margin(&self, row: &[f64]) -> Result<f64> {
        let mut idx = 0;
        // A well-formed tree reaches a leaf in at most `nodes.len()` hops.
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value }) => return Ok(*value),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    yes,
                    no,
                }) => {
                    let x = row.get(*feature).ok_or_else(|| {
                        Error::Model(format!("split on feature {feature} out of range"))
                    })?;
                    idx = if x < threshold { *yes } else { *no };
                }
                None => return Err(Error::Model(format!("tree node {idx} does not exist"))),
            }
        }
        Err(Error::Model("tree contains a cycle".to_string()))
    }
}

/// Sum of trees on the logit scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    /// Number of feature columns the trees were trained on
    pub num_features: usize,
    /// Starting margin before any tree
    #[serde(default)]
    pub base_margin: f64,
    /// Boosting rounds
    pub trees: Vec<Tree>,
}

impl Classifier for TreeEnsemble {
    fn num_features(&self) -> usize {
        self.num_features
    }

    fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                check_width(i, row, self.num_features)?;
                let mut margin = self.base_margin;
                for tree in &self.trees {
                    margin += tree.margin(row)?;
                }
                Ok(sigmoid(margin))
            })
            .collect()
    }
}
