//! Trained models
//!
//! A model archive is a zip object containing `model.json`, a document
//! tagged by `kind`:
//!
//! ```json
//! {"kind": "logistic", "weights": [0.4, -1.2], "intercept": 0.1}
//! {"kind": "tree_ensemble", "num_features": 2, "base_margin": 0.0, "trees": [...]}
//! ```
//!
//! Scoring returns the positive-class probability for every row.

mod logistic;
mod tree;

pub use logistic::LogisticModel;
pub use tree::{Tree, TreeEnsemble, TreeNode};

use crate::storage::ObjectStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read, Write};

/// Entry holding the model document inside an archive.
pub const MODEL_ENTRY: &str = "model.json";

/// Binary classifier producing positive-class probabilities.
pub trait Classifier: Send + Sync {
    /// Number of feature columns each row must have.
    fn num_features(&self) -> usize;

    /// Probability of the positive class for each row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Model`] if a row has the wrong number of features.
    fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>>;
}

/// Serialized form of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelDocument {
    /// Logistic regression
    Logistic(LogisticModel),
    /// Boosted trees
    TreeEnsemble(TreeEnsemble),
}

impl ModelDocument {
    /// Turn the document into a scorer.
    #[must_use]
    pub fn into_classifier(self) -> Box<dyn Classifier> {
        match self {
            Self::Logistic(model) => Box::new(model),
            Self::TreeEnsemble(model) => Box::new(model),
        }
    }
}

/// Load and decode the model archive stored at `uri`.
///
/// # Errors
///
/// Returns the storage error, [`Error::Archive`] if the object is not a zip
/// or lacks `model.json`, or [`Error::Serde`] if the document is malformed.
pub fn load_model(objects: &dyn ObjectStore, uri: &str) -> Result<Box<dyn Classifier>> {
    let document = read_archive(&objects.read(uri)?)?;
    tracing::debug!(uri, "loaded model archive");
    Ok(document.into_classifier())
}

/// Decode the document inside a model archive.
///
/// # Errors
///
/// See [`load_model`].
pub fn read_archive(archive: &[u8]) -> Result<ModelDocument> {
    let mut archive = zip::ZipArchive::new(Cursor::new(archive))?;
    let mut entry = archive.by_name(MODEL_ENTRY)?;
    let mut json = String::new();
    entry.read_to_string(&mut json)?;
    Ok(serde_json::from_str(&json)?)
}

/// Package a model document as an archive.
///
/// # Errors
///
/// Returns [`Error::Archive`] or [`Error::Serde`] if encoding fails.
pub fn write_archive(document: &ModelDocument) -> Result<Vec<u8>> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    zip.start_file(MODEL_ENTRY, options)?;
    zip.write_all(&serde_json::to_vec(document)?)?;
    Ok(zip.finish()?.into_inner())
}

pub(crate) fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

pub(crate) fn check_width(row: usize, values: &[f64], expected: usize) -> Result<()> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(Error::Model(format!(
            "row {row} has {} features, model expects {expected}",
            values.len()
        )))
    }
}
