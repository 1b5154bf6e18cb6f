//! Parameter values logged against a run

use serde::{Deserialize, Serialize};
use std::fmt;

/// A logged parameter: a scalar or a table shape.
///
/// Tracking backends store parameters as strings; [`fmt::Display`] gives the
/// wire form. Shapes render as `(rows, cols)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Integer parameter
    Int(i64),
    /// Floating point parameter
    Float(f64),
    /// Free-form text (URIs, identifiers)
    Text(String),
    /// Table shape as `(rows, columns)`
    Shape(usize, usize),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Shape(rows, cols) => write!(f, "({rows}, {cols})"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<(usize, usize)> for ParamValue {
    fn from((rows, cols): (usize, usize)) -> Self {
        Self::Shape(rows, cols)
    }
}
