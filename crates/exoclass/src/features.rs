//! Feature values and feature-row alignment.
//!
//! Requests carry an insertion-ordered mapping of feature name to scalar.
//! [`build_row`] turns it into a fixed-width `f32` row with NaN standing in
//! for missing values; the trees route NaN along each split's default branch.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::PredictionError;

/// Scalar feature value as supplied by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FeatureValue {
    /// Coerce to the model's input type. `None` means the value is not numeric.
    pub fn to_f32(&self) -> Option<f32> {
        match self {
            FeatureValue::Null => Some(f32::NAN),
            FeatureValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            FeatureValue::Number(n) => Some(*n as f32),
            FeatureValue::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    Some(f32::NAN)
                } else {
                    t.parse::<f32>().ok()
                }
            }
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Null => write!(f, "null"),
            FeatureValue::Bool(b) => write!(f, "{b}"),
            FeatureValue::Number(n) => write!(f, "{n}"),
            FeatureValue::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Number(value)
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        FeatureValue::Text(value.to_string())
    }
}

impl From<bool> for FeatureValue {
    fn from(value: bool) -> Self {
        FeatureValue::Bool(value)
    }
}

/// Feature name to value, in the order the client supplied them.
pub type FeatureMap = IndexMap<String, FeatureValue>;

/// How supplied features are mapped onto model input slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlignmentPolicy {
    /// Values fill slots in insertion order; names are ignored.
    #[default]
    Positional,
    /// Slot `i` takes the value named like the model's `i`-th training column.
    ByName,
}

impl AlignmentPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlignmentPolicy::Positional => "positional",
            AlignmentPolicy::ByName => "by-name",
        }
    }
}

impl fmt::Display for AlignmentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlignmentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positional" => Ok(AlignmentPolicy::Positional),
            "by-name" | "by_name" | "name" => Ok(AlignmentPolicy::ByName),
            other => Err(format!(
                "unknown alignment policy '{other}' (expected 'positional' or 'by-name')"
            )),
        }
    }
}

fn coerce(name: &str, value: &FeatureValue) -> Result<f32, PredictionError> {
    value.to_f32().ok_or_else(|| PredictionError::InvalidFeature {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Build a row of exactly `width` columns from the supplied features.
///
/// Positional: the first `width` values in insertion order, right-padded with
/// NaN. Values past `width` are dropped without being coerced.
///
/// By name: requires `feature_names`; unknown names are ignored and absent
/// names become NaN.
pub fn build_row(
    features: &FeatureMap,
    width: usize,
    policy: AlignmentPolicy,
    feature_names: Option<&[String]>,
) -> Result<Array1<f32>, PredictionError> {
    let mut row = Array1::from_elem(width, f32::NAN);

    match policy {
        AlignmentPolicy::Positional => {
            for (slot, (name, value)) in row.iter_mut().zip(features.iter()) {
                *slot = coerce(name, value)?;
            }
        }
        AlignmentPolicy::ByName => {
            let names = feature_names.ok_or(PredictionError::MissingFeatureSchema)?;
            for (slot, name) in row.iter_mut().zip(names.iter()) {
                if let Some(value) = features.get(name) {
                    *slot = coerce(name, value)?;
                }
            }
        }
    }

    Ok(row)
}
