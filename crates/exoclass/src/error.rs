//! Error types.
//!
//! - [`LoadError`]: the bundle could not be loaded. Cached and replayed.
//! - [`PredictionError`]: a single request failed after the bundle was available.
//! - [`ServiceError`]: what a predict call reports to its caller.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::compat::xgboost::ConversionError;
use crate::model::InferenceError;

/// Why a bundle failed to load.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadFailure {
    #[error("cannot read artifact: {0}")]
    Io(Arc<io::Error>),
    #[error("malformed bundle: {0}")]
    Format(Arc<serde_json::Error>),
    #[error("unsupported model: {0}")]
    Model(#[from] ConversionError),
    #[error("bundle has {labels} class labels but the model predicts {classes} classes")]
    ClassCountMismatch { labels: usize, classes: usize },
    #[error(
        "bundle lists {names} feature names but the model expects {expected} features"
    )]
    FeatureNamesMismatch { names: usize, expected: usize },
}

impl From<io::Error> for LoadFailure {
    fn from(err: io::Error) -> Self {
        LoadFailure::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for LoadFailure {
    fn from(err: serde_json::Error) -> Self {
        LoadFailure::Format(Arc::new(err))
    }
}

/// Bundle load failure, carrying the artifact location.
///
/// `Clone` so a cached failure can be handed to every later caller.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Failed to load pipeline from '{}': {cause}", .path.display())]
pub struct LoadError {
    path: PathBuf,
    #[source]
    cause: LoadFailure,
}

impl LoadError {
    pub fn new(path: impl AsRef<Path>, cause: impl Into<LoadFailure>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cause: cause.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cause(&self) -> &LoadFailure {
        &self.cause
    }
}

/// Failure while building the feature row or running inference.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictionError {
    #[error("feature '{name}' has non-numeric value {value}")]
    InvalidFeature { name: String, value: String },
    #[error("by-name alignment requires feature names, but the bundle carries none")]
    MissingFeatureSchema,
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("model predicted class index {index} but only {n_labels} class labels are known")]
    LabelOutOfRange { index: usize, n_labels: usize },
    #[error("prediction worker aborted: {0}")]
    Aborted(String),
}

/// Error returned by the prediction service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    /// No bundle is available; carries the load failure.
    #[error("{0}")]
    Unavailable(LoadError),
    #[error("Prediction error: {0}")]
    Prediction(#[from] PredictionError),
}

impl ServiceError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ServiceError::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_message_names_path_and_cause() {
        let err = LoadError::new(
            "missing.json",
            io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to load pipeline from 'missing.json'"), "{msg}");
        assert!(msg.contains("No such file or directory"), "{msg}");
    }

    #[test]
    fn class_count_mismatch_message() {
        let err = LoadError::new(
            "bundle.json",
            LoadFailure::ClassCountMismatch {
                labels: 2,
                classes: 3,
            },
        );
        assert!(err.to_string().contains("2 class labels"));
        assert!(matches!(err.cause(), LoadFailure::ClassCountMismatch { .. }));
    }

    #[test]
    fn prediction_error_is_prefixed() {
        let err = ServiceError::from(PredictionError::MissingFeatureSchema);
        assert!(!err.is_unavailable());
        assert!(err.to_string().starts_with("Prediction error: "));
    }
}
