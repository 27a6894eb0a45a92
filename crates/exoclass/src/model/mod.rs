//! Inference capabilities.
//!
//! The service only talks to models through the [`Classifier`] and
//! [`ProbabilisticClassifier`] traits. [`GbdtClassifier`] is the tree-ensemble
//! implementation produced by the XGBoost loader.

pub mod classifier;
pub mod transform;

pub use classifier::{
    ClassificationObjective, Classifier, GbdtClassifier, InferenceError, ProbabilisticClassifier,
    argmax,
};
pub use transform::OutputTransform;
