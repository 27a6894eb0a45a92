//! XGBoost JSON model format support.
//!
//! Parses the JSON document written by `Booster.save_model` and converts
//! tree boosters with a classification objective into a [`GbdtClassifier`].
//!
//! [`GbdtClassifier`]: crate::model::GbdtClassifier

mod convert;
mod json;

pub use convert::ConversionError;
pub use json::*;
