//! Loaders for models exported by other libraries.

pub mod xgboost;
