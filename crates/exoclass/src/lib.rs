//! exoclass: inference front-end for a pre-trained exoplanet classifier.
//!
//! Serves a gradient-boosted tree classifier exported by XGBoost over HTTP.
//! The model is loaded lazily from a JSON bundle, once per process, and a
//! failed load is reported rather than crashing the server.
//!
//! # Key Types
//!
//! - [`BundleLoader`] / [`Bundle`] - Load-once model bundle with class labels
//! - [`PredictionService`] - Health reporting and single-row prediction
//! - [`FeatureMap`] / [`AlignmentPolicy`] - Request features and how they become a row
//! - [`Classifier`] / [`ProbabilisticClassifier`] - Model capabilities
//!
//! # Serving
//!
//! Build a service and hand it to [`api::router`]:
//!
//! ```ignore
//! use exoclass::{AlignmentPolicy, BundleLoader, PredictionService, api};
//!
//! let service = PredictionService::new(
//!     BundleLoader::from_path("xgb_pipeline.pkl"),
//!     AlignmentPolicy::Positional,
//! );
//! let app = api::router(service);
//! ```

pub mod api;
pub mod bundle;
pub mod compat;
pub mod config;
pub mod error;
pub mod features;
pub mod model;
pub mod repr;
pub mod service;
pub mod testing;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use bundle::{Bundle, BundleLoader, BundleSource, FileSource, LoadState, Prediction};
pub use config::Config;
pub use error::{LoadError, LoadFailure, PredictionError, ServiceError};
pub use features::{AlignmentPolicy, FeatureMap, FeatureValue, build_row};
pub use model::{Classifier, GbdtClassifier, ProbabilisticClassifier};
pub use service::{HealthStatus, PredictionResult, PredictionService};
