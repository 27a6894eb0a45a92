//! Prediction service: health reporting and single-row prediction.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bundle::BundleLoader;
use crate::error::ServiceError;
use crate::features::{AlignmentPolicy, FeatureMap};

/// Response body of a successful prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub prediction: String,
    /// `None` when the model only predicts labels; serialized as `null`.
    pub probabilities: Option<Vec<f32>>,
}

/// Response body of the health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub ok: bool,
    pub pipeline_loaded: bool,
    pub pipeline_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_error: Option<String>,
}

/// Shared, cheaply clonable service handle.
#[derive(Debug, Clone)]
pub struct PredictionService {
    loader: Arc<BundleLoader>,
    alignment: AlignmentPolicy,
}

impl PredictionService {
    pub fn new(loader: BundleLoader, alignment: AlignmentPolicy) -> Self {
        Self {
            loader: Arc::new(loader),
            alignment,
        }
    }

    pub fn loader(&self) -> &BundleLoader {
        &self.loader
    }

    pub fn alignment(&self) -> AlignmentPolicy {
        self.alignment
    }

    /// Report service health. Triggers the bundle load like a prediction would.
    pub fn health(&self) -> HealthStatus {
        let (pipeline_loaded, pipeline_error) = match self.loader.get() {
            Ok(_) => (true, None),
            Err(err) => (false, Some(err.to_string())),
        };

        HealthStatus {
            ok: true,
            pipeline_loaded,
            pipeline_path: self.loader.path().display().to_string(),
            pipeline_error,
        }
    }

    /// Classify one set of features.
    ///
    /// Fails with [`ServiceError::Unavailable`] before looking at the
    /// features when no bundle could be loaded.
    pub fn predict(&self, features: &FeatureMap) -> Result<PredictionResult, ServiceError> {
        let bundle = self.loader.get().map_err(ServiceError::Unavailable)?;

        let prediction = bundle.predict(features, self.alignment).map_err(|err| {
            tracing::warn!(error = %err, n_features = features.len(), "prediction failed");
            ServiceError::Prediction(err)
        })?;

        tracing::debug!(
            prediction = %prediction.label,
            n_features = features.len(),
            "prediction served"
        );
        Ok(PredictionResult {
            prediction: prediction.label,
            probabilities: prediction.probabilities,
        })
    }
}
