//! HTTP surface.
//!
//! - `GET /health`: [`HealthStatus`](crate::service::HealthStatus)
//! - `POST /predict`: `{"features": {...}}` to
//!   [`PredictionResult`](crate::service::PredictionResult)
//!
//! Errors are returned as `{"detail": "..."}` with 503 when the bundle is
//! unavailable, 500 when the prediction fails and 422 when the request body
//! cannot be read.

mod handlers;

pub use handlers::{ApiError, PredictRequest};

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::service::PredictionService;

/// Permissive CORS: any origin, method and header.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the application router.
pub fn router(service: PredictionService) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/predict", post(handlers::predict))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(service)
}
