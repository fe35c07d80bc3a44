//! # omni-api: Admission and Conversion Webhook
//!
//! The HTTP surface of the format-validation engine, built on
//! Axum/Tower/Tokio.
//!
//! ## API Surface
//!
//! | Route                    | Module                  | Purpose                          |
//! |--------------------------|-------------------------|----------------------------------|
//! | `POST /validate`         | [`routes::validate`]    | AdmissionReview                  |
//! | `POST /convert`          | [`routes::convert`]     | ConversionReview                 |
//! | `GET /readyz`            | this module             | plain `ok`                       |
//! | `GET /health/liveness`   | this module             | Kubernetes liveness probe        |
//! | `GET /health/readiness`  | this module             | readiness with registry counts   |
//! | `GET /metrics`           | this module             | Prometheus text, when installed  |
//!
//! ## Middleware Stack (Tower)
//!
//! TraceLayer → MetricsMiddleware → Handler, on the review routes.
//!
//! Engine work runs on the blocking pool under a deadline derived from the
//! configured request timeout. TLS termination is left to the deployment.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod extractors;
pub mod feed;
pub mod middleware;
pub mod review;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

pub use error::AppError;
pub use state::AppState;

use crate::middleware::metrics::ApiMetrics;

/// Largest review body accepted. The API server caps requests at 3 MiB.
const MAX_REVIEW_BYTES: usize = 3 * 1024 * 1024;

/// Assemble the application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let metrics = ApiMetrics::new();

    let reviews = Router::new()
        .merge(routes::validate::router())
        .merge(routes::convert::router())
        .layer(DefaultBodyLimit::max(MAX_REVIEW_BYTES))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(Extension(metrics.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let probes = Router::new()
        .route("/readyz", get(readyz))
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .layer(Extension(metrics))
        .with_state(state);

    Router::new().merge(probes).merge(reviews)
}

async fn readyz() -> &'static str {
    "ok"
}

async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. The registries are in memory, so a responding process
/// is ready; the body reports what it has loaded.
async fn readiness(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> impl IntoResponse {
    let plugins = state.validator.plugins();
    Json(json!({
        "status": "ready",
        "schemas": state.schemas.len(),
        "validators": plugins.validator_ids(),
        "converters": plugins.converter_ids(),
        "requests": metrics.requests(),
        "errors": metrics.errors(),
    }))
}

/// GET /metrics: Prometheus text exposition from the installed recorder.
async fn prometheus_metrics(State(state): State<AppState>) -> Result<Response, AppError> {
    let handle = state
        .prometheus
        .as_ref()
        .ok_or_else(|| AppError::NotFound("metrics recorder not installed".into()))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------
