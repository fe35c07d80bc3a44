//! # Request Metrics
//!
//! HTTP-level metrics recorded in middleware. Counts are kept twice: as
//! in-process atomics reported by the readiness probe, and through the
//! `metrics` facade so an installed Prometheus recorder exports them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

/// Paths reported under their own label. Anything else is `other`.
const KNOWN_PATHS: &[&str] = &[
    "/validate",
    "/convert",
    "/readyz",
    "/metrics",
    "/health/liveness",
    "/health/readiness",
];

/// Shared request counters.
#[derive(Debug, Clone, Default)]
pub struct ApiMetrics {
    requests: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests seen.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Requests answered with a 4xx or 5xx status.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Record one finished request.
    pub fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let path = route_label(path);
        ::metrics::counter!(
            "omni_http_requests_total",
            "method" => method.to_string(),
            "path" => path,
            "status" => status.to_string()
        )
        .increment(1);
        ::metrics::histogram!(
            "omni_http_request_duration_seconds",
            "method" => method.to_string(),
            "path" => path
        )
        .record(duration_secs);

        if status >= 400 {
            self.errors.fetch_add(1, Ordering::Relaxed);
            ::metrics::counter!(
                "omni_http_errors_total",
                "method" => method.to_string(),
                "path" => path,
                "status" => status.to_string()
            )
            .increment(1);
        }
    }
}

fn route_label(path: &str) -> &'static str {
    KNOWN_PATHS
        .iter()
        .find(|known| **known == path)
        .copied()
        .unwrap_or("other")
}

/// Axum middleware recording request count, latency and errors into the
/// [`ApiMetrics`] extension.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        m.record_request(&method, &path, response.status().as_u16(), start.elapsed().as_secs_f64());
    }

    response
}
