//! # Application State
//!
//! Everything a handler needs, cheap to clone. The schema registry and
//! plugin registry are shared by `Arc`; the engines are thin handles over
//! the plugin registry.

use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;
use omni_core::Deadline;
use omni_engine::{ConversionEngine, FormatValidatorEngine, PluginRegistry};
use omni_schema::SchemaRegistry;

use crate::config::DEFAULT_REQUEST_TIMEOUT_MS;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// Schemas registered from CRDs.
    pub schemas: Arc<SchemaRegistry>,
    /// Admission checks and dry-run compiles.
    pub validator: FormatValidatorEngine,
    /// Version conversion.
    pub converter: ConversionEngine,
    /// Bound on the engine work of one request.
    pub request_timeout: Duration,
    /// Renders `/metrics` when a recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("schemas", &self.schemas)
            .field("plugins", self.validator.plugins())
            .field("request_timeout", &self.request_timeout)
            .field("prometheus", &self.prometheus.is_some())
            .finish()
    }
}

impl AppState {
    /// State over `schemas` dispatching to `plugins`.
    pub fn new(schemas: Arc<SchemaRegistry>, plugins: Arc<PluginRegistry>) -> Self {
        Self {
            schemas,
            validator: FormatValidatorEngine::new(Arc::clone(&plugins)),
            converter: ConversionEngine::new(plugins),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            prometheus: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_prometheus(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.prometheus = handle;
        self
    }

    /// A fresh deadline for a request arriving now.
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.request_timeout)
    }
}
