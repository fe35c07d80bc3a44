//! # Bootstrap
//!
//! Builds the plugin registry and the initial schema registry before the
//! server starts accepting reviews.
//!
//! ## Sequence
//!
//! 1. **Plugins**: expression validator (`rule`), sandbox validator
//!    (`wasm`) with every configured module, expression converter
//!    (`conversion`).
//! 2. **Schemas**: an empty registry with every plugin observer subscribed.
//! 3. **CRDs**: when a CRD directory is configured, every manifest in it is
//!    registered and dry-run compiled.

use std::sync::Arc;

use omni_cel::{ExpressionConverter, ExpressionValidator, CONVERSION_PLUGIN_ID, RULE_PLUGIN_ID};
use omni_engine::PluginRegistry;
use omni_schema::{load_crd_dir, LoadError, SchemaRegistry};
use omni_wasm::{SandboxError, SandboxValidator, WASM_PLUGIN_ID};

use crate::config::{PluginConfig, ServerConfig};
use crate::feed;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors during startup.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// The sandbox could not be created or a module failed to register.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// The CRD directory could not be read or a manifest failed to parse.
    #[error(transparent)]
    Load(#[from] LoadError),
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Build the frozen plugin registry.
pub fn build_plugins(config: &PluginConfig) -> Result<Arc<PluginRegistry>, BootstrapError> {
    let sandbox = SandboxValidator::new(config.sandbox())?;
    for module in &config.modules {
        sandbox.register_module_file(&module.id, &module.path)?;
    }

    let plugins = PluginRegistry::builder()
        .register_validator(RULE_PLUGIN_ID, Arc::new(ExpressionValidator::new()))
        .register_validator(WASM_PLUGIN_ID, Arc::new(sandbox))
        .register_converter(CONVERSION_PLUGIN_ID, Arc::new(ExpressionConverter::new()))
        .build();

    tracing::info!(
        validators = ?plugins.validator_ids(),
        converters = ?plugins.converter_ids(),
        modules = config.modules.len(),
        "plugins registered"
    );
    Ok(plugins)
}

/// An empty schema registry wired to `plugins`' observers.
pub fn schema_registry(plugins: &PluginRegistry) -> Arc<SchemaRegistry> {
    let schemas = Arc::new(SchemaRegistry::new());
    plugins.subscribe_to(&schemas);
    schemas
}

/// Build the application state for `config`.
pub fn bootstrap(config: &ServerConfig) -> Result<AppState, BootstrapError> {
    let plugins = build_plugins(&config.plugins)?;
    let schemas = schema_registry(&plugins);
    let state = AppState::new(schemas, plugins).with_request_timeout(config.request_timeout());

    if let Some(dir) = &config.crd_dir {
        for crd in load_crd_dir(dir)? {
            feed::apply_crd(&state, &crd);
        }
    }

    tracing::info!(
        schemas = state.schemas.len(),
        timeout_ms = config.request_timeout_ms,
        "bootstrap complete"
    );
    Ok(state)
}
