//! # Sandbox Validator
//!
//! `wasm:<moduleId>:<function>` annotations, dispatched to registered
//! module instances.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use omni_core::{PluginError, SchemaNode};
use omni_engine::{FormatValidator, PluginContext};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use wasmtime::{Config, Engine};

use crate::config::SandboxConfig;
use crate::error::SandboxError;
use crate::instance::ModuleInstance;

/// Plugin id the validator is registered under by default.
pub const WASM_PLUGIN_ID: &str = "wasm";

/// Runs exported module functions as validators.
pub struct SandboxValidator {
    engine: Engine,
    config: SandboxConfig,
    modules: RwLock<HashMap<String, Arc<Mutex<ModuleInstance>>>>,
}

impl std::fmt::Debug for SandboxValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxValidator")
            .field("config", &self.config)
            .field("modules", &self.module_ids())
            .finish()
    }
}

impl SandboxValidator {
    /// Create a validator with no modules registered.
    pub fn new(config: SandboxConfig) -> Result<Self, SandboxError> {
        let mut engine_config = Config::new();
        engine_config.consume_fuel(true);
        let engine = Engine::new(&engine_config).map_err(|e| SandboxError::Engine(format!("{e:#}")))?;
        Ok(Self {
            engine,
            config,
            modules: RwLock::new(HashMap::new()),
        })
    }

    /// The limits applied to every instance.
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Compile and instantiate `bytes` under `id`.
    ///
    /// Nothing is stored unless both steps succeed. An existing module with
    /// the same id is replaced; calls already holding the old instance
    /// finish against it.
    pub fn register_module(&self, id: &str, bytes: &[u8]) -> Result<(), SandboxError> {
        let instance = ModuleInstance::new(&self.engine, &self.config, id, bytes)?;
        let replaced = self
            .modules
            .write()
            .insert(id.to_string(), Arc::new(Mutex::new(instance)))
            .is_some();
        tracing::info!(module = id, replaced, "sandbox module registered");
        Ok(())
    }

    /// Read a module from disk and register it under `id`. Accepts binary
    /// modules and the text format.
    pub fn register_module_file(&self, id: &str, path: &Path) -> Result<(), SandboxError> {
        let bytes = std::fs::read(path).map_err(|source| SandboxError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.register_module(id, &bytes)
    }

    /// Registered module ids, sorted.
    pub fn module_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.modules.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn instance(&self, module: &str) -> Result<Arc<Mutex<ModuleInstance>>, PluginError> {
        self.modules
            .read()
            .get(module)
            .cloned()
            .ok_or_else(|| PluginError::Lookup(format!("no module registered as {module:?}")))
    }
}

/// Split `<moduleId>:<function>`. Both parts must be non-empty and the
/// function name may not contain another colon.
fn parse_payload(payload: &str) -> Result<(&str, &str), PluginError> {
    let mut parts = payload.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(module), Some(function), None) if !module.is_empty() && !function.is_empty() => {
            Ok((module, function))
        }
        _ => Err(PluginError::Compile(format!(
            "payload {payload:?} is not of the form <module>:<function>"
        ))),
    }
}

impl FormatValidator for SandboxValidator {
    fn validate_program(
        &self,
        _ctx: &PluginContext<'_>,
        payload: &str,
        _node: &SchemaNode,
    ) -> Result<(), PluginError> {
        let (module, function) = parse_payload(payload)?;
        let instance = self.instance(module)?;
        let mut guard = instance.lock();
        guard.entry(function).map(|_| ())
    }

    fn validate(
        &self,
        ctx: &PluginContext<'_>,
        payload: &str,
        _node: &SchemaNode,
        value: &Value,
    ) -> Result<(), PluginError> {
        let (module, function) = parse_payload(payload)?;
        let instance = self.instance(module)?;
        ctx.check_deadline()?;
        let mut guard = instance.lock();
        // Waiting for the instance may have used up the deadline.
        ctx.check_deadline()?;
        match guard.call(function, value)? {
            0 => Ok(()),
            code => Err(PluginError::Rejected(format!("{payload} returned {code} for {value}"))),
        }
    }
}
