//! # Module Instances
//!
//! A compiled and instantiated module together with the store that owns
//! its memory and globals. Instances are not reentrant: callers hold the
//! instance's mutex for the whole call.

use omni_core::PluginError;
use serde_json::Value;
use wasmtime::{
    Engine, Instance, Module, Store, StoreLimits, StoreLimitsBuilder, Trap, TypedFunc,
};

use crate::config::SandboxConfig;
use crate::error::SandboxError;

/// Export used to reserve guest memory for the value.
pub const ALLOC_EXPORT: &str = "alloc";

/// Exported linear memory the value is written into.
pub const MEMORY_EXPORT: &str = "memory";

/// A resolved validation entry point.
pub enum Entry {
    /// `(ptr, len) -> i32`, called with the value's JSON.
    WithValue(TypedFunc<(i32, i32), i32>),
    /// `() -> i32`, called without the value.
    Nullary(TypedFunc<(), i32>),
}

/// An instantiated module and its store.
pub struct ModuleInstance {
    id: String,
    fuel_per_call: u64,
    store: Store<StoreLimits>,
    instance: Instance,
}

impl std::fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("id", &self.id)
            .field("fuel_per_call", &self.fuel_per_call)
            .finish()
    }
}

impl ModuleInstance {
    /// Compile and instantiate `bytes` in a fresh store.
    pub fn new(
        engine: &Engine,
        config: &SandboxConfig,
        id: &str,
        bytes: &[u8],
    ) -> Result<Self, SandboxError> {
        let module = Module::new(engine, bytes).map_err(|e| SandboxError::Compile {
            module: id.to_string(),
            reason: format!("{e:#}"),
        })?;

        let limits = StoreLimitsBuilder::new()
            .memory_size(config.max_memory_bytes)
            .instances(1)
            .build();
        let mut store = Store::new(engine, limits);
        store.limiter(|limits| limits);
        let instantiate_err = |e: wasmtime::Error| SandboxError::Instantiate {
            module: id.to_string(),
            reason: format!("{e:#}"),
        };
        // Start functions run during instantiation and need fuel too.
        store
            .set_fuel(config.fuel_per_call)
            .map_err(instantiate_err)?;
        let instance = Instance::new(&mut store, &module, &[]).map_err(instantiate_err)?;

        Ok(Self {
            id: id.to_string(),
            fuel_per_call: config.fuel_per_call,
            store,
            instance,
        })
    }

    /// Resolve `function` to a supported entry point.
    ///
    /// # Errors
    ///
    /// [`PluginError::Lookup`] when the export is missing, has an
    /// unsupported signature, or needs `alloc`/`memory` exports the module
    /// lacks.
    pub fn entry(&mut self, function: &str) -> Result<Entry, PluginError> {
        let func = self
            .instance
            .get_func(&mut self.store, function)
            .ok_or_else(|| {
                PluginError::Lookup(format!("module {} has no exported function {function}", self.id))
            })?;

        if let Ok(typed) = func.typed::<(i32, i32), i32>(&self.store) {
            self.alloc()?;
            self.memory()?;
            return Ok(Entry::WithValue(typed));
        }
        if let Ok(typed) = func.typed::<(), i32>(&self.store) {
            return Ok(Entry::Nullary(typed));
        }
        Err(PluginError::Lookup(format!(
            "{}:{function} has signature {:?}, expected (i32, i32) -> i32 or () -> i32",
            self.id,
            func.ty(&self.store)
        )))
    }

    /// Call `function` with `value`. Returns the function's result code.
    pub fn call(&mut self, function: &str, value: &Value) -> Result<i32, PluginError> {
        match self.entry(function)? {
            Entry::Nullary(func) => {
                self.refuel()?;
                func.call(&mut self.store, ()).map_err(|e| self.trap(e))
            }
            Entry::WithValue(func) => {
                let bytes = serde_json::to_vec(value)
                    .map_err(|e| PluginError::Evaluation(format!("failed to encode value: {e}")))?;
                let len = i32::try_from(bytes.len()).map_err(|_| {
                    PluginError::Evaluation(format!("value of {} bytes is too large", bytes.len()))
                })?;

                self.refuel()?;
                let alloc = self.alloc()?;
                let ptr = alloc.call(&mut self.store, len).map_err(|e| self.trap(e))?;
                self.memory()?
                    .write(&mut self.store, ptr as u32 as usize, &bytes)
                    .map_err(|_| {
                        PluginError::Evaluation(format!(
                            "{}:{ALLOC_EXPORT} returned pointer {ptr} outside memory for {len} bytes",
                            self.id
                        ))
                    })?;
                func.call(&mut self.store, (ptr, len)).map_err(|e| self.trap(e))
            }
        }
    }

    fn alloc(&mut self) -> Result<TypedFunc<i32, i32>, PluginError> {
        self.instance
            .get_typed_func::<i32, i32>(&mut self.store, ALLOC_EXPORT)
            .map_err(|e| {
                PluginError::Lookup(format!(
                    "module {} needs an {ALLOC_EXPORT}(i32) -> i32 export: {e:#}",
                    self.id
                ))
            })
    }

    fn memory(&mut self) -> Result<wasmtime::Memory, PluginError> {
        self.instance
            .get_memory(&mut self.store, MEMORY_EXPORT)
            .ok_or_else(|| {
                PluginError::Lookup(format!(
                    "module {} needs an exported {MEMORY_EXPORT}",
                    self.id
                ))
            })
    }

    fn refuel(&mut self) -> Result<(), PluginError> {
        self.store
            .set_fuel(self.fuel_per_call)
            .map_err(|e| PluginError::Evaluation(format!("failed to set fuel: {e:#}")))
    }

    fn trap(&self, error: wasmtime::Error) -> PluginError {
        match error.downcast_ref::<Trap>() {
            Some(Trap::OutOfFuel) => PluginError::Evaluation(format!(
                "module {} exhausted its fuel budget of {}",
                self.id, self.fuel_per_call
            )),
            _ => PluginError::Evaluation(format!("module {} trapped: {error:#}", self.id)),
        }
    }
}
