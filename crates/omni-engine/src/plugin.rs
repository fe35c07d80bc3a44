//! # Plugin Contracts
//!
//! The two traits a policy engine implements to take part in validation
//! and conversion, and the registry that maps plugin ids to them.

use std::collections::HashMap;
use std::sync::Arc;

use omni_core::{Deadline, FieldPath, PluginError, SchemaNode};
use omni_schema::{SchemaObserver, SchemaRegistry};
use serde_json::Value;

/// Per-node context handed to every plugin call.
#[derive(Debug, Clone, Copy)]
pub struct PluginContext<'a> {
    /// Field path of the node being visited.
    pub path: &'a FieldPath,
    /// Deadline of the enclosing request.
    pub deadline: Deadline,
}

impl PluginContext<'_> {
    /// Fail with [`PluginError::DeadlineExceeded`] if the deadline passed.
    pub fn check_deadline(&self) -> Result<(), PluginError> {
        if self.deadline.is_expired() {
            Err(PluginError::DeadlineExceeded)
        } else {
            Ok(())
        }
    }
}

/// A policy engine that validates annotated fields.
pub trait FormatValidator: Send + Sync {
    /// Compile `payload` against `node` without any data.
    fn validate_program(
        &self,
        ctx: &PluginContext<'_>,
        payload: &str,
        node: &SchemaNode,
    ) -> Result<(), PluginError>;

    /// Check `value` (the data at `node`) against `payload`.
    fn validate(
        &self,
        ctx: &PluginContext<'_>,
        payload: &str,
        node: &SchemaNode,
        value: &Value,
    ) -> Result<(), PluginError>;

    /// Observer to subscribe to schema registrations, for plugins holding
    /// per-schema state. Queried once when the plugin is registered.
    fn schema_observer(self: Arc<Self>) -> Option<Arc<dyn SchemaObserver>> {
        None
    }
}

/// A policy engine that rewrites annotated fields during conversion.
pub trait FormatConverter: Send + Sync {
    /// Produce the target value for `value`. The result is used as-is.
    fn convert(
        &self,
        ctx: &PluginContext<'_>,
        payload: &str,
        source: &SchemaNode,
        target: &SchemaNode,
        value: &Value,
    ) -> Result<Value, PluginError>;

    /// See [`FormatValidator::schema_observer`].
    fn schema_observer(self: Arc<Self>) -> Option<Arc<dyn SchemaObserver>> {
        None
    }
}

/// Plugin ids mapped to their implementations. Immutable once built.
#[derive(Default)]
pub struct PluginRegistry {
    validators: HashMap<String, Arc<dyn FormatValidator>>,
    converters: HashMap<String, Arc<dyn FormatConverter>>,
    observers: Vec<Arc<dyn SchemaObserver>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("validators", &self.validator_ids())
            .field("converters", &self.converter_ids())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl PluginRegistry {
    /// Start building a registry.
    pub fn builder() -> PluginRegistryBuilder {
        PluginRegistryBuilder::default()
    }

    /// The validator registered under `id`.
    pub fn validator(&self, id: &str) -> Option<&Arc<dyn FormatValidator>> {
        self.validators.get(id)
    }

    /// The converter registered under `id`.
    pub fn converter(&self, id: &str) -> Option<&Arc<dyn FormatConverter>> {
        self.converters.get(id)
    }

    /// Registered validator ids, sorted.
    pub fn validator_ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.validators.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Registered converter ids, sorted.
    pub fn converter_ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.converters.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Observers collected from plugins at registration time.
    pub fn observers(&self) -> &[Arc<dyn SchemaObserver>] {
        &self.observers
    }

    /// Subscribe every plugin observer to `schemas`.
    pub fn subscribe_to(&self, schemas: &SchemaRegistry) {
        for observer in &self.observers {
            schemas.subscribe(Arc::clone(observer));
        }
    }
}

/// Builder for [`PluginRegistry`].
#[derive(Default)]
pub struct PluginRegistryBuilder {
    inner: PluginRegistry,
}

impl PluginRegistryBuilder {
    /// Register a validator under `id`, replacing any earlier one.
    pub fn register_validator(
        mut self,
        id: impl Into<String>,
        validator: Arc<dyn FormatValidator>,
    ) -> Self {
        let id = id.into();
        if let Some(observer) = Arc::clone(&validator).schema_observer() {
            self.inner.observers.push(observer);
        }
        tracing::debug!(plugin = %id, "format validator registered");
        self.inner.validators.insert(id, validator);
        self
    }

    /// Register a converter under `id`, replacing any earlier one.
    pub fn register_converter(
        mut self,
        id: impl Into<String>,
        converter: Arc<dyn FormatConverter>,
    ) -> Self {
        let id = id.into();
        if let Some(observer) = Arc::clone(&converter).schema_observer() {
            self.inner.observers.push(observer);
        }
        tracing::debug!(plugin = %id, "format converter registered");
        self.inner.converters.insert(id, converter);
        self
    }

    /// Freeze the registry.
    pub fn build(self) -> Arc<PluginRegistry> {
        Arc::new(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omni_schema::VersionedSchema;
    use parking_lot::Mutex;
    use std::time::{Duration, Instant};

    struct Noop;

    impl FormatValidator for Noop {
        fn validate_program(&self, _: &PluginContext<'_>, _: &str, _: &SchemaNode) -> Result<(), PluginError> {
            Ok(())
        }
        fn validate(&self, _: &PluginContext<'_>, _: &str, _: &SchemaNode, _: &Value) -> Result<(), PluginError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Watching {
        seen: Mutex<usize>,
    }

    impl FormatValidator for Watching {
        fn validate_program(&self, _: &PluginContext<'_>, _: &str, _: &SchemaNode) -> Result<(), PluginError> {
            Ok(())
        }
        fn validate(&self, _: &PluginContext<'_>, _: &str, _: &SchemaNode, _: &Value) -> Result<(), PluginError> {
            Ok(())
        }
        fn schema_observer(self: Arc<Self>) -> Option<Arc<dyn SchemaObserver>> {
            Some(self)
        }
    }

    impl SchemaObserver for Watching {
        fn schema_registered(&self, _: &VersionedSchema, _: Option<&VersionedSchema>) {
            *self.seen.lock() += 1;
        }
    }

    #[test]
    fn builder_collects_observers_only_from_capable_plugins() {
        let watching = Arc::new(Watching::default());
        let registry = PluginRegistry::builder()
            .register_validator("noop", Arc::new(Noop))
            .register_validator("watch", watching.clone())
            .build();
        assert_eq!(registry.validator_ids(), vec!["noop", "watch"]);
        assert_eq!(registry.observers().len(), 1);
        assert!(registry.validator("missing").is_none());

        let schemas = SchemaRegistry::new();
        registry.subscribe_to(&schemas);
        schemas.register(
            omni_core::GroupVersionKind::new("g", "v1", "K"),
            SchemaNode::string(),
            "1",
        );
        assert_eq!(*watching.seen.lock(), 1);
    }

    #[test]
    fn context_reports_expired_deadline() {
        let path = FieldPath::root();
        let live = PluginContext { path: &path, deadline: Deadline::none() };
        assert!(live.check_deadline().is_ok());
        let expired = PluginContext {
            path: &path,
            deadline: Deadline::at(Instant::now() - Duration::from_millis(1)),
        };
        assert_eq!(expired.check_deadline(), Err(PluginError::DeadlineExceeded));
    }
}
