//! # Expression Validator
//!
//! `rule:<expression>` annotations. The expression must type-check as
//! `bool` (or `dyn` over untyped values) and evaluate to `true` for the
//! value to pass.

use std::sync::Arc;

use cel_interpreter::Value as CelValue;
use omni_core::{FieldPath, PluginError, SchemaNode};
use omni_engine::{FormatValidator, PluginContext};
use omni_schema::{SchemaObserver, VersionedSchema};
use serde_json::Value;

use crate::cache::{ProgramCache, ProgramKey};
use crate::decl::Declarations;
use crate::program::CompiledRule;

/// Plugin id the validator is registered under by default.
pub const RULE_PLUGIN_ID: &str = "rule";

/// Validates annotated fields with compiled expressions.
#[derive(Debug)]
pub struct ExpressionValidator {
    plugin_id: String,
    cache: ProgramCache,
}

impl Default for ExpressionValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionValidator {
    /// A validator for `rule:` annotations.
    pub fn new() -> Self {
        Self::with_plugin_id(RULE_PLUGIN_ID)
    }

    /// A validator for annotations addressed to `plugin_id`. The id is used
    /// to find this plugin's annotations when evicting stale programs.
    pub fn with_plugin_id(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            cache: ProgramCache::new(),
        }
    }

    /// The id this validator expects to be registered under.
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// The compiled-program cache.
    pub fn cache(&self) -> &ProgramCache {
        &self.cache
    }

    /// Compile `source` for the node at `path`, or reuse the cached program.
    pub fn compile(
        &self,
        path: &FieldPath,
        source: &str,
        node: &SchemaNode,
    ) -> Result<Arc<CompiledRule>, PluginError> {
        let key = ProgramKey::new(path, source, node);
        self.cache.get_or_compile(key, || {
            CompiledRule::compile_predicate(source, Declarations::root_name(path), node)
        })
    }
}

impl FormatValidator for ExpressionValidator {
    fn validate_program(
        &self,
        ctx: &PluginContext<'_>,
        payload: &str,
        node: &SchemaNode,
    ) -> Result<(), PluginError> {
        self.compile(ctx.path, payload, node).map(|_| ())
    }

    fn validate(
        &self,
        ctx: &PluginContext<'_>,
        payload: &str,
        node: &SchemaNode,
        value: &Value,
    ) -> Result<(), PluginError> {
        let rule = self.compile(ctx.path, payload, node)?;
        // The interpreter cannot be interrupted once started.
        ctx.check_deadline()?;
        match rule.evaluate(value)? {
            CelValue::Bool(true) => Ok(()),
            CelValue::Bool(false) => Err(PluginError::Rejected(format!(
                "{payload:?} is false for {value}"
            ))),
            other => Err(PluginError::Rejected(format!(
                "{payload:?} returned {other:?} instead of a boolean for {value}"
            ))),
        }
    }

    fn schema_observer(self: Arc<Self>) -> Option<Arc<dyn SchemaObserver>> {
        Some(self)
    }
}

impl SchemaObserver for ExpressionValidator {
    fn schema_registered(&self, current: &VersionedSchema, previous: Option<&VersionedSchema>) {
        let Some(previous) = previous else {
            return;
        };
        let evicted = self
            .cache
            .evict_stale(&self.plugin_id, &previous.root, &current.root);
        if evicted > 0 {
            tracing::debug!(
                gvk = %current.gvk,
                version_id = %current.version_id,
                evicted,
                "evicted stale compiled rules"
            );
        }
    }
}
