//! # Expression Converter
//!
//! `conversion:<expression>` annotations on a target schema. The source
//! value is bound as `old`, typed by the source schema node, and the
//! expression's result becomes the converted value unchanged.
//!
//! A source node without a usable type (including a field the source
//! version does not declare) binds `old` as `dyn`: the expression still
//! compiles and the value is checked only when it is evaluated.

use std::sync::Arc;

use omni_core::{FieldPath, PluginError, SchemaNode};
use omni_engine::{FormatConverter, PluginContext};
use omni_schema::{SchemaObserver, VersionedSchema};
use serde_json::Value;

use crate::cache::{ProgramCache, ProgramKey};
use crate::decl::to_json;
use crate::program::CompiledRule;

/// Plugin id the converter is registered under by default.
pub const CONVERSION_PLUGIN_ID: &str = "conversion";

/// Name the source value is bound under.
pub const SOURCE_ROOT: &str = "old";

/// Rewrites annotated fields with compiled expressions.
#[derive(Debug)]
pub struct ExpressionConverter {
    plugin_id: String,
    cache: ProgramCache,
}

impl Default for ExpressionConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionConverter {
    /// A converter for `conversion:` annotations.
    pub fn new() -> Self {
        Self::with_plugin_id(CONVERSION_PLUGIN_ID)
    }

    /// A converter for annotations addressed to `plugin_id`.
    pub fn with_plugin_id(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            cache: ProgramCache::new(),
        }
    }

    /// The id this converter expects to be registered under.
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// The compiled-program cache.
    pub fn cache(&self) -> &ProgramCache {
        &self.cache
    }

    fn compile(
        &self,
        path: &FieldPath,
        source: &str,
        node: &SchemaNode,
    ) -> Result<Arc<CompiledRule>, PluginError> {
        self.cache.get_or_compile(ProgramKey::new(path, source, node), || {
            CompiledRule::compile(source, SOURCE_ROOT, node)
        })
    }
}

impl FormatConverter for ExpressionConverter {
    fn convert(
        &self,
        ctx: &PluginContext<'_>,
        payload: &str,
        source: &SchemaNode,
        _target: &SchemaNode,
        value: &Value,
    ) -> Result<Value, PluginError> {
        let rule = self.compile(ctx.path, payload, source)?;
        ctx.check_deadline()?;
        let converted = to_json(&rule.evaluate(value)?)?;
        tracing::trace!(path = %ctx.path, "field converted by expression");
        Ok(converted)
    }

    fn schema_observer(self: Arc<Self>) -> Option<Arc<dyn SchemaObserver>> {
        Some(self)
    }
}

impl SchemaObserver for ExpressionConverter {
    fn schema_registered(&self, current: &VersionedSchema, previous: Option<&VersionedSchema>) {
        if let Some(previous) = previous {
            let evicted = self
                .cache
                .evict_stale(&self.plugin_id, &previous.root, &current.root);
            if evicted > 0 {
                tracing::debug!(gvk = %current.gvk, evicted, "evicted stale conversion rules");
            }
        }
    }
}
