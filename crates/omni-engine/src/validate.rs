//! # Format Validator Engine
//!
//! Dry-run compilation and live validation of objects against annotated
//! schema trees.

use std::sync::Arc;

use omni_core::{Deadline, EngineError, FieldPath, FormatAnnotation, PluginError, SchemaNode};
use serde_json::Value;

use crate::plugin::{PluginContext, PluginRegistry};
use crate::walk::{walk, NodeAction, SchemaPair};

/// Compile-only action: every registered validator compiles its payload.
struct CompileAction<'a> {
    plugins: &'a PluginRegistry,
}

impl NodeAction for CompileAction<'_> {
    const BUILDS_OUTPUT: bool = false;

    fn annotated(
        &self,
        ctx: &PluginContext<'_>,
        annotation: FormatAnnotation<'_>,
        pair: SchemaPair<'_>,
        _value: Option<&Value>,
    ) -> Result<Option<Value>, PluginError> {
        if let Some(validator) = self.plugins.validator(annotation.plugin_id) {
            validator.validate_program(ctx, annotation.payload, pair.target)?;
        }
        Ok(None)
    }
}

/// Compile-and-check action: every registered validator checks the value.
struct CheckAction<'a> {
    plugins: &'a PluginRegistry,
}

impl NodeAction for CheckAction<'_> {
    const BUILDS_OUTPUT: bool = false;

    fn annotated(
        &self,
        ctx: &PluginContext<'_>,
        annotation: FormatAnnotation<'_>,
        pair: SchemaPair<'_>,
        value: Option<&Value>,
    ) -> Result<Option<Value>, PluginError> {
        let (Some(validator), Some(value)) = (self.plugins.validator(annotation.plugin_id), value)
        else {
            return Ok(None);
        };
        validator.validate(ctx, annotation.payload, pair.target, value)?;
        Ok(None)
    }
}

/// Validates schemas and objects by dispatching annotations to the
/// registered [`FormatValidator`](crate::FormatValidator)s.
#[derive(Debug, Clone)]
pub struct FormatValidatorEngine {
    plugins: Arc<PluginRegistry>,
}

impl FormatValidatorEngine {
    /// Create an engine over a frozen plugin registry.
    pub fn new(plugins: Arc<PluginRegistry>) -> Self {
        Self { plugins }
    }

    /// The plugin registry this engine dispatches to.
    pub fn plugins(&self) -> &Arc<PluginRegistry> {
        &self.plugins
    }

    /// Compile every annotation in `schema` without data.
    pub fn validate_program(&self, schema: &SchemaNode) -> Result<(), EngineError> {
        self.validate_program_until(schema, Deadline::none())
    }

    /// [`validate_program`](Self::validate_program) bounded by `deadline`.
    pub fn validate_program_until(
        &self,
        schema: &SchemaNode,
        deadline: Deadline,
    ) -> Result<(), EngineError> {
        let action = CompileAction {
            plugins: &self.plugins,
        };
        walk(&action, SchemaPair::same(schema), None, &FieldPath::root(), deadline)
            .map(|_| ())
            .inspect_err(|e| tracing::debug!(error = %e, "dry-run compile failed"))
    }

    /// Check `object` against `schema`.
    pub fn validate(&self, schema: &SchemaNode, object: &Value) -> Result<(), EngineError> {
        self.validate_until(schema, object, Deadline::none())
    }

    /// [`validate`](Self::validate) bounded by `deadline`.
    pub fn validate_until(
        &self,
        schema: &SchemaNode,
        object: &Value,
        deadline: Deadline,
    ) -> Result<(), EngineError> {
        let action = CheckAction {
            plugins: &self.plugins,
        };
        walk(
            &action,
            SchemaPair::same(schema),
            Some(object),
            &FieldPath::root(),
            deadline,
        )
        .map(|_| ())
        .inspect_err(|e| tracing::debug!(error = %e, "validation failed"))
    }
}
