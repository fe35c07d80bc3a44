//! # Conversion Engine
//!
//! Rebuilds an object conforming to a source schema so that it conforms to
//! a target schema. The target schema drives the walk:
//!
//! - an annotation naming a registered converter replaces the field with
//!   the converter's result, verbatim;
//! - object nodes keep only the target properties present in the value,
//!   each converted against the same-named source property;
//! - array nodes convert element-wise;
//! - everything else is copied unchanged.
//!
//! Identity metadata (`apiVersion`, `kind`, `metadata`) is the caller's to
//! restore.

use std::sync::Arc;

use omni_core::{Deadline, EngineError, FieldPath, FormatAnnotation, PluginError, SchemaNode};
use serde_json::Value;

use crate::plugin::{PluginContext, PluginRegistry};
use crate::walk::{walk, NodeAction, SchemaPair};

struct ConvertAction<'a> {
    plugins: &'a PluginRegistry,
}

impl NodeAction for ConvertAction<'_> {
    const BUILDS_OUTPUT: bool = true;

    fn annotated(
        &self,
        ctx: &PluginContext<'_>,
        annotation: FormatAnnotation<'_>,
        pair: SchemaPair<'_>,
        value: Option<&Value>,
    ) -> Result<Option<Value>, PluginError> {
        let (Some(converter), Some(value)) = (self.plugins.converter(annotation.plugin_id), value)
        else {
            return Ok(None);
        };
        converter
            .convert(ctx, annotation.payload, pair.source, pair.target, value)
            .map(Some)
    }
}

/// Converts objects between schema versions by dispatching target-schema
/// annotations to the registered [`FormatConverter`](crate::FormatConverter)s.
#[derive(Debug, Clone)]
pub struct ConversionEngine {
    plugins: Arc<PluginRegistry>,
}

impl ConversionEngine {
    /// Create an engine over a frozen plugin registry.
    pub fn new(plugins: Arc<PluginRegistry>) -> Self {
        Self { plugins }
    }

    /// Convert `object` from `source` to `target`.
    pub fn convert(
        &self,
        source: &SchemaNode,
        target: &SchemaNode,
        object: &Value,
    ) -> Result<Value, EngineError> {
        self.convert_until(source, target, object, Deadline::none())
    }

    /// [`convert`](Self::convert) bounded by `deadline`.
    pub fn convert_until(
        &self,
        source: &SchemaNode,
        target: &SchemaNode,
        object: &Value,
        deadline: Deadline,
    ) -> Result<Value, EngineError> {
        let action = ConvertAction {
            plugins: &self.plugins,
        };
        let converted = walk(
            &action,
            SchemaPair::new(source, target),
            Some(object),
            &FieldPath::root(),
            deadline,
        )
        .inspect_err(|e| tracing::debug!(error = %e, "conversion failed"))?;
        Ok(converted.unwrap_or_else(|| object.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::FormatConverter;
    use serde_json::json;

    /// Upper-cases strings; payload `!` fails.
    struct Upper;

    impl FormatConverter for Upper {
        fn convert(
            &self,
            _: &PluginContext<'_>,
            payload: &str,
            _: &SchemaNode,
            _: &SchemaNode,
            value: &Value,
        ) -> Result<Value, PluginError> {
            if payload == "!" {
                return Err(PluginError::Evaluation("bang".into()));
            }
            Ok(match value {
                Value::String(s) => Value::String(s.to_uppercase()),
                other => json!({ "wrapped": other }),
            })
        }
    }

    fn engine() -> ConversionEngine {
        ConversionEngine::new(
            PluginRegistry::builder()
                .register_converter("upper", Arc::new(Upper))
                .build(),
        )
    }

    #[test]
    fn unannotated_fields_copy_and_annotated_fields_convert() {
        let source = SchemaNode::object([
            ("name", SchemaNode::string()),
            ("region", SchemaNode::string()),
        ]);
        let target = SchemaNode::object([
            ("name", SchemaNode::string()),
            ("region", SchemaNode::string().with_format("upper:")),
        ]);
        let out = engine()
            .convert(&source, &target, &json!({ "name": "web", "region": "eu" }))
            .unwrap();
        assert_eq!(out, json!({ "name": "web", "region": "EU" }));
    }

    #[test]
    fn converter_result_replaces_subtree_verbatim() {
        let source = SchemaNode::object([("spec", SchemaNode::object([("a", SchemaNode::integer())]))]);
        let target = SchemaNode::object([(
            "spec",
            SchemaNode::object([("b", SchemaNode::integer())]).with_format("upper:"),
        )]);
        let out = engine()
            .convert(&source, &target, &json!({ "spec": { "a": 1 } }))
            .unwrap();
        assert_eq!(out, json!({ "spec": { "wrapped": { "a": 1 } } }));
    }

    #[test]
    fn fields_missing_from_target_are_dropped() {
        let source = SchemaNode::object([
            ("keep", SchemaNode::integer()),
            ("gone", SchemaNode::integer()),
        ]);
        let target = SchemaNode::object([("keep", SchemaNode::integer())]);
        let out = engine()
            .convert(&source, &target, &json!({ "keep": 1, "gone": 2, "extra": 3 }))
            .unwrap();
        assert_eq!(out, json!({ "keep": 1 }));
    }

    #[test]
    fn array_elements_convert_individually() {
        let source = SchemaNode::object([("tags", SchemaNode::array(SchemaNode::string()))]);
        let target = SchemaNode::object([(
            "tags",
            SchemaNode::array(SchemaNode::string().with_format("upper:")),
        )]);
        let out = engine()
            .convert(&source, &target, &json!({ "tags": ["a", "b"] }))
            .unwrap();
        assert_eq!(out, json!({ "tags": ["A", "B"] }));
    }

    #[test]
    fn leaves_and_mismatched_shapes_pass_through() {
        let target = SchemaNode::object([("n", SchemaNode::integer())]);
        let out = engine()
            .convert(&SchemaNode::empty(), &target, &json!([1, 2]))
            .unwrap();
        assert_eq!(out, json!([1, 2]));
    }

    #[test]
    fn converter_error_aborts_with_path() {
        let target = SchemaNode::object([("x", SchemaNode::string().with_format("upper:!"))]);
        let err = engine()
            .convert(&target, &target, &json!({ "x": "a" }))
            .unwrap_err();
        assert!(matches!(err, EngineError::Evaluation { ref plugin, .. } if plugin == "upper"));
        assert_eq!(err.path().to_string(), "/x");
    }

    #[test]
    fn target_array_without_items_is_structural_error() {
        let target = SchemaNode::object([("xs", SchemaNode::leaf(omni_core::SchemaKind::Array))]);
        let err = engine()
            .convert(&target, &target, &json!({ "xs": [1] }))
            .unwrap_err();
        assert!(matches!(err, EngineError::StructuralSchema { .. }));
    }
}
