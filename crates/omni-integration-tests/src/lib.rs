//! Shared fixtures for the integration tests under `tests/`.

use std::sync::Arc;

use omni_cel::{ExpressionConverter, ExpressionValidator, CONVERSION_PLUGIN_ID, RULE_PLUGIN_ID};
use omni_core::{GroupVersionKind, SchemaNode};
use omni_engine::{ConversionEngine, FormatValidatorEngine, PluginRegistry};
use omni_schema::SchemaRegistry;

/// Engines over the expression plugins, with handles to the plugins
/// themselves so tests can inspect their caches.
pub struct Harness {
    pub rules: Arc<ExpressionValidator>,
    pub conversions: Arc<ExpressionConverter>,
    pub plugins: Arc<PluginRegistry>,
    pub schemas: Arc<SchemaRegistry>,
    pub validator: FormatValidatorEngine,
    pub converter: ConversionEngine,
}

impl Harness {
    pub fn new() -> Self {
        let rules = Arc::new(ExpressionValidator::new());
        let conversions = Arc::new(ExpressionConverter::new());
        let plugins = PluginRegistry::builder()
            .register_validator(RULE_PLUGIN_ID, rules.clone())
            .register_converter(CONVERSION_PLUGIN_ID, conversions.clone())
            .build();
        let schemas = Arc::new(SchemaRegistry::new());
        plugins.subscribe_to(&schemas);
        Self {
            rules,
            conversions,
            validator: FormatValidatorEngine::new(Arc::clone(&plugins)),
            converter: ConversionEngine::new(Arc::clone(&plugins)),
            plugins,
            schemas,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn widget_gvk(version: &str) -> GroupVersionKind {
    GroupVersionKind::new("example.com", version, "Widget")
}

/// `{ spec: { replicas, name, zone, region } }` with a rule on `replicas`.
pub fn widget_v1(replicas_rule: &str) -> SchemaNode {
    SchemaNode::object([(
        "spec",
        SchemaNode::object([
            ("replicas", SchemaNode::integer().with_format(replicas_rule)),
            ("name", SchemaNode::string()),
            ("zone", SchemaNode::string()),
            ("region", SchemaNode::string()),
        ]),
    )])
}

/// `{ spec: { replicas, name, region } }` with `region` rewritten.
pub fn widget_v2() -> SchemaNode {
    SchemaNode::object([(
        "spec",
        SchemaNode::object([
            ("replicas", SchemaNode::integer()),
            ("name", SchemaNode::string()),
            (
                "region",
                SchemaNode::string().with_format("conversion:old + '-1'"),
            ),
        ]),
    )])
}
