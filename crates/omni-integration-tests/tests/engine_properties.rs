//! # Engine Properties
//!
//! Walk, dispatch, caching and conversion behavior of the engines over the
//! expression plugins, exercised across the core, schema, engine and cel
//! crates together.

use omni_core::{EngineError, SchemaKind, SchemaNode};
use omni_integration_tests::{widget_gvk, widget_v1, widget_v2, Harness};
use serde_json::json;

// =========================================================================
// Dispatch
// =========================================================================

#[test]
fn schema_without_annotations_accepts_anything() {
    let h = Harness::new();
    let schema = SchemaNode::object([
        ("spec", SchemaNode::object([("size", SchemaNode::integer())])),
        ("tags", SchemaNode::array(SchemaNode::string())),
    ]);
    h.validator.validate_program(&schema).unwrap();
    h.validator
        .validate(&schema, &json!({ "spec": { "size": "not a number" }, "tags": [1, 2] }))
        .unwrap();
    assert!(h.rules.cache().is_empty());
}

#[test]
fn unregistered_plugin_is_skipped_but_children_are_walked() {
    let h = Harness::new();
    let schema = SchemaNode::object([(
        "spec",
        SchemaNode::object([("replicas", SchemaNode::integer().with_format("rule:replicas < 10"))])
            .with_format("unknown:whatever"),
    )]);

    h.validator.validate(&schema, &json!({ "spec": { "replicas": 3 } })).unwrap();
    let err = h
        .validator
        .validate(&schema, &json!({ "spec": { "replicas": 30 } }))
        .unwrap_err();
    assert!(matches!(err, EngineError::ValidationFailure { .. }), "{err}");
    assert_eq!(err.path().to_string(), "/spec/replicas");
}

#[test]
fn annotation_without_separator_stops_the_walk() {
    let h = Harness::new();
    let schema = SchemaNode::object([(
        "spec",
        SchemaNode::object([("replicas", SchemaNode::integer().with_format("rule:replicas >="))])
            .with_format("date-time"),
    )]);

    let err = h.validator.validate_program(&schema).unwrap_err();
    assert!(matches!(err, EngineError::AnnotationSyntax { .. }), "{err}");
    assert_eq!(err.path().to_string(), "/spec");
    assert_eq!(err.category(), "annotation_syntax");
    // The broken rule below was never compiled.
    assert!(h.rules.cache().is_empty());
}

#[test]
fn array_without_items_is_structural_error() {
    let h = Harness::new();
    let schema = SchemaNode::object([("list", SchemaNode::leaf(SchemaKind::Array))]);

    let err = h.validator.validate(&schema, &json!({ "list": [] })).unwrap_err();
    assert_eq!(err.category(), "structural_schema");
    assert_eq!(err.path().to_string(), "/list");

    let err = h.validator.validate_program(&schema).unwrap_err();
    assert!(matches!(err, EngineError::StructuralSchema { .. }));
}

#[test]
fn array_items_are_checked_element_wise() {
    let h = Harness::new();
    let schema = SchemaNode::object([(
        "ports",
        SchemaNode::array(SchemaNode::integer().with_format("rule:item > 0 && item < 65536")),
    )]);

    h.validator.validate(&schema, &json!({ "ports": [80, 443] })).unwrap();
    let err = h
        .validator
        .validate(&schema, &json!({ "ports": [80, 0] }))
        .unwrap_err();
    assert_eq!(err.category(), "validation_failure");
    // One program serves every element.
    assert_eq!(h.rules.cache().len(), 1);
}

#[test]
fn scalar_at_an_array_node_is_not_checked() {
    let h = Harness::new();
    let schema = SchemaNode::object([(
        "tags",
        SchemaNode::array(SchemaNode::string().with_format("rule:item.size() > 3")),
    )]);

    h.validator.validate(&schema, &json!({ "tags": "x" })).unwrap();
    h.validator.validate(&schema, &json!({ "tags": 5 })).unwrap();
    // The item rule was never reached.
    assert!(h.rules.cache().is_empty());

    let err = h.validator.validate(&schema, &json!({ "tags": ["x"] })).unwrap_err();
    assert_eq!(err.path().to_string(), "/tags/item");
}

// =========================================================================
// Expression rules
// =========================================================================

#[test]
fn replicas_rule_outcomes() {
    let h = Harness::new();
    let schema = widget_v1("rule:replicas >= 0");

    h.validator.validate(&schema, &json!({ "spec": { "replicas": 3 } })).unwrap();

    let err = h
        .validator
        .validate(&schema, &json!({ "spec": { "replicas": -1 } }))
        .unwrap_err();
    assert!(matches!(err, EngineError::ValidationFailure { ref plugin, .. } if plugin == "rule"));
    assert!(err.to_string().starts_with("/spec/replicas: rule: validation failed"), "{err}");

    let err = h
        .validator
        .validate(&schema, &json!({ "spec": { "replicas": "x" } }))
        .unwrap_err();
    assert_eq!(err.category(), "evaluation");
}

#[test]
fn rule_that_does_not_compile_is_compile_error() {
    let h = Harness::new();
    let err = h
        .validator
        .validate_program(&widget_v1("rule:replicas >="))
        .unwrap_err();
    assert_eq!(err.category(), "compile");
    assert_eq!(err.plugin(), Some("rule"));
    assert!(h.rules.cache().is_empty());
}

#[test]
fn ill_typed_rules_fail_the_dry_run() {
    let h = Harness::new();
    for (rule, reason) in [
        ("rule:replicas == 'a'", "no operator == for int and string"),
        ("rule:replicas.startsWith('a')", "startsWith() is not defined on int"),
        ("rule:replicas", "evaluates to int, not bool"),
    ] {
        let err = h.validator.validate_program(&widget_v1(rule)).unwrap_err();
        assert!(matches!(err, EngineError::Compile { .. }), "{rule}: {err}");
        assert_eq!(err.path().to_string(), "/spec/replicas");
        assert!(err.to_string().contains(reason), "{rule}: {err}");
    }
    assert!(h.rules.cache().is_empty());
}

#[test]
fn rule_cache_hits_on_same_path() {
    let h = Harness::new();
    let schema = widget_v1("rule:replicas >= 0");

    h.validator.validate_program(&schema).unwrap();
    for replicas in 0..5 {
        h.validator
            .validate(&schema, &json!({ "spec": { "replicas": replicas } }))
            .unwrap();
    }

    let stats = h.rules.cache().stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 5);
}

#[test]
fn absent_fields_are_not_checked() {
    let h = Harness::new();
    let schema = widget_v1("rule:replicas >= 0");
    h.validator.validate(&schema, &json!({ "spec": { "name": "a" } })).unwrap();
    h.validator.validate(&schema, &json!({})).unwrap();
}

#[test]
fn concurrent_validations_share_one_program() {
    let h = Harness::new();
    let schema = widget_v1("rule:replicas % 2 == 0");

    std::thread::scope(|scope| {
        for worker in 0..8i64 {
            let (h, schema) = (&h, &schema);
            scope.spawn(move || {
                for round in 0..25i64 {
                    let replicas = worker * 100 + round;
                    let result = h
                        .validator
                        .validate(schema, &json!({ "spec": { "replicas": replicas } }));
                    assert_eq!(result.is_ok(), replicas % 2 == 0, "replicas = {replicas}");
                }
            });
        }
    });

    assert_eq!(h.rules.cache().len(), 1);
}

#[test]
fn replacing_a_schema_evicts_stale_programs() {
    let h = Harness::new();
    let gvk = widget_gvk("v1");
    h.schemas.register(gvk.clone(), widget_v1("rule:replicas >= 0"), "1");

    let object = json!({ "spec": { "replicas": 3 } });
    let schema = h.schemas.lookup(&gvk).unwrap();
    h.validator.validate(&schema.root, &object).unwrap();
    assert_eq!(h.rules.cache().len(), 1);

    h.schemas.register(gvk.clone(), widget_v1("rule:replicas > 5"), "2");
    assert!(h.rules.cache().is_empty());

    let schema = h.schemas.lookup(&gvk).unwrap();
    assert_eq!(schema.version_id, "2");
    let err = h.validator.validate(&schema.root, &object).unwrap_err();
    assert_eq!(err.category(), "validation_failure");
}

#[test]
fn re_registering_an_identical_schema_keeps_programs() {
    let h = Harness::new();
    let gvk = widget_gvk("v1");
    h.schemas.register(gvk.clone(), widget_v1("rule:replicas >= 0"), "1");
    h.validator
        .validate_program(&h.schemas.lookup(&gvk).unwrap().root)
        .unwrap();

    h.schemas.register(gvk, widget_v1("rule:replicas >= 0"), "2");
    assert_eq!(h.rules.cache().len(), 1);
}

// =========================================================================
// Conversion
// =========================================================================

#[test]
fn conversion_copies_rewrites_and_drops() {
    let h = Harness::new();
    let object = json!({
        "spec": { "replicas": 3, "name": "a", "zone": "z", "region": "eu" },
        "status": { "ready": true }
    });

    let converted = h
        .converter
        .convert(&widget_v1("rule:replicas >= 0"), &widget_v2(), &object)
        .unwrap();
    assert_eq!(
        converted,
        json!({ "spec": { "replicas": 3, "name": "a", "region": "eu-1" } })
    );
}

#[test]
fn round_trip_loses_fields_the_other_version_lacks() {
    let h = Harness::new();
    let (v1, v2) = (widget_v1("rule:replicas >= 0"), widget_v2());
    let object = json!({ "spec": { "replicas": 3, "name": "a", "zone": "z", "region": "eu" } });

    let there = h.converter.convert(&v1, &v2, &object).unwrap();
    let back = h.converter.convert(&v2, &v1, &there).unwrap();

    assert_eq!(back["spec"]["name"], "a");
    assert_eq!(back["spec"]["region"], "eu-1");
    assert!(back["spec"].get("zone").is_none());
    // Validation annotations play no part in conversion.
    assert!(h.rules.cache().is_empty());
}

#[test]
fn converter_result_is_taken_verbatim() {
    let h = Harness::new();
    let source = SchemaNode::object([("size", SchemaNode::integer())]);
    let target = SchemaNode::object([(
        "size",
        SchemaNode::object([("value", SchemaNode::integer())])
            .with_format("conversion:{'value': old, 'unit': 'Gi'}"),
    )]);

    let converted = h.converter.convert(&source, &target, &json!({ "size": 4 })).unwrap();
    assert_eq!(converted, json!({ "size": { "value": 4, "unit": "Gi" } }));
    assert_eq!(h.conversions.cache().len(), 1);
}

#[test]
fn converter_failure_names_the_field() {
    let h = Harness::new();
    let object = json!({ "spec": { "region": 7 } });

    let err = h
        .converter
        .convert(&widget_v1("rule:replicas >= 0"), &widget_v2(), &object)
        .unwrap_err();
    assert_eq!(err.path().to_string(), "/spec/region");
    assert_eq!(err.plugin(), Some("conversion"));
}

#[test]
fn scalar_at_an_array_node_passes_through_conversion() {
    let h = Harness::new();
    let source = SchemaNode::object([("tags", SchemaNode::array(SchemaNode::string()))]);
    let target = SchemaNode::object([(
        "tags",
        SchemaNode::array(SchemaNode::string().with_format("conversion:old + '!'")),
    )]);

    for value in [json!("x"), json!(5)] {
        let converted = h
            .converter
            .convert(&source, &target, &json!({ "tags": value.clone() }))
            .unwrap();
        assert_eq!(converted, json!({ "tags": value }));
    }
    assert!(h.conversions.cache().is_empty());

    let converted = h
        .converter
        .convert(&source, &target, &json!({ "tags": ["a", "b"] }))
        .unwrap();
    assert_eq!(converted, json!({ "tags": ["a!", "b!"] }));
}
