//! # Schema/Object Co-Walk
//!
//! One recursive walk serves dry-run compilation, validation and
//! conversion. The [`NodeAction`] decides what happens at an annotated
//! node; the walk owns everything structural:
//!
//! 1. The deadline is checked before every node.
//! 2. The node's annotation is parsed (a malformed one fails the walk
//!    before its children are visited) and handed to the action.
//! 3. Objects recurse into their properties: all of them when there is no
//!    value, otherwise only those present as keys in the value map.
//! 4. Arrays require `items`, then recurse once without a value or once per
//!    element of a sequence value.
//! 5. Anything else passes through.
//!
//! The walk is driven by the *target* schema of a [`SchemaPair`]. For
//! validation both halves are the same tree.

use omni_core::{
    Deadline, EngineError, FieldPath, FormatAnnotation, PluginError, SchemaKind, SchemaNode,
};
use serde_json::{Map, Value};

use crate::plugin::PluginContext;

/// Source and target schema nodes visited together.
#[derive(Debug, Clone, Copy)]
pub struct SchemaPair<'a> {
    /// Schema the value currently conforms to.
    pub source: &'a SchemaNode,
    /// Schema driving the walk.
    pub target: &'a SchemaNode,
}

impl<'a> SchemaPair<'a> {
    /// Both halves are the same schema.
    pub fn same(node: &'a SchemaNode) -> Self {
        Self {
            source: node,
            target: node,
        }
    }

    /// Pair an explicit source with a target.
    pub fn new(source: &'a SchemaNode, target: &'a SchemaNode) -> Self {
        Self { source, target }
    }

    fn property(&self, name: &str, target: &'a SchemaNode) -> Self {
        Self {
            source: self
                .source
                .property(name)
                .unwrap_or_else(|| SchemaNode::empty_ref()),
            target,
        }
    }

    fn items(&self, target: &'a SchemaNode) -> Self {
        Self {
            source: self
                .source
                .items
                .as_deref()
                .unwrap_or_else(|| SchemaNode::empty_ref()),
            target,
        }
    }
}

/// What the walk does at an annotated node.
pub trait NodeAction {
    /// Whether the walk assembles an output value.
    const BUILDS_OUTPUT: bool;

    /// Handle the node's annotation.
    ///
    /// `Ok(Some(v))` replaces the node's value with `v` and stops the walk
    /// from descending into it. `Ok(None)` continues structurally.
    fn annotated(
        &self,
        ctx: &PluginContext<'_>,
        annotation: FormatAnnotation<'_>,
        pair: SchemaPair<'_>,
        value: Option<&Value>,
    ) -> Result<Option<Value>, PluginError>;
}

/// Walk `pair` against `value`, starting at `path`.
///
/// Returns the assembled output when `A::BUILDS_OUTPUT` is set and a value
/// was supplied, `None` otherwise.
pub fn walk<A: NodeAction>(
    action: &A,
    pair: SchemaPair<'_>,
    value: Option<&Value>,
    path: &FieldPath,
    deadline: Deadline,
) -> Result<Option<Value>, EngineError> {
    if deadline.is_expired() {
        return Err(EngineError::DeadlineExceeded { path: path.clone() });
    }

    let node = pair.target;
    let annotation = node
        .annotation()
        .map_err(|source| EngineError::AnnotationSyntax {
            path: path.clone(),
            source,
        })?;
    if let Some(annotation) = annotation {
        let ctx = PluginContext { path, deadline };
        tracing::trace!(path = %path, plugin = annotation.plugin_id, "dispatching annotation");
        let replaced = action
            .annotated(&ctx, annotation, pair, value)
            .map_err(|e| e.at(path, annotation.plugin_id))?;
        if replaced.is_some() {
            return Ok(replaced);
        }
    }

    match node.kind {
        SchemaKind::Object => walk_object(action, pair, value, path, deadline),
        SchemaKind::Array => walk_array(action, pair, value, path, deadline),
        _ => Ok(pass_through::<A>(value)),
    }
}

fn walk_object<A: NodeAction>(
    action: &A,
    pair: SchemaPair<'_>,
    value: Option<&Value>,
    path: &FieldPath,
    deadline: Deadline,
) -> Result<Option<Value>, EngineError> {
    let properties = &pair.target.properties;
    match value {
        None => {
            for (name, child) in properties {
                walk(action, pair.property(name, child), None, &path.child(name), deadline)?;
            }
            Ok(None)
        }
        Some(Value::Object(map)) => {
            let mut out = Map::new();
            for (name, child) in properties {
                let Some(field) = map.get(name) else {
                    continue;
                };
                let converted = walk(
                    action,
                    pair.property(name, child),
                    Some(field),
                    &path.child(name),
                    deadline,
                )?;
                if A::BUILDS_OUTPUT {
                    out.insert(name.clone(), converted.unwrap_or_else(|| field.clone()));
                }
            }
            Ok(A::BUILDS_OUTPUT.then_some(Value::Object(out)))
        }
        Some(other) => Ok(pass_through::<A>(Some(other))),
    }
}

fn walk_array<A: NodeAction>(
    action: &A,
    pair: SchemaPair<'_>,
    value: Option<&Value>,
    path: &FieldPath,
    deadline: Deadline,
) -> Result<Option<Value>, EngineError> {
    let items = pair
        .target
        .items
        .as_deref()
        .ok_or_else(|| EngineError::StructuralSchema { path: path.clone() })?;
    let item_pair = pair.items(items);
    let item_path = path.item();

    match value {
        None => {
            walk(action, item_pair, None, &item_path, deadline)?;
            Ok(None)
        }
        Some(Value::Array(elements)) => {
            let mut out = Vec::with_capacity(if A::BUILDS_OUTPUT { elements.len() } else { 0 });
            for element in elements {
                let converted = walk(action, item_pair, Some(element), &item_path, deadline)?;
                if A::BUILDS_OUTPUT {
                    out.push(converted.unwrap_or_else(|| element.clone()));
                }
            }
            Ok(A::BUILDS_OUTPUT.then_some(Value::Array(out)))
        }
        Some(other) => Ok(pass_through::<A>(Some(other))),
    }
}

fn pass_through<A: NodeAction>(value: Option<&Value>) -> Option<Value> {
    if A::BUILDS_OUTPUT {
        value.cloned()
    } else {
        None
    }
}
