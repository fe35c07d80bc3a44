//! # Schema Trees
//!
//! [`SchemaNode`] is a recursive description of an object's shape. It is
//! deserialised directly from an OpenAPI v3 schema document: only `type`,
//! `properties`, `items`, and `format` are read, every other keyword is
//! ignored.
//!
//! Properties are kept in a `BTreeMap` so that every walk over a tree visits
//! fields in the same order, which makes fail-fast errors reproducible.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::annotation::FormatAnnotation;
use crate::error::AnnotationSyntaxError;
use crate::path::FieldPath;

static EMPTY_SCHEMA: SchemaNode = SchemaNode::empty();

/// The fixed set of node kinds the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    /// A mapping with named properties.
    Object,
    /// A sequence with a single item schema.
    Array,
    /// A UTF-8 string.
    String,
    /// A signed 64-bit integer.
    Integer,
    /// A double-precision number.
    Number,
    /// A boolean.
    Boolean,
    /// Anything else (missing or unrecognised `type`).
    #[default]
    #[serde(other)]
    Other,
}

impl SchemaKind {
    /// The lowercase OpenAPI name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in a schema tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaNode {
    /// Node kind (`type` in the OpenAPI document).
    #[serde(rename = "type", default)]
    pub kind: SchemaKind,

    /// Child schemas by property name. Only meaningful for object kind.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, SchemaNode>,

    /// Item schema. Required for array kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,

    /// Raw format annotation (`format` in the OpenAPI document).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl SchemaNode {
    /// A node of kind `other` with no children and no annotation.
    pub const fn empty() -> Self {
        Self {
            kind: SchemaKind::Other,
            properties: BTreeMap::new(),
            items: None,
            format: None,
        }
    }

    /// A shared empty node, used when a conversion target names a property
    /// the source schema does not have.
    pub fn empty_ref() -> &'static SchemaNode {
        &EMPTY_SCHEMA
    }

    /// A leaf node of the given kind.
    pub fn leaf(kind: SchemaKind) -> Self {
        Self {
            kind,
            ..Self::empty()
        }
    }

    /// An object node with the given properties.
    pub fn object<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, SchemaNode)>,
        K: Into<String>,
    {
        Self {
            kind: SchemaKind::Object,
            properties: properties.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            ..Self::empty()
        }
    }

    /// An array node with the given item schema.
    pub fn array(items: SchemaNode) -> Self {
        Self {
            kind: SchemaKind::Array,
            items: Some(Box::new(items)),
            ..Self::empty()
        }
    }

    /// Shorthand for a string leaf.
    pub fn string() -> Self {
        Self::leaf(SchemaKind::String)
    }

    /// Shorthand for an integer leaf.
    pub fn integer() -> Self {
        Self::leaf(SchemaKind::Integer)
    }

    /// Shorthand for a number leaf.
    pub fn number() -> Self {
        Self::leaf(SchemaKind::Number)
    }

    /// Shorthand for a boolean leaf.
    pub fn boolean() -> Self {
        Self::leaf(SchemaKind::Boolean)
    }

    /// Attach a format annotation to this node.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Parse this node's format annotation.
    ///
    /// Returns `Ok(None)` when the node has no annotation (an empty string
    /// counts as none).
    pub fn annotation(&self) -> Result<Option<FormatAnnotation<'_>>, AnnotationSyntaxError> {
        match self.format.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => FormatAnnotation::parse(raw).map(Some),
        }
    }

    /// Look up a direct property.
    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.properties.get(name)
    }

    /// Every node carrying a non-empty format string, with its field path.
    ///
    /// Objects contribute every property, arrays their `items` under the
    /// `item` marker. Array nodes without `items` are skipped here; the
    /// engine reports them when it walks the tree.
    pub fn annotated_nodes(&self) -> Vec<(FieldPath, &SchemaNode)> {
        let mut out = Vec::new();
        collect_annotated(self, FieldPath::root(), &mut out);
        out
    }

    /// SHA-256 fingerprint of the canonical JSON form of this subtree.
    pub fn fingerprint(&self) -> SchemaFingerprint {
        SchemaFingerprint::of_parts(&[canonical_json(self).as_bytes()])
    }
}

fn collect_annotated<'a>(
    node: &'a SchemaNode,
    path: FieldPath,
    out: &mut Vec<(FieldPath, &'a SchemaNode)>,
) {
    if node.format.as_deref().is_some_and(|f| !f.is_empty()) {
        out.push((path.clone(), node));
    }
    match node.kind {
        SchemaKind::Object => {
            for (name, child) in &node.properties {
                collect_annotated(child, path.child(name), out);
            }
        }
        SchemaKind::Array => {
            if let Some(items) = node.items.as_deref() {
                collect_annotated(items, path.item(), out);
            }
        }
        _ => {}
    }
}

/// Serialise a node to JSON. Property order is fixed by the `BTreeMap`, so
/// the output is canonical for a given tree.
fn canonical_json(node: &SchemaNode) -> String {
    // Serialising a tree of strings, maps and enums cannot fail.
    serde_json::to_string(node).unwrap_or_default()
}

/// A SHA-256 digest identifying a schema subtree (optionally mixed with
/// other content such as an expression source).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaFingerprint([u8; 32]);

impl SchemaFingerprint {
    /// Digest a sequence of byte strings. Parts are length-prefixed so that
    /// `["ab", "c"]` and `["a", "bc"]` differ.
    pub fn of_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part);
        }
        Self(hasher.finalize().into())
    }

    /// Digest an expression source together with the schema subtree it is
    /// compiled against.
    pub fn of_source(source: &str, node: &SchemaNode) -> Self {
        Self::of_parts(&[source.as_bytes(), canonical_json(node).as_bytes()])
    }

    /// Return the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for SchemaFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
