//! # Declarations and Bindings
//!
//! Typed variable declarations derived from a schema subtree, and the
//! conversion of JSON values into interpreter values under those
//! declarations.
//!
//! Objects declare a map and recurse into their properties, arrays declare
//! a list (elements are dynamically typed), primitives declare their scalar
//! type and kinds outside the fixed set declare `dyn`, which binds any
//! value. Every declared name is a dotted path from the root name.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use cel_interpreter::objects::{Key, Map};
use cel_interpreter::Value as CelValue;
use omni_core::{FieldPath, PluginError, SchemaKind, SchemaNode};
use serde_json::Value;

/// Root name used when the field path is empty.
pub const DEFAULT_ROOT: &str = "object";

/// Declared type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclType {
    String,
    Int,
    Double,
    Bool,
    List,
    Map,
    Dyn,
}

impl DeclType {
    fn of(kind: SchemaKind) -> Self {
        match kind {
            SchemaKind::Object => Self::Map,
            SchemaKind::Array => Self::List,
            SchemaKind::String => Self::String,
            SchemaKind::Integer => Self::Int,
            SchemaKind::Number => Self::Double,
            SchemaKind::Boolean => Self::Bool,
            SchemaKind::Other => Self::Dyn,
        }
    }

    /// Whether a JSON value conforms. Integers widen to `double`.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::String, Value::String(_))
            | (Self::Bool, Value::Bool(_))
            | (Self::Double, Value::Number(_))
            | (Self::List, Value::Array(_))
            | (Self::Map, Value::Object(_)) => true,
            (Self::Int, Value::Number(n)) => n.is_i64(),
            (Self::Dyn, _) => true,
            _ => false,
        }
    }
}

impl fmt::Display for DeclType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::List => "list",
            Self::Map => "map",
            Self::Dyn => "dyn",
        })
    }
}

/// The variables a rule may reference, keyed by dotted name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declarations {
    root: String,
    vars: BTreeMap<String, DeclType>,
}

impl Declarations {
    /// Root name for a field path.
    pub fn root_name(path: &FieldPath) -> &str {
        path.last().unwrap_or(DEFAULT_ROOT)
    }

    /// Declarations for `node` under `root`.
    pub fn build(root: &str, node: &SchemaNode) -> Self {
        let mut decls = Self {
            root: root.to_string(),
            vars: BTreeMap::new(),
        };
        decls.declare(root.to_string(), node);
        decls
    }

    fn declare(&mut self, name: String, node: &SchemaNode) {
        let ty = DeclType::of(node.kind);
        if ty == DeclType::Map {
            for (prop, child) in &node.properties {
                self.declare(format!("{name}.{prop}"), child);
            }
        }
        self.vars.insert(name, ty);
    }

    /// The root variable name.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Declared type of a dotted name.
    pub fn get(&self, name: &str) -> Option<DeclType> {
        self.vars.get(name).copied()
    }

    /// Whether `ident` is a declared top-level variable.
    pub fn declares(&self, ident: &str) -> bool {
        self.vars.contains_key(ident)
    }

    /// Whether any field below `name` is declared.
    pub fn declares_fields(&self, name: &str) -> bool {
        let prefix = format!("{name}.");
        self.vars
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(k, _)| k.starts_with(&prefix))
    }

    /// All declarations in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, DeclType)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Convert `value` into the interpreter value bound under the root.
    ///
    /// # Errors
    ///
    /// [`PluginError::Evaluation`] if a value at a declared path does not
    /// conform to its declared type.
    pub fn bind(&self, value: &Value) -> Result<CelValue, PluginError> {
        self.to_cel(Some(&self.root), value)
    }

    fn to_cel(&self, name: Option<&str>, value: &Value) -> Result<CelValue, PluginError> {
        let declared = name.and_then(|n| self.get(n));
        if let Some(expected) = declared {
            if !expected.accepts(value) {
                return Err(PluginError::Evaluation(format!(
                    "type mismatch at {}: expected {expected}, got {}",
                    name.unwrap_or_default(),
                    json_type(value)
                )));
            }
        }

        Ok(match value {
            Value::Null => CelValue::Null,
            Value::Bool(b) => CelValue::Bool(*b),
            Value::Number(n) => {
                if declared == Some(DeclType::Double) {
                    CelValue::Float(n.as_f64().unwrap_or(f64::NAN))
                } else if let Some(i) = n.as_i64() {
                    CelValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    CelValue::UInt(u)
                } else {
                    CelValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => CelValue::String(Arc::new(s.clone())),
            Value::Array(items) => CelValue::List(Arc::new(
                items
                    .iter()
                    .map(|item| self.to_cel(None, item))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Value::Object(fields) => {
                let mut map = HashMap::with_capacity(fields.len());
                for (k, v) in fields {
                    let child = name.map(|n| format!("{n}.{k}"));
                    map.insert(Key::String(Arc::new(k.clone())), self.to_cel(child.as_deref(), v)?);
                }
                CelValue::Map(Map { map: Arc::new(map) })
            }
        })
    }
}

/// Convert an interpreter result back into JSON.
///
/// # Errors
///
/// [`PluginError::Evaluation`] for non-finite floats and value kinds JSON
/// cannot represent (bytes, functions, timestamps, durations).
pub fn to_json(value: &CelValue) -> Result<Value, PluginError> {
    Ok(match value {
        CelValue::Null => Value::Null,
        CelValue::Bool(b) => Value::Bool(*b),
        CelValue::Int(i) => Value::from(*i),
        CelValue::UInt(u) => Value::from(*u),
        CelValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| PluginError::Evaluation(format!("result {f} is not a finite number")))?,
        CelValue::String(s) => Value::String(s.as_str().to_string()),
        CelValue::List(items) => Value::Array(items.iter().map(to_json).collect::<Result<_, _>>()?),
        CelValue::Map(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map.map.iter() {
                let key = match k {
                    Key::String(s) => s.as_str().to_string(),
                    Key::Int(i) => i.to_string(),
                    Key::Uint(u) => u.to_string(),
                    Key::Bool(b) => b.to_string(),
                };
                out.insert(key, to_json(v)?);
            }
            Value::Object(out)
        }
        other => {
            return Err(PluginError::Evaluation(format!(
                "result {other:?} has no JSON representation"
            )))
        }
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() => "int",
        Value::Number(_) => "double",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}
