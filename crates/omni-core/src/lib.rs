#![deny(missing_docs)]

//! # omni-core: Foundational Types for the Omni Validation Engine
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies, only `serde`, `serde_json`,
//! `thiserror`, and `sha2` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **One schema tree type.** [`SchemaNode`] is deserialised straight from
//!    an OpenAPI v3 schema document and is the only tree the engine walks.
//!
//! 2. **Annotations are parsed, never sliced ad hoc.** [`FormatAnnotation`]
//!    is the sole owner of the `<pluginId>:<payload>` grammar.
//!
//! 3. **Every failure names its field.** [`EngineError`] variants all carry
//!    a [`FieldPath`]; plugins report path-free [`PluginError`]s which the
//!    engine wraps.

pub mod annotation;
pub mod crd;
pub mod deadline;
pub mod error;
pub mod gvk;
pub mod path;
pub mod schema;

// Re-export primary types at crate root for ergonomic imports.
pub use annotation::FormatAnnotation;
pub use crd::{CrdNames, CrdSpec, CrdValidation, CrdVersion, CustomResourceDefinition, ObjectMeta};
pub use deadline::Deadline;
pub use error::{AnnotationSyntaxError, EngineError, PluginError};
pub use gvk::GroupVersionKind;
pub use path::FieldPath;
pub use schema::{SchemaFingerprint, SchemaKind, SchemaNode};
