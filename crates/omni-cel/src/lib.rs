//! # omni-cel: Expression Rules
//!
//! The expression-engine plugin. Annotations of the form
//! `rule:<expression>` are type-checked against declarations derived from
//! the annotated schema node and evaluated with the node's value bound
//! under a root name. Mismatched operands, calls on the wrong receiver and
//! non-boolean rules fail at compile time.
//!
//! ## Naming
//!
//! The root name is the last segment of the field path (`replicas` for
//! `/spec/replicas`, `item` inside an array), or `object` at the schema
//! root. Nested fields are addressed with dots: a rule on `/spec` reads
//! `spec.replicas`.
//!
//! ## Caching
//!
//! Compiled programs are cached under the field path plus a fingerprint of
//! the expression and schema subtree ([`ProgramKey`]). A replaced schema
//! therefore never reuses a stale program, and the validator's
//! [`SchemaObserver`](omni_schema::SchemaObserver) evicts entries whose
//! annotation disappeared or changed.
//!
//! ## Conversion
//!
//! [`ExpressionConverter`] evaluates `conversion:<expression>` with the
//! source value bound as `old` and returns the result as the converted
//! value.

pub mod cache;
pub mod check;
pub mod converter;
pub mod decl;
pub mod program;
pub mod validator;

pub use cache::{CacheStats, ProgramCache, ProgramKey};
pub use check::{CheckError, Ty};
pub use converter::{ExpressionConverter, CONVERSION_PLUGIN_ID};
pub use decl::{DeclType, Declarations};
pub use program::CompiledRule;
pub use validator::{ExpressionValidator, RULE_PLUGIN_ID};
