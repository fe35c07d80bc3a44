//! # omni-engine: Format Validation and Conversion
//!
//! Walks a schema tree in lock-step with an object and dispatches every
//! annotated node to the plugin its `format` names.
//!
//! ## Operations
//!
//! - [`FormatValidatorEngine::validate_program`]: dry-run compile of every
//!   annotation in a schema, independent of any data.
//! - [`FormatValidatorEngine::validate`]: check an object against a schema.
//! - [`ConversionEngine::convert`]: rebuild an object under a target schema,
//!   letting converters rewrite annotated fields and copying the rest.
//!
//! All three are the same [`walk`](walk::walk) with a different
//! [`NodeAction`]. Walks fail fast: the first error is returned with the
//! field path and plugin id, and nothing partial is produced.
//!
//! ## Plugins
//!
//! Plugins implement [`FormatValidator`] and/or [`FormatConverter`] and are
//! registered by id in a [`PluginRegistry`], which is built once and then
//! shared read-only. Annotations naming an unregistered id are skipped.

pub mod convert;
pub mod plugin;
pub mod validate;
pub mod walk;

pub use convert::ConversionEngine;
pub use plugin::{
    FormatConverter, FormatValidator, PluginContext, PluginRegistry, PluginRegistryBuilder,
};
pub use validate::FormatValidatorEngine;
pub use walk::{NodeAction, SchemaPair};
