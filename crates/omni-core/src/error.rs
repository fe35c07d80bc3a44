//! # Error Taxonomy
//!
//! Structured error types for validation and conversion, built with
//! `thiserror`. No `Box<dyn Error>`, no `.unwrap()` outside tests.
//!
//! Plugins return [`PluginError`], which knows nothing about where in the
//! schema it was raised. The engine wraps it into an [`EngineError`] that
//! carries the field path and the plugin id.

use thiserror::Error;

use crate::path::FieldPath;

/// A format string without the `<pluginId>:` separator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("format annotation {raw:?} is missing the ':' separator")]
pub struct AnnotationSyntaxError {
    /// The offending annotation text.
    pub raw: String,
}

/// Errors reported by a plugin for a single node.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PluginError {
    /// The payload could not be compiled or parsed.
    #[error("compile error: {0}")]
    Compile(String),

    /// Evaluation failed at runtime (including bind-time type mismatches
    /// and sandbox traps).
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// The policy ran and rejected the value.
    #[error("{0}")]
    Rejected(String),

    /// A module or exported function named by the payload is missing.
    #[error("lookup error: {0}")]
    Lookup(String),

    /// The request deadline expired before the plugin finished.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl PluginError {
    /// Wrap this error with the location it was raised at.
    pub fn at(self, path: &FieldPath, plugin: &str) -> EngineError {
        let path = path.clone();
        let plugin = plugin.to_string();
        match self {
            Self::Compile(message) => EngineError::Compile { path, plugin, message },
            Self::Evaluation(message) => EngineError::Evaluation { path, plugin, message },
            Self::Rejected(message) => EngineError::ValidationFailure { path, plugin, message },
            Self::Lookup(message) => EngineError::Lookup { path, plugin, message },
            Self::DeadlineExceeded => EngineError::DeadlineExceeded { path },
        }
    }
}

/// Errors returned by the validation and conversion engines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The node's format string has no `:` separator.
    #[error("{path}: {source}")]
    AnnotationSyntax {
        /// Field path of the node.
        path: FieldPath,
        /// The underlying syntax error.
        source: AnnotationSyntaxError,
    },

    /// An array-kind node has no `items` schema.
    #[error("{path}: array schema has no items")]
    StructuralSchema {
        /// Field path of the array node.
        path: FieldPath,
    },

    /// A plugin could not compile its payload.
    #[error("{path}: {plugin}: compile error: {message}")]
    Compile {
        /// Field path of the node.
        path: FieldPath,
        /// Plugin that raised the error.
        plugin: String,
        /// Plugin diagnostic.
        message: String,
    },

    /// A plugin failed while evaluating.
    #[error("{path}: {plugin}: evaluation error: {message}")]
    Evaluation {
        /// Field path of the node.
        path: FieldPath,
        /// Plugin that raised the error.
        plugin: String,
        /// Plugin diagnostic.
        message: String,
    },

    /// A plugin evaluated its policy and the value did not pass.
    #[error("{path}: {plugin}: validation failed: {message}")]
    ValidationFailure {
        /// Field path of the node.
        path: FieldPath,
        /// Plugin that raised the error.
        plugin: String,
        /// Plugin diagnostic.
        message: String,
    },

    /// A module or function named by the payload does not exist.
    #[error("{path}: {plugin}: lookup error: {message}")]
    Lookup {
        /// Field path of the node.
        path: FieldPath,
        /// Plugin that raised the error.
        plugin: String,
        /// Plugin diagnostic.
        message: String,
    },

    /// The deadline expired before the walk finished.
    #[error("{path}: deadline exceeded")]
    DeadlineExceeded {
        /// Field path of the node the walk was about to visit.
        path: FieldPath,
    },
}

impl EngineError {
    /// Field path of the node the error was raised at.
    pub fn path(&self) -> &FieldPath {
        match self {
            Self::AnnotationSyntax { path, .. }
            | Self::StructuralSchema { path }
            | Self::Compile { path, .. }
            | Self::Evaluation { path, .. }
            | Self::ValidationFailure { path, .. }
            | Self::Lookup { path, .. }
            | Self::DeadlineExceeded { path } => path,
        }
    }

    /// Plugin that raised the error, for plugin-originated variants.
    pub fn plugin(&self) -> Option<&str> {
        match self {
            Self::Compile { plugin, .. }
            | Self::Evaluation { plugin, .. }
            | Self::ValidationFailure { plugin, .. }
            | Self::Lookup { plugin, .. } => Some(plugin),
            _ => None,
        }
    }

    /// Short machine-readable category name, used as a metrics label.
    pub fn category(&self) -> &'static str {
        match self {
            Self::AnnotationSyntax { .. } => "annotation_syntax",
            Self::StructuralSchema { .. } => "structural_schema",
            Self::Compile { .. } => "compile",
            Self::Evaluation { .. } => "evaluation",
            Self::ValidationFailure { .. } => "validation_failure",
            Self::Lookup { .. } => "lookup",
            Self::DeadlineExceeded { .. } => "deadline_exceeded",
        }
    }
}
