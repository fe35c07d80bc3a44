//! Errors raised while setting up the sandbox or registering modules.
//! Failures during validation calls are reported as
//! [`PluginError`](omni_core::PluginError)s instead.

use std::path::PathBuf;

use thiserror::Error;

/// Sandbox setup and module registration failures.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// The runtime engine could not be created.
    #[error("failed to create sandbox engine: {0}")]
    Engine(String),

    /// The module bytes are not a valid module.
    #[error("failed to compile module {module}: {reason}")]
    Compile {
        /// Module identifier.
        module: String,
        /// Runtime diagnostic.
        reason: String,
    },

    /// The module compiled but could not be instantiated (host imports,
    /// memory above the limit, a trapping start function).
    #[error("failed to instantiate module {module}: {reason}")]
    Instantiate {
        /// Module identifier.
        module: String,
        /// Runtime diagnostic.
        reason: String,
    },

    /// The module file could not be read.
    #[error("failed to read module file {path}: {source}")]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
