//! # omni-schema: Versioned Schema Registry
//!
//! Holds the schema tree registered for every group/version/kind and
//! loads those trees from CustomResourceDefinition manifests.
//!
//! ## Responsibilities
//!
//! - **Registry:** [`SchemaRegistry`] maps a [`GroupVersionKind`] to an
//!   immutable [`VersionedSchema`] snapshot. Registration replaces; lookups
//!   hand out `Arc` clones so no lock is held while a schema is walked.
//! - **Observers:** plugins that cache per-schema state subscribe with a
//!   [`SchemaObserver`] and are told about every replacement.
//! - **Loading:** [`loader`] parses CRD manifests (YAML or JSON, single or
//!   multi-document) from files and directories.
//!
//! [`GroupVersionKind`]: omni_core::GroupVersionKind

pub mod loader;
pub mod registry;

// Re-export primary types.
pub use loader::{load_crd_dir, load_crd_file, parse_crds, LoadError};
pub use registry::{SchemaObserver, SchemaRegistry, VersionedSchema};
