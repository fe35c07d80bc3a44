//! # Engine Context
//!
//! Arguments and loading shared by every subcommand: the CRDs to register
//! and the plugin setup, assembled into the same [`AppState`] the server
//! runs with.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use omni_api::bootstrap::{build_plugins, schema_registry};
use omni_api::config::PluginConfig;
use omni_api::AppState;
use omni_core::CustomResourceDefinition;
use omni_schema::{load_crd_dir, load_crd_file};
use serde::Deserialize;
use serde_json::Value;

/// CRD sources and plugin setup.
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// CRD manifest file or directory. Repeatable.
    #[arg(long = "crd", value_name = "PATH", required = true)]
    pub crds: Vec<PathBuf>,

    #[command(flatten)]
    pub plugins: PluginConfig,
}

impl EngineArgs {
    /// Build the plugins and register every CRD.
    pub fn load(&self) -> Result<(AppState, Vec<CustomResourceDefinition>)> {
        let plugins = build_plugins(&self.plugins).context("failed to set up plugins")?;
        let state = AppState::new(schema_registry(&plugins), plugins);

        let crds = load_crds(&self.crds)?;
        for crd in &crds {
            state.schemas.register_crd(crd);
        }
        tracing::info!(crds = crds.len(), schemas = state.schemas.len(), "CRDs registered");
        Ok((state, crds))
    }
}

/// Load CRDs from files and directories, in argument order.
pub fn load_crds(paths: &[PathBuf]) -> Result<Vec<CustomResourceDefinition>> {
    let mut crds = Vec::new();
    for path in paths {
        let loaded = if path.is_dir() {
            load_crd_dir(path)
        } else {
            load_crd_file(path)
        };
        crds.extend(loaded?);
    }
    Ok(crds)
}

/// Read every YAML or JSON document in `path` as an object. Empty
/// documents are skipped.
pub fn read_objects(path: &Path) -> Result<Vec<Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut objects = Vec::new();
    for document in serde_yaml::Deserializer::from_str(&text) {
        let value = Value::deserialize(document)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        if !value.is_null() {
            objects.push(value);
        }
    }
    Ok(objects)
}

/// `Kind/name` for messages.
pub fn describe(object: &Value) -> String {
    let kind = object.get("kind").and_then(Value::as_str).unwrap_or("<unknown>");
    let name = object
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>");
    format!("{kind}/{name}")
}
