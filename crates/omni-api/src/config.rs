//! # Server Configuration
//!
//! Command-line flags with environment fallbacks. Every flag can be set
//! through an `OMNI_*` variable so the server can be configured entirely
//! from a pod spec.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Parser};
use omni_wasm::config::{DEFAULT_FUEL_PER_CALL, DEFAULT_MAX_MEMORY_BYTES};
use omni_wasm::SandboxConfig;
use thiserror::Error;

/// Default bound on a single webhook request's engine work.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A module spec was not of the form `id=path`.
    #[error("invalid module spec {0:?}: expected <id>=<path>")]
    ModuleSpec(String),
}

/// A sandbox module to register at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpec {
    /// Identifier used in `wasm:<id>:<function>` annotations.
    pub id: String,
    /// Binary or text module on disk.
    pub path: PathBuf,
}

impl FromStr for ModuleSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((id, path)) if !id.is_empty() && !path.is_empty() => Ok(Self {
                id: id.to_string(),
                path: PathBuf::from(path),
            }),
            _ => Err(ConfigError::ModuleSpec(s.to_string())),
        }
    }
}

/// Plugin setup shared by the server and the CLI.
#[derive(Debug, Clone, Args)]
pub struct PluginConfig {
    /// Sandbox modules as `id=path`, repeatable or comma separated.
    #[arg(long = "module", env = "OMNI_MODULES", value_delimiter = ',')]
    pub modules: Vec<ModuleSpec>,

    /// Fuel units granted to each sandbox call.
    #[arg(long, env = "OMNI_WASM_FUEL", default_value_t = DEFAULT_FUEL_PER_CALL)]
    pub wasm_fuel: u64,

    /// Linear memory limit per sandbox instance, in bytes.
    #[arg(long, env = "OMNI_WASM_MAX_MEMORY", default_value_t = DEFAULT_MAX_MEMORY_BYTES)]
    pub wasm_max_memory: usize,
}

impl PluginConfig {
    /// Limits for the sandbox plugin.
    pub fn sandbox(&self) -> SandboxConfig {
        SandboxConfig {
            fuel_per_call: self.wasm_fuel,
            max_memory_bytes: self.wasm_max_memory,
        }
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            modules: Vec::new(),
            wasm_fuel: DEFAULT_FUEL_PER_CALL,
            wasm_max_memory: DEFAULT_MAX_MEMORY_BYTES,
        }
    }
}

/// Webhook server configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "omni-api", version, about = "Format-validation and conversion webhook")]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(long, env = "OMNI_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Directory of CRD manifests loaded at startup.
    #[arg(long, env = "OMNI_CRD_DIR")]
    pub crd_dir: Option<PathBuf>,

    /// Watch the CRD directory and apply manifests as they change.
    #[arg(long, env = "OMNI_WATCH_CRD_DIR", requires = "crd_dir")]
    pub watch: bool,

    /// Bound on the engine work of a single request, in milliseconds.
    #[arg(long, env = "OMNI_REQUEST_TIMEOUT_MS", default_value_t = DEFAULT_REQUEST_TIMEOUT_MS)]
    pub request_timeout_ms: u64,

    /// Emit logs as JSON lines.
    #[arg(long, env = "OMNI_LOG_JSON")]
    pub log_json: bool,

    #[command(flatten)]
    pub plugins: PluginConfig,
}

impl ServerConfig {
    /// The per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// The CRD directory to watch, when watching is enabled.
    pub fn watched_dir(&self) -> Option<&Path> {
        self.crd_dir.as_deref().filter(|_| self.watch)
    }
}
