//! Resource limits for sandboxed modules.

use serde::{Deserialize, Serialize};

/// Default fuel units granted to each call.
pub const DEFAULT_FUEL_PER_CALL: u64 = 10_000_000;

/// Default linear memory limit per module instance (16 MiB).
pub const DEFAULT_MAX_MEMORY_BYTES: usize = 16 * 1024 * 1024;

/// Limits applied to every module instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Fuel units available to each call, including the `alloc` call that
    /// precedes it. Exhaustion traps the call.
    pub fuel_per_call: u64,
    /// Maximum size of an instance's linear memory in bytes.
    pub max_memory_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            fuel_per_call: DEFAULT_FUEL_PER_CALL,
            max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
        }
    }
}
