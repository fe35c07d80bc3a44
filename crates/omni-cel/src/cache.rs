//! # Compiled Program Cache
//!
//! Programs are compiled lazily on first use and shared afterwards. Two
//! threads missing on the same key may both compile; the first insert wins
//! and both use an equivalent program.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use omni_core::{FieldPath, PluginError, SchemaFingerprint, SchemaNode};
use parking_lot::RwLock;

use crate::program::CompiledRule;

/// Cache key: slash-joined field path plus a fingerprint of the expression
/// source and the schema subtree it was compiled against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    /// Slash-joined field path.
    pub path: String,
    /// Fingerprint of source and subtree.
    pub fingerprint: SchemaFingerprint,
}

impl ProgramKey {
    /// Key for `source` compiled at `path` against `node`.
    pub fn new(path: &FieldPath, source: &str, node: &SchemaNode) -> Self {
        Self {
            path: path.cache_key(),
            fingerprint: SchemaFingerprint::of_source(source, node),
        }
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Shared map of compiled programs.
#[derive(Debug, Default)]
pub struct ProgramCache {
    entries: RwLock<HashMap<ProgramKey, Arc<CompiledRule>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached program for `key`, compiling and inserting it on a
    /// miss. Nothing is cached when `compile` fails.
    pub fn get_or_compile(
        &self,
        key: ProgramKey,
        compile: impl FnOnce() -> Result<CompiledRule, PluginError>,
    ) -> Result<Arc<CompiledRule>, PluginError> {
        if let Some(rule) = self.entries.read().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(rule));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let compiled = Arc::new(compile()?);
        tracing::debug!(path = %key.path, fingerprint = %key.fingerprint, "compiled program cached");
        let mut entries = self.entries.write();
        Ok(Arc::clone(entries.entry(key).or_insert(compiled)))
    }

    /// The cached program for `key`, if any.
    pub fn get(&self, key: &ProgramKey) -> Option<Arc<CompiledRule>> {
        self.entries.read().get(key).cloned()
    }

    /// Remove every entry compiled at `path`. Returns how many were removed.
    pub fn evict_path(&self, path: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| key.path != path);
        before - entries.len()
    }

    /// Evict entries for `plugin_id` annotations of `previous` that are
    /// gone or different in `current`. Returns how many were removed.
    pub fn evict_stale(&self, plugin_id: &str, previous: &SchemaNode, current: &SchemaNode) -> usize {
        let before = annotation_fingerprints(previous, plugin_id);
        let after = annotation_fingerprints(current, plugin_id);
        before
            .iter()
            .filter(|(path, fp)| after.get(*path) != Some(*fp))
            .map(|(path, _)| self.evict_path(path))
            .sum()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Path → fingerprint of every node annotated for `plugin_id`.
fn annotation_fingerprints(root: &SchemaNode, plugin_id: &str) -> HashMap<String, SchemaFingerprint> {
    let mut out = HashMap::new();
    for (path, node) in root.annotated_nodes() {
        if let Ok(Some(annotation)) = node.annotation() {
            if annotation.plugin_id == plugin_id {
                out.insert(
                    path.cache_key(),
                    SchemaFingerprint::of_source(annotation.payload, node),
                );
            }
        }
    }
    out
}
