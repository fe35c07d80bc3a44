//! # Schema Registry
//!
//! Thread-safe map from [`GroupVersionKind`] to the schema tree currently
//! registered for it.
//!
//! ## Concurrency
//!
//! Entries are `Arc<VersionedSchema>` snapshots behind a `parking_lot`
//! `RwLock`. A register swaps the `Arc` under the write lock; readers clone
//! the `Arc` and drop the lock immediately, so a validation in progress
//! keeps walking the version it started with. Observers are notified after
//! the write lock is released.
//!
//! Entries are never removed. A schema that disappears upstream keeps its
//! last registered version.

use std::collections::HashMap;
use std::sync::Arc;

use omni_core::{CustomResourceDefinition, GroupVersionKind, SchemaNode};
use parking_lot::RwLock;

/// A schema tree together with the opaque version it was registered under.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedSchema {
    /// Registry key.
    pub gvk: GroupVersionKind,
    /// Root of the schema tree.
    pub root: SchemaNode,
    /// Opaque version identifier (resource version or content fingerprint).
    pub version_id: String,
}

/// Callback for components holding state derived from registered schemas.
pub trait SchemaObserver: Send + Sync {
    /// Called after `current` has been stored. `previous` is the entry it
    /// replaced, if any.
    fn schema_registered(&self, current: &VersionedSchema, previous: Option<&VersionedSchema>);
}

/// Registry of the schema version registered for each group/version/kind.
#[derive(Default)]
pub struct SchemaRegistry {
    entries: RwLock<HashMap<GroupVersionKind, Arc<VersionedSchema>>>,
    observers: RwLock<Vec<Arc<dyn SchemaObserver>>>,
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("entries", &self.len())
            .field("observers", &self.observers.read().len())
            .finish()
    }
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an observer. It sees every registration from now on.
    pub fn subscribe(&self, observer: Arc<dyn SchemaObserver>) {
        self.observers.write().push(observer);
    }

    /// Store `root` under `gvk`, replacing any previous entry.
    ///
    /// Returns the replaced entry. Observers are notified once the write
    /// lock has been released.
    pub fn register(
        &self,
        gvk: GroupVersionKind,
        root: SchemaNode,
        version_id: impl Into<String>,
    ) -> Option<Arc<VersionedSchema>> {
        let current = Arc::new(VersionedSchema {
            gvk: gvk.clone(),
            root,
            version_id: version_id.into(),
        });
        let previous = self.entries.write().insert(gvk, Arc::clone(&current));

        tracing::debug!(
            gvk = %current.gvk,
            version_id = %current.version_id,
            replaced = previous.is_some(),
            "schema registered"
        );

        let observers: Vec<_> = self.observers.read().iter().cloned().collect();
        for observer in observers {
            observer.schema_registered(&current, previous.as_deref());
        }
        previous
    }

    /// Register every version of `crd` that carries a schema.
    ///
    /// The version identifier is the CRD's `metadata.resourceVersion` when
    /// present, otherwise the fingerprint of each version's schema tree.
    /// Returns the keys that were registered.
    pub fn register_crd(&self, crd: &CustomResourceDefinition) -> Vec<GroupVersionKind> {
        for version in crd.versions_without_schema() {
            tracing::debug!(crd = %crd.metadata.name, version, "version has no schema, skipped");
        }
        crd.schemas()
            .map(|(gvk, root)| {
                let version_id = match &crd.metadata.resource_version {
                    Some(rv) => rv.clone(),
                    None => root.fingerprint().to_hex(),
                };
                self.register(gvk.clone(), root.clone(), version_id);
                gvk
            })
            .collect()
    }

    /// The entry registered for `gvk`, if any.
    pub fn lookup(&self, gvk: &GroupVersionKind) -> Option<Arc<VersionedSchema>> {
        self.entries.read().get(gvk).cloned()
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All registered keys, sorted.
    pub fn keys(&self) -> Vec<GroupVersionKind> {
        let mut keys: Vec<_> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn widget(version: &str) -> GroupVersionKind {
        GroupVersionKind::new("example.com", version, "Widget")
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, Option<String>)>>,
    }

    impl SchemaObserver for Recorder {
        fn schema_registered(&self, current: &VersionedSchema, previous: Option<&VersionedSchema>) {
            self.seen.lock().push((
                current.version_id.clone(),
                previous.map(|p| p.version_id.clone()),
            ));
        }
    }

    #[test]
    fn register_replaces_and_returns_previous() {
        let registry = SchemaRegistry::new();
        assert!(registry.register(widget("v1"), SchemaNode::string(), "1").is_none());
        let prev = registry
            .register(widget("v1"), SchemaNode::integer(), "2")
            .unwrap();
        assert_eq!(prev.version_id, "1");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(&widget("v1")).unwrap().root, SchemaNode::integer());
    }

    #[test]
    fn lookup_snapshot_survives_replacement() {
        let registry = SchemaRegistry::new();
        registry.register(widget("v1"), SchemaNode::string(), "1");
        let held = registry.lookup(&widget("v1")).unwrap();
        registry.register(widget("v1"), SchemaNode::integer(), "2");
        assert_eq!(held.root, SchemaNode::string());
    }

    #[test]
    fn observers_see_current_and_previous() {
        let registry = SchemaRegistry::new();
        let recorder = Arc::new(Recorder::default());
        registry.subscribe(recorder.clone());
        registry.register(widget("v1"), SchemaNode::string(), "1");
        registry.register(widget("v1"), SchemaNode::string(), "2");
        assert_eq!(
            *recorder.seen.lock(),
            vec![
                ("1".to_string(), None),
                ("2".to_string(), Some("1".to_string()))
            ]
        );
    }

    #[test]
    fn observer_may_read_registry_during_callback() {
        struct Reader(Arc<SchemaRegistry>, Mutex<usize>);
        impl SchemaObserver for Reader {
            fn schema_registered(&self, current: &VersionedSchema, _: Option<&VersionedSchema>) {
                *self.1.lock() = self.0.len();
                assert!(self.0.lookup(&current.gvk).is_some());
            }
        }
        let registry = Arc::new(SchemaRegistry::new());
        let reader = Arc::new(Reader(Arc::clone(&registry), Mutex::new(0)));
        registry.subscribe(reader.clone());
        registry.register(widget("v1"), SchemaNode::string(), "1");
        assert_eq!(*reader.1.lock(), 1);
    }

    #[test]
    fn register_crd_uses_resource_version_or_fingerprint() {
        let mut crd: CustomResourceDefinition = serde_json::from_value(serde_json::json!({
            "metadata": { "name": "widgets.example.com", "resourceVersion": "7" },
            "spec": {
                "group": "example.com",
                "names": { "kind": "Widget" },
                "versions": [
                    { "name": "v1", "schema": { "openAPIV3Schema": { "type": "object" } } },
                    { "name": "v2" }
                ]
            }
        }))
        .unwrap();

        let registry = SchemaRegistry::new();
        assert_eq!(registry.register_crd(&crd), vec![widget("v1")]);
        assert_eq!(registry.lookup(&widget("v1")).unwrap().version_id, "7");
        assert!(registry.lookup(&widget("v2")).is_none());

        crd.metadata.resource_version = None;
        registry.register_crd(&crd);
        let expected = SchemaNode::leaf(omni_core::SchemaKind::Object)
            .fingerprint()
            .to_hex();
        assert_eq!(registry.lookup(&widget("v1")).unwrap().version_id, expected);
    }

    #[test]
    fn keys_are_sorted() {
        let registry = SchemaRegistry::new();
        registry.register(widget("v2"), SchemaNode::string(), "a");
        registry.register(widget("v1"), SchemaNode::string(), "b");
        assert_eq!(registry.keys(), vec![widget("v1"), widget("v2")]);
        assert!(!registry.is_empty());
    }
}
