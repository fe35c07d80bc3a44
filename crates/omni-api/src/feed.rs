//! # Schema Feed
//!
//! Schema-change events and the task that applies them to the registry.
//!
//! Events come from a [`CrdDirWatcher`] subscribed to file-system
//! notifications for a manifest directory, or from anything else holding
//! the channel's sender. Registration is append/replace only: a `Deleted`
//! event is logged and the last schema registered for the CRD stays in
//! place.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use omni_core::{CustomResourceDefinition, GroupVersionKind};
use omni_schema::load_crd_file;
use omni_schema::loader::{is_manifest, manifest_files};
use tokio::sync::mpsc;

use crate::state::AppState;

/// A change to the set of known CRDs.
#[derive(Debug, Clone)]
pub enum SchemaEvent {
    /// A CRD was created or updated.
    Applied(CustomResourceDefinition),
    /// A CRD with this name went away.
    Deleted(String),
}

/// Register `crd` and dry-run compile each version's schema.
///
/// Compile failures are logged. The schema is registered regardless, so
/// objects of that version are still checked and fail with the same error.
pub fn apply_crd(state: &AppState, crd: &CustomResourceDefinition) -> Vec<GroupVersionKind> {
    let registered = state.schemas.register_crd(crd);
    for (gvk, root) in crd.schemas() {
        if let Err(e) = state.validator.validate_program(root) {
            tracing::warn!(crd = %crd.metadata.name, gvk = %gvk, error = %e, "schema annotations do not compile");
        }
    }
    tracing::info!(crd = %crd.metadata.name, versions = registered.len(), "CRD applied");
    registered
}

/// Apply one event.
pub fn handle_event(state: &AppState, event: SchemaEvent) {
    match event {
        SchemaEvent::Applied(crd) => {
            apply_crd(state, &crd);
        }
        SchemaEvent::Deleted(name) => {
            tracing::info!(crd = %name, "CRD deleted, registered schemas kept");
        }
    }
}

/// Apply events until every sender is dropped.
pub async fn apply_events(state: AppState, mut events: mpsc::Receiver<SchemaEvent>) {
    while let Some(event) = events.recv().await {
        handle_event(&state, event);
    }
    tracing::debug!("schema feed closed");
}

// ---------------------------------------------------------------------------
// Directory watcher
// ---------------------------------------------------------------------------

/// Turns file-system notifications for a manifest directory into schema
/// events. Only the CRD names last loaded from each file are kept, so a
/// removed or rewritten file can report the CRDs it no longer defines.
#[derive(Debug)]
pub struct CrdDirWatcher {
    dir: PathBuf,
    files: HashMap<PathBuf, Vec<String>>,
}

impl CrdDirWatcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: HashMap::new(),
        }
    }

    /// The watched directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record the CRDs of the files already present without emitting
    /// events. Used after the directory has been loaded at startup.
    pub fn prime(&mut self) {
        let files = match manifest_files(&self.dir) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list CRD directory");
                return;
            }
        };
        for file in files {
            let _ = self.reload(&file);
        }
    }

    /// Schema events for one notification. Paths without a manifest
    /// extension are ignored.
    pub fn handle(&mut self, event: &Event) -> Vec<SchemaEvent> {
        let mut events = Vec::new();
        for path in event.paths.iter().filter(|p| is_manifest(p)) {
            match event.kind {
                // A rename reports the old name as a modification too.
                EventKind::Create(_) | EventKind::Modify(_) if path.is_file() => {
                    events.extend(self.reload(path));
                }
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
                    events.extend(self.forget(path));
                }
                _ => {}
            }
        }
        events
    }

    /// Re-read `file`. A file that fails to read or parse is logged and
    /// keeps the names it had.
    fn reload(&mut self, file: &Path) -> Vec<SchemaEvent> {
        let crds = match load_crd_file(file) {
            Ok(crds) => crds,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load manifest");
                return Vec::new();
            }
        };
        let names: Vec<String> = crds.iter().map(|crd| crd.metadata.name.clone()).collect();
        let mut events = match self.files.insert(file.to_path_buf(), names.clone()) {
            Some(previous) => deleted(previous, &names),
            None => Vec::new(),
        };
        events.extend(crds.into_iter().map(SchemaEvent::Applied));
        events
    }

    fn forget(&mut self, file: &Path) -> Vec<SchemaEvent> {
        self.files
            .remove(file)
            .map(|previous| deleted(previous, &[]))
            .unwrap_or_default()
    }

    /// Subscribe to the directory and forward events into `events` until
    /// the returned watcher is dropped or the receiver goes away.
    ///
    /// # Errors
    ///
    /// The watcher backend could not be created or the directory could not
    /// be watched.
    pub fn watch(mut self, events: mpsc::Sender<SchemaEvent>) -> notify::Result<RecommendedWatcher> {
        let dir = self.dir.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for schema_event in self.handle(&event) {
                    if events.blocking_send(schema_event).is_err() {
                        tracing::debug!("schema feed receiver dropped");
                        return;
                    }
                }
            }
            Err(e) => tracing::error!(error = %e, "CRD directory watch error"),
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(dir = %dir.display(), "watching CRD directory");
        Ok(watcher)
    }
}

fn deleted(before: Vec<String>, after: &[String]) -> Vec<SchemaEvent> {
    before
        .into_iter()
        .filter(|name| !after.contains(name))
        .map(SchemaEvent::Deleted)
        .collect()
}
