//! # CRD Manifest Loading
//!
//! Reads CustomResourceDefinition manifests from disk. Files may be YAML or
//! JSON and may hold several `---` separated documents; documents that are
//! not CRDs (or are empty) are skipped.

use std::path::{Path, PathBuf};

use omni_core::crd::{CRD_API_VERSION, CRD_KIND};
use omni_core::CustomResourceDefinition;
use serde::Deserialize;
use thiserror::Error;

/// File extensions treated as manifests.
pub const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Errors returned while loading manifests.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The file or directory could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A document could not be parsed as a CRD.
    #[error("failed to parse {origin}: {reason}")]
    Parse {
        /// File path or other origin of the text.
        origin: String,
        /// Parser diagnostic.
        reason: String,
    },
}

/// Parse every CRD document in `text`. `origin` names the text in errors.
pub fn parse_crds(text: &str, origin: &str) -> Result<Vec<CustomResourceDefinition>, LoadError> {
    let parse_err = |e: serde_yaml::Error| LoadError::Parse {
        origin: origin.to_string(),
        reason: e.to_string(),
    };

    let mut crds = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = serde_yaml::Value::deserialize(document).map_err(parse_err)?;
        if value.is_null() {
            continue;
        }
        let api_version = value.get("apiVersion").and_then(|v| v.as_str());
        let kind = value.get("kind").and_then(|v| v.as_str());
        if api_version != Some(CRD_API_VERSION) || kind != Some(CRD_KIND) {
            tracing::debug!(origin, ?api_version, ?kind, "document is not a CRD, skipped");
            continue;
        }
        crds.push(serde_yaml::from_value(value).map_err(parse_err)?);
    }
    Ok(crds)
}

/// Load every CRD in a single manifest file.
pub fn load_crd_file(path: &Path) -> Result<Vec<CustomResourceDefinition>, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_crds(&text, &path.display().to_string())
}

/// Manifest files directly inside `dir`, sorted by path.
pub fn manifest_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let io_err = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && is_manifest(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load every CRD from every manifest file directly inside `dir`.
pub fn load_crd_dir(dir: &Path) -> Result<Vec<CustomResourceDefinition>, LoadError> {
    let mut crds = Vec::new();
    for file in manifest_files(dir)? {
        crds.extend(load_crd_file(&file)?);
    }
    tracing::info!(dir = %dir.display(), count = crds.len(), "loaded CRD manifests");
    Ok(crds)
}

/// Whether `path` has a manifest extension (`yaml`, `yml`, `json`).
pub fn is_manifest(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDGETS: &str = r#"
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: widgets.example.com
spec:
  group: example.com
  names: { kind: Widget, plural: widgets }
  versions:
    - name: v1
      schema:
        openAPIV3Schema:
          type: object
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: unrelated
---
"#;

    #[test]
    fn parse_skips_non_crd_documents() {
        let crds = parse_crds(WIDGETS, "inline").unwrap();
        assert_eq!(crds.len(), 1);
        assert_eq!(crds[0].spec.names.kind, "Widget");
    }

    #[test]
    fn parse_accepts_json() {
        let json = serde_json::json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition",
            "metadata": { "name": "gadgets.example.com" },
            "spec": { "group": "example.com", "names": { "kind": "Gadget" }, "versions": [] }
        });
        let crds = parse_crds(&json.to_string(), "inline.json").unwrap();
        assert_eq!(crds[0].metadata.name, "gadgets.example.com");
    }

    #[test]
    fn parse_reports_malformed_crd() {
        let broken = "apiVersion: apiextensions.k8s.io/v1\nkind: CustomResourceDefinition\nspec: 3\n";
        let err = parse_crds(broken, "broken.yaml").unwrap_err();
        assert!(matches!(err, LoadError::Parse { ref origin, .. } if origin == "broken.yaml"));
    }

    #[test]
    fn load_dir_reads_only_manifest_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("widgets.yaml"), WIDGETS).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not yaml: [").unwrap();
        let crds = load_crd_dir(dir.path()).unwrap();
        assert_eq!(crds.len(), 1);
    }

    #[test]
    fn load_missing_dir_is_io_error() {
        let err = load_crd_dir(Path::new("/nonexistent/omni-crds")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
