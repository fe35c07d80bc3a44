//! # Group / Version / Kind
//!
//! The key under which schema versions are registered and looked up.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A `(group, version, kind)` triple. The core API group is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupVersionKind {
    /// API group (`""` for the core group).
    pub group: String,
    /// API version within the group.
    pub version: String,
    /// Object kind.
    pub kind: String,
}

impl GroupVersionKind {
    /// Construct from parts.
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Parse an `apiVersion` string (`group/version`, or a bare core
    /// `version`) together with a kind.
    pub fn from_api_version(api_version: &str, kind: impl Into<String>) -> Self {
        let (group, version) = match api_version.split_once('/') {
            Some((group, version)) => (group, version),
            None => ("", api_version),
        };
        Self::new(group, version, kind)
    }

    /// Read `apiVersion` and `kind` from an object. Returns `None` when
    /// either is missing or not a string.
    pub fn of_object(object: &serde_json::Value) -> Option<Self> {
        let api_version = object.get("apiVersion")?.as_str()?;
        let kind = object.get("kind")?.as_str()?;
        Some(Self::from_api_version(api_version, kind))
    }

    /// Render the `apiVersion` string for this key.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// The same group and kind at a different `apiVersion`.
    pub fn with_api_version(&self, api_version: &str) -> Self {
        Self::from_api_version(api_version, self.kind.clone())
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version(), self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_grouped_and_core_api_versions() {
        let g = GroupVersionKind::from_api_version("apps.example.com/v1", "Widget");
        assert_eq!(g.group, "apps.example.com");
        assert_eq!(g.version, "v1");
        assert_eq!(g.api_version(), "apps.example.com/v1");

        let core = GroupVersionKind::from_api_version("v1", "ConfigMap");
        assert_eq!(core.group, "");
        assert_eq!(core.api_version(), "v1");
    }

    #[test]
    fn reads_identity_from_object() {
        let obj = json!({ "apiVersion": "example.com/v2", "kind": "Widget", "spec": {} });
        let gvk = GroupVersionKind::of_object(&obj).unwrap();
        assert_eq!(gvk, GroupVersionKind::new("example.com", "v2", "Widget"));
        assert!(GroupVersionKind::of_object(&json!({ "kind": "Widget" })).is_none());
    }

    #[test]
    fn swaps_api_version_keeping_kind() {
        let v1 = GroupVersionKind::new("example.com", "v1", "Widget");
        let v2 = v1.with_api_version("example.com/v2");
        assert_eq!(v2, GroupVersionKind::new("example.com", "v2", "Widget"));
        assert_eq!(v2.to_string(), "example.com/v2, Kind=Widget");
    }
}
