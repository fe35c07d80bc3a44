//! # Field Paths
//!
//! The sequence of property names (and the literal `item` for each array
//! level) from the schema root to a node. Paths appear in every engine
//! error and form half of the compiled-program cache key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Segment used for each array level.
pub const ITEM_SEGMENT: &str = "item";

/// Path from the schema root to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// The empty path (the schema root).
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Extend with a property name.
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }

    /// Extend with the array item marker.
    pub fn item(&self) -> Self {
        self.child(ITEM_SEGMENT)
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The final segment, if any.
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// All segments in order.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Slash-joined form with a leading slash (`/spec/replicas`; the root
    /// is `/`). Used as the cache key component.
    pub fn cache_key(&self) -> String {
        if self.0.is_empty() {
            return "/".to_string();
        }
        let mut key = String::new();
        for segment in &self.0 {
            key.push('/');
            key.push_str(segment);
        }
        key
    }
}

impl<S: Into<String>> FromIterator<S> for FieldPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_renders_as_slash() {
        assert_eq!(FieldPath::root().to_string(), "/");
        assert!(FieldPath::root().is_root());
        assert_eq!(FieldPath::root().last(), None);
    }

    #[test]
    fn child_and_item_extend_without_mutating() {
        let spec = FieldPath::root().child("spec");
        let ports = spec.child("ports").item();
        assert_eq!(spec.to_string(), "/spec");
        assert_eq!(ports.to_string(), "/spec/ports/item");
        assert_eq!(ports.last(), Some("item"));
    }

    #[test]
    fn collects_from_segments() {
        let p: FieldPath = ["a", "b"].into_iter().collect();
        assert_eq!(p.segments(), &["a".to_string(), "b".to_string()]);
    }
}
