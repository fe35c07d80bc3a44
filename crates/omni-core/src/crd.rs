//! # CustomResourceDefinition Documents
//!
//! The subset of an `apiextensions.k8s.io/v1` CustomResourceDefinition the
//! engine needs to derive versioned schemas. Unknown fields are ignored so
//! full manifests deserialise without loss of the parts that matter.

use serde::{Deserialize, Serialize};

use crate::gvk::GroupVersionKind;
use crate::schema::SchemaNode;

/// API version of CustomResourceDefinition documents.
pub const CRD_API_VERSION: &str = "apiextensions.k8s.io/v1";

/// Kind of CustomResourceDefinition documents.
pub const CRD_KIND: &str = "CustomResourceDefinition";

/// A CustomResourceDefinition document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomResourceDefinition {
    /// Object metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Definition body.
    pub spec: CrdSpec,
}

/// The metadata fields read from a CRD.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Object name.
    #[serde(default)]
    pub name: String,
    /// Opaque server-assigned version, when the document came from a cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

/// `spec` of a CRD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrdSpec {
    /// API group of the defined resource.
    pub group: String,
    /// Names of the defined resource.
    pub names: CrdNames,
    /// Served versions, each optionally carrying a schema.
    #[serde(default)]
    pub versions: Vec<CrdVersion>,
}

/// `spec.names` of a CRD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrdNames {
    /// Kind of the defined resource.
    pub kind: String,
    /// Plural resource name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural: Option<String>,
}

/// One entry of `spec.versions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrdVersion {
    /// Version name (e.g. `v1`).
    pub name: String,
    /// Validation schema for this version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<CrdValidation>,
}

/// `spec.versions[].schema`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrdValidation {
    /// The OpenAPI v3 schema root.
    #[serde(rename = "openAPIV3Schema")]
    pub open_api_v3_schema: SchemaNode,
}

impl CustomResourceDefinition {
    /// Key for one of this CRD's versions.
    pub fn gvk(&self, version: &str) -> GroupVersionKind {
        GroupVersionKind::new(&self.spec.group, version, &self.spec.names.kind)
    }

    /// Every version that carries a schema, with its key.
    pub fn schemas(&self) -> impl Iterator<Item = (GroupVersionKind, &SchemaNode)> + '_ {
        self.spec.versions.iter().filter_map(move |v| {
            v.schema
                .as_ref()
                .map(|s| (self.gvk(&v.name), &s.open_api_v3_schema))
        })
    }

    /// Names of versions that carry no schema.
    pub fn versions_without_schema(&self) -> impl Iterator<Item = &str> + '_ {
        self.spec
            .versions
            .iter()
            .filter(|v| v.schema.is_none())
            .map(|v| v.name.as_str())
    }

    /// Whether `object` is itself a CustomResourceDefinition, judged by its
    /// `apiVersion` and `kind`.
    pub fn is_crd_object(object: &serde_json::Value) -> bool {
        object.get("apiVersion").and_then(|v| v.as_str()) == Some(CRD_API_VERSION)
            && object.get("kind").and_then(|v| v.as_str()) == Some(CRD_KIND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaKind;

    const WIDGET_CRD: &str = r#"
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: widgets.example.com
  resourceVersion: "42"
spec:
  group: example.com
  scope: Namespaced
  names:
    kind: Widget
    plural: widgets
  versions:
    - name: v1
      served: true
      storage: true
      schema:
        openAPIV3Schema:
          type: object
          properties:
            spec:
              type: object
              properties:
                replicas:
                  type: integer
                  format: "rule:replicas >= 0"
    - name: v2alpha1
      served: false
      storage: false
"#;

    #[test]
    fn parses_yaml_manifest() {
        let crd: CustomResourceDefinition = serde_yaml::from_str(WIDGET_CRD).unwrap();
        assert_eq!(crd.metadata.name, "widgets.example.com");
        assert_eq!(crd.metadata.resource_version.as_deref(), Some("42"));
        assert_eq!(crd.spec.names.kind, "Widget");
        assert_eq!(crd.spec.versions.len(), 2);
    }

    #[test]
    fn schemas_skip_versions_without_schema() {
        let crd: CustomResourceDefinition = serde_yaml::from_str(WIDGET_CRD).unwrap();
        let schemas: Vec<_> = crd.schemas().collect();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].0, GroupVersionKind::new("example.com", "v1", "Widget"));
        assert_eq!(schemas[0].1.kind, SchemaKind::Object);
        assert_eq!(crd.versions_without_schema().collect::<Vec<_>>(), vec!["v2alpha1"]);
    }

    #[test]
    fn recognises_crd_objects() {
        let crd = serde_json::json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition"
        });
        let other = serde_json::json!({ "apiVersion": "example.com/v1", "kind": "Widget" });
        assert!(CustomResourceDefinition::is_crd_object(&crd));
        assert!(!CustomResourceDefinition::is_crd_object(&other));
    }
}
