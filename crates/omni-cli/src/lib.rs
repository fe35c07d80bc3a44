//! # omni-cli: Offline Schema Checks
//!
//! Runs the same engines as the webhook against files on disk, for CI
//! pipelines and for authoring annotations.
//!
//! ## Subcommands
//!
//! - `check`: dry-run compile every annotation in a set of CRDs.
//! - `validate`: check objects against registered CRD schemas.
//! - `convert`: convert objects to another version of their CRD.
//!
//! Every handler returns an exit code: 0 when everything passed, 1 when
//! something was refused. Operational failures (unreadable files, bad
//! flags) are errors.

pub mod check;
pub mod context;
pub mod convert;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing {
    use std::path::{Path, PathBuf};

    pub const WIDGET_CRD: &str = r#"
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: widgets.example.com
spec:
  group: example.com
  names:
    kind: Widget
    plural: widgets
  versions:
    - name: v1
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
                region:
                  type: string
    - name: v2
      schema:
        openAPIV3Schema:
          type: object
          properties:
            spec:
              type: object
              properties:
                replicas:
                  type: integer
                region:
                  type: string
                  format: "conversion:old + '-1'"
"#;

    pub fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }
}
