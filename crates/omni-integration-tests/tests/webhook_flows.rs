//! # Webhook Flows
//!
//! End-to-end admission and conversion through the HTTP router, starting
//! from manifests on disk the way the server boots.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use clap::Parser;
use http_body_util::BodyExt;
use omni_api::bootstrap::bootstrap;
use omni_api::config::ServerConfig;
use omni_api::feed::{apply_events, CrdDirWatcher};
use omni_api::state::AppState;
use omni_schema::parse_crds;
use serde_json::{json, Value};
use tower::ServiceExt;

const GADGET_CRD: &str = r#"
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: gadgets.example.com
spec:
  group: example.com
  names:
    kind: Gadget
    plural: gadgets
  scope: Namespaced
  versions:
    - name: v1alpha1
      served: true
      storage: false
      schema:
        openAPIV3Schema:
          type: object
          properties:
            spec:
              type: object
              properties:
                size:
                  type: integer
                  format: "rule:size >= 1 && size <= 10"
                color:
                  type: string
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
                size:
                  type: object
                  format: "conversion:{'value': old, 'unit': 'Gi'}"
                  properties:
                    value:
                      type: integer
                    unit:
                      type: string
                color:
                  type: string
                  format: "rule:color in ['red', 'green', 'blue']"
"#;

fn boot(dir: &std::path::Path) -> AppState {
    let config = ServerConfig::parse_from([
        "omni-api",
        "--crd-dir",
        dir.to_str().unwrap(),
        "--request-timeout-ms",
        "5000",
    ]);
    bootstrap(&config).unwrap()
}

fn booted() -> (tempfile::TempDir, AppState) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("gadget.yaml"), GADGET_CRD).unwrap();
    let state = boot(dir.path());
    (dir, state)
}

async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let resp = app.oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn admission(uid: &str, kind: Value, object: Value) -> Value {
    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": { "uid": uid, "kind": kind, "operation": "CREATE", "object": object }
    })
}

fn gadget_review(uid: &str, version: &str, spec: Value) -> Value {
    admission(
        uid,
        json!({ "group": "example.com", "version": version, "kind": "Gadget" }),
        json!({
            "apiVersion": format!("example.com/{version}"),
            "kind": "Gadget",
            "metadata": { "name": "g" },
            "spec": spec
        }),
    )
}

// =========================================================================
// Admission
// =========================================================================

#[tokio::test]
async fn booted_server_checks_objects_of_every_version() {
    let (_dir, state) = booted();
    assert_eq!(state.schemas.len(), 2);
    assert_eq!(state.request_timeout, Duration::from_millis(5000));
    let app = omni_api::app(state);

    let (status, body) = post(
        app.clone(),
        "/validate",
        gadget_review("a", "v1alpha1", json!({ "size": 4, "color": "purple" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"]["uid"], "a");
    assert_eq!(body["response"]["allowed"], true);

    let (_, body) = post(
        app.clone(),
        "/validate",
        gadget_review("b", "v1alpha1", json!({ "size": 40 })),
    )
    .await;
    assert_eq!(body["response"]["allowed"], false);
    assert_eq!(body["response"]["status"]["status"], "Failure");
    let message = body["response"]["status"]["message"].as_str().unwrap();
    assert!(message.contains("/spec/size"), "{message}");

    let (_, body) = post(
        app,
        "/validate",
        gadget_review("c", "v1", json!({ "size": { "value": 4, "unit": "Gi" }, "color": "purple" })),
    )
    .await;
    assert_eq!(body["response"]["allowed"], false);
    let message = body["response"]["status"]["message"].as_str().unwrap();
    assert!(message.contains("/spec/color"), "{message}");
}

#[tokio::test]
async fn submitted_crd_is_dry_run_before_it_is_applied() {
    let (_dir, state) = booted();
    let app = omni_api::app(state);
    let crd_kind = json!({
        "group": "apiextensions.k8s.io",
        "version": "v1",
        "kind": "CustomResourceDefinition"
    });

    let crd = parse_crds(GADGET_CRD, "test").unwrap().remove(0);
    let mut manifest = serde_json::to_value(&crd).unwrap();
    let (_, body) = post(app.clone(), "/validate", admission("ok", crd_kind.clone(), manifest.clone())).await;
    assert_eq!(body["response"]["allowed"], true);

    let size = &mut manifest["spec"]["versions"][0]["schema"]["openAPIV3Schema"]["properties"]["spec"]
        ["properties"]["size"];
    size["format"] = json!("rule:size >=");
    let (_, body) = post(app, "/validate", admission("broken", crd_kind, manifest)).await;
    assert_eq!(body["response"]["allowed"], false);
    let message = body["response"]["status"]["message"].as_str().unwrap();
    assert!(message.contains("compile"), "{message}");
}

// =========================================================================
// Conversion
// =========================================================================

#[tokio::test]
async fn conversion_rewrites_fields_and_keeps_identity() {
    let (_dir, state) = booted();
    let app = omni_api::app(state);
    let object = json!({
        "apiVersion": "example.com/v1alpha1",
        "kind": "Gadget",
        "metadata": { "name": "g", "namespace": "default", "resourceVersion": "7" },
        "spec": { "size": 4, "color": "red" },
        "status": { "phase": "Ready" }
    });
    let review = json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "ConversionReview",
        "request": { "uid": "c1", "desiredAPIVersion": "example.com/v1", "objects": [object] }
    });

    let (status, body) = post(app, "/convert", review).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "ConversionReview");
    let response = &body["response"];
    assert_eq!(response["uid"], "c1");
    assert_eq!(response["result"]["status"], "Success");
    assert_eq!(
        response["convertedObjects"][0],
        json!({
            "apiVersion": "example.com/v1",
            "kind": "Gadget",
            "metadata": { "name": "g", "namespace": "default", "resourceVersion": "7" },
            "spec": { "size": { "value": 4, "unit": "Gi" }, "color": "red" }
        })
    );
}

#[tokio::test]
async fn conversion_failure_reports_the_object_and_converts_nothing() {
    let (_dir, state) = booted();
    let app = omni_api::app(state);
    let good = json!({
        "apiVersion": "example.com/v1alpha1",
        "kind": "Gadget",
        "metadata": { "name": "a" },
        "spec": { "size": 1 }
    });
    let bad = json!({
        "apiVersion": "example.com/v1alpha1",
        "kind": "Gadget",
        "metadata": { "name": "b" },
        "spec": { "size": "large" }
    });
    let review = json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "ConversionReview",
        "request": { "uid": "c2", "desiredAPIVersion": "example.com/v1", "objects": [good, bad] }
    });

    let (status, body) = post(app, "/convert", review).await;
    assert_eq!(status, StatusCode::OK);
    let response = &body["response"];
    assert_eq!(response["result"]["status"], "Failure");
    assert!(response["result"]["message"].as_str().unwrap().starts_with("object 1:"));
    assert_eq!(response["convertedObjects"], json!([]));
}

// =========================================================================
// Schema feed
// =========================================================================

#[tokio::test]
async fn watched_directory_feeds_new_crds_into_the_server() {
    let dir = tempfile::tempdir().unwrap();
    let state = boot(dir.path());
    assert!(state.schemas.is_empty());

    let (tx, rx) = tokio::sync::mpsc::channel(8);
    tokio::spawn(apply_events(state.clone(), rx));
    let mut watcher = CrdDirWatcher::new(dir.path());
    watcher.prime();
    let _watcher = watcher.watch(tx).unwrap();

    let staged = dir.path().join("gadget.tmp");
    std::fs::write(&staged, GADGET_CRD).unwrap();
    std::fs::rename(&staged, dir.path().join("gadget.yaml")).unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while state.schemas.len() < 2 {
        assert!(tokio::time::Instant::now() < deadline, "CRD was not applied within 10s");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let (_, body) = post(
        omni_api::app(state),
        "/validate",
        gadget_review("w", "v1alpha1", json!({ "size": 0 })),
    )
    .await;
    assert_eq!(body["response"]["allowed"], false);
}

#[tokio::test]
async fn readiness_reflects_booted_registry() {
    let (_dir, state) = booted();
    let request = Request::builder()
        .uri("/health/readiness")
        .body(Body::empty())
        .unwrap();
    let resp = omni_api::app(state).oneshot(request).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["schemas"], 2);
    assert_eq!(body["validators"], json!(["rule", "wasm"]));
    assert_eq!(body["converters"], json!(["conversion"]));
}
