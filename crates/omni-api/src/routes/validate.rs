//! # Admission Route
//!
//! - `POST /validate`: answer an AdmissionReview.
//!
//! A CustomResourceDefinition under review has every version's schema
//! dry-run compiled, so a CRD with a broken annotation is refused before
//! it is stored. Then the object is checked against the schema registered
//! for its own `apiVersion`/`kind`; an object with no registered schema is
//! admitted.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use omni_core::crd::{CRD_API_VERSION, CRD_KIND};
use omni_core::{CustomResourceDefinition, Deadline, EngineError, GroupVersionKind};
use thiserror::Error;

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::review::{AdmissionRequest, AdmissionResponse, AdmissionReview, ADMISSION_KIND};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/validate", post(validate))
}

/// Why an object was refused.
#[derive(Error, Debug)]
pub enum Denial {
    /// The object claims to be a CRD but does not decode as one.
    #[error("invalid CustomResourceDefinition: {0}")]
    InvalidCrd(#[from] serde_json::Error),

    /// A dry-run compile or a format check failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl Denial {
    /// Metrics label.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidCrd(_) => "invalid_crd",
            Self::Engine(e) => e.category(),
        }
    }
}

/// Decide `request`. Runs the engine synchronously.
pub fn admit(state: &AppState, request: &AdmissionRequest, deadline: Deadline) -> Result<(), Denial> {
    if request.kind.gvk() == GroupVersionKind::from_api_version(CRD_API_VERSION, CRD_KIND) {
        let crd: CustomResourceDefinition = serde_json::from_value(request.object.clone())?;
        for (gvk, root) in crd.schemas() {
            state
                .validator
                .validate_program_until(root, deadline)
                .inspect_err(|e| tracing::debug!(gvk = %gvk, error = %e, "CRD schema refused"))?;
        }
    }

    let Some(gvk) = GroupVersionKind::of_object(&request.object) else {
        tracing::debug!(uid = %request.uid, "object has no apiVersion/kind, admitted");
        return Ok(());
    };
    let Some(schema) = state.schemas.lookup(&gvk) else {
        tracing::trace!(gvk = %gvk, "no schema registered, admitted");
        return Ok(());
    };
    state
        .validator
        .validate_until(&schema.root, &request.object, deadline)?;
    Ok(())
}

async fn validate(
    State(state): State<AppState>,
    body: Result<Json<AdmissionReview>, JsonRejection>,
) -> Result<Json<AdmissionReview>, AppError> {
    let review = extract_json(body)?;
    if review.kind != ADMISSION_KIND {
        return Err(AppError::BadRequest(format!(
            "expected kind {ADMISSION_KIND}, got {}",
            review.kind
        )));
    }
    let request = review
        .request
        .ok_or_else(|| AppError::BadRequest("AdmissionReview has no request".into()))?;

    let deadline = state.deadline();
    let task_state = state.clone();
    let (request, outcome) = tokio::task::spawn_blocking(move || {
        let outcome = admit(&task_state, &request, deadline);
        (request, outcome)
    })
    .await?;

    let response = match outcome {
        Ok(()) => {
            metrics::counter!("omni_admission_reviews_total", "outcome" => "allowed").increment(1);
            AdmissionResponse::allow(request.uid)
        }
        Err(denial) => {
            metrics::counter!(
                "omni_admission_reviews_total",
                "outcome" => "denied",
                "reason" => denial.reason()
            )
            .increment(1);
            tracing::info!(uid = %request.uid, kind = %request.kind.gvk(), error = %denial, "admission denied");
            AdmissionResponse::deny(request.uid, denial.to_string())
        }
    };
    Ok(Json(AdmissionReview::answer(review.api_version, response)))
}
