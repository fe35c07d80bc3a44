//! # Conversion Route
//!
//! - `POST /convert`: answer a ConversionReview.
//!
//! Every object is converted from the schema registered for its own
//! `apiVersion`/`kind` to the schema registered for the desired version.
//! `metadata` is carried over unchanged and `apiVersion` rewritten. One
//! failing object fails the whole review and no objects are returned.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use omni_core::{Deadline, EngineError, GroupVersionKind};
use serde_json::Value;
use thiserror::Error;

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::review::{ConversionRequest, ConversionResponse, ConversionReview, CONVERSION_KIND};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/convert", post(convert))
}

/// Why a conversion review failed.
#[derive(Error, Debug)]
pub enum ConversionFailure {
    /// An object has no `apiVersion`/`kind`.
    #[error("object {index} has no apiVersion/kind")]
    MissingTypeMeta { index: usize },

    /// No schema is registered for one side of the conversion.
    #[error("no schema registered for {gvk}")]
    NoSchema { gvk: GroupVersionKind },

    /// The converted object is not a JSON object.
    #[error("object {index} did not convert to an object")]
    NotAnObject { index: usize },

    /// A converter failed.
    #[error("object {index}: {source}")]
    Engine { index: usize, source: EngineError },
}

impl ConversionFailure {
    /// Metrics label.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingTypeMeta { .. } => "missing_type_meta",
            Self::NoSchema { .. } => "no_schema",
            Self::NotAnObject { .. } => "not_an_object",
            Self::Engine { source, .. } => source.category(),
        }
    }
}

/// Convert every object in `request`, or none.
pub fn convert_objects(
    state: &AppState,
    request: &ConversionRequest,
    deadline: Deadline,
) -> Result<Vec<Value>, ConversionFailure> {
    request
        .objects
        .iter()
        .enumerate()
        .map(|(index, object)| convert_object(state, index, object, &request.desired_api_version, deadline))
        .collect()
}

fn convert_object(
    state: &AppState,
    index: usize,
    object: &Value,
    desired_api_version: &str,
    deadline: Deadline,
) -> Result<Value, ConversionFailure> {
    let source_gvk =
        GroupVersionKind::of_object(object).ok_or(ConversionFailure::MissingTypeMeta { index })?;
    let target_gvk = source_gvk.with_api_version(desired_api_version);
    if source_gvk == target_gvk {
        return Ok(object.clone());
    }

    let lookup = |gvk: &GroupVersionKind| {
        state
            .schemas
            .lookup(gvk)
            .ok_or_else(|| ConversionFailure::NoSchema { gvk: gvk.clone() })
    };
    let source = lookup(&source_gvk)?;
    let target = lookup(&target_gvk)?;

    let mut converted = state
        .converter
        .convert_until(&source.root, &target.root, object, deadline)
        .map_err(|source| ConversionFailure::Engine { index, source })?;

    let fields = converted
        .as_object_mut()
        .ok_or(ConversionFailure::NotAnObject { index })?;
    fields.insert("apiVersion".into(), Value::String(desired_api_version.to_string()));
    fields.insert("kind".into(), Value::String(target_gvk.kind.clone()));
    if let Some(metadata) = object.get("metadata") {
        fields.insert("metadata".into(), metadata.clone());
    }
    tracing::trace!(index, from = %source_gvk, to = %target_gvk, "object converted");
    Ok(converted)
}

async fn convert(
    State(state): State<AppState>,
    body: Result<Json<ConversionReview>, JsonRejection>,
) -> Result<Json<ConversionReview>, AppError> {
    let review = extract_json(body)?;
    if review.kind != CONVERSION_KIND {
        return Err(AppError::BadRequest(format!(
            "expected kind {CONVERSION_KIND}, got {}",
            review.kind
        )));
    }
    let request = review
        .request
        .ok_or_else(|| AppError::BadRequest("ConversionReview has no request".into()))?;

    let deadline = state.deadline();
    let task_state = state.clone();
    let (request, outcome) = tokio::task::spawn_blocking(move || {
        let outcome = convert_objects(&task_state, &request, deadline);
        (request, outcome)
    })
    .await?;

    let response = match outcome {
        Ok(converted) => {
            metrics::counter!("omni_conversion_reviews_total", "outcome" => "success").increment(1);
            metrics::counter!("omni_converted_objects_total").increment(converted.len() as u64);
            ConversionResponse::success(request.uid, converted)
        }
        Err(failure) => {
            metrics::counter!(
                "omni_conversion_reviews_total",
                "outcome" => "failure",
                "reason" => failure.reason()
            )
            .increment(1);
            tracing::warn!(
                uid = %request.uid,
                desired = %request.desired_api_version,
                error = %failure,
                "conversion failed"
            );
            ConversionResponse::failure(request.uid, failure.to_string())
        }
    };
    Ok(Json(ConversionReview::answer(review.api_version, response)))
}
