//! # Review Envelopes
//!
//! The subset of the `admission.k8s.io/v1` AdmissionReview and
//! `apiextensions.k8s.io/v1` ConversionReview documents the webhook reads
//! and writes. Unknown request fields are ignored.

use omni_core::GroupVersionKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `apiVersion` of admission reviews.
pub const ADMISSION_API_VERSION: &str = "admission.k8s.io/v1";

/// `kind` of admission reviews.
pub const ADMISSION_KIND: &str = "AdmissionReview";

/// `apiVersion` of conversion reviews.
pub const CONVERSION_API_VERSION: &str = "apiextensions.k8s.io/v1";

/// `kind` of conversion reviews.
pub const CONVERSION_KIND: &str = "ConversionReview";

/// `result.status` of a successful conversion.
pub const STATUS_SUCCESS: &str = "Success";

/// `status` of a failed review.
pub const STATUS_FAILURE: &str = "Failure";

// ---------------------------------------------------------------------------
// Shared
// ---------------------------------------------------------------------------

/// Outcome detail attached to denied admissions and to every conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl Status {
    /// A `Success` status with no message.
    pub fn success() -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            message: String::new(),
        }
    }

    /// A `Failure` status carrying `message`.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_FAILURE.to_string(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

/// An admission review, as received or as returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    pub api_version: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

impl AdmissionReview {
    /// The review returned for `request`: same envelope type, response only.
    pub fn answer(api_version: String, response: AdmissionResponse) -> Self {
        Self {
            api_version,
            kind: ADMISSION_KIND.to_string(),
            request: None,
            response: Some(response),
        }
    }
}

/// The object under review.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,
    pub kind: RequestKind,
    #[serde(default)]
    pub object: Value,
}

/// Group/version/kind of the resource named in an admission request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestKind {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl RequestKind {
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::new(&self.group, &self.version, &self.kind)
    }
}

/// The webhook's verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl AdmissionResponse {
    /// Admit the object.
    pub fn allow(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            allowed: true,
            status: None,
        }
    }

    /// Reject the object with `message`.
    pub fn deny(uid: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            allowed: false,
            status: Some(Status::failure(message)),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// A conversion review, as received or as returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionReview {
    pub api_version: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<ConversionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ConversionResponse>,
}

impl ConversionReview {
    /// The review returned for a request: same envelope type, response only.
    pub fn answer(api_version: String, response: ConversionResponse) -> Self {
        Self {
            api_version,
            kind: CONVERSION_KIND.to_string(),
            request: None,
            response: Some(response),
        }
    }
}

/// Objects to convert and the version to convert them to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub uid: String,
    #[serde(rename = "desiredAPIVersion")]
    pub desired_api_version: String,
    #[serde(default)]
    pub objects: Vec<Value>,
}

/// Converted objects, or a failure with none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResponse {
    pub uid: String,
    #[serde(rename = "convertedObjects", default)]
    pub converted_objects: Vec<Value>,
    pub result: Status,
}

impl ConversionResponse {
    /// Every object converted.
    pub fn success(uid: impl Into<String>, converted_objects: Vec<Value>) -> Self {
        Self {
            uid: uid.into(),
            converted_objects,
            result: Status::success(),
        }
    }

    /// Nothing converted.
    pub fn failure(uid: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            converted_objects: Vec::new(),
            result: Status::failure(message),
        }
    }
}
