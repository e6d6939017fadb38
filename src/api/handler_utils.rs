use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::api::error::ErrorKind;
use crate::diff::orchestrator::{DiffError, SlotFailure};
use crate::diff::ImageSlot;

pub type ApiObject<T> = (StatusCode, Json<T>);

#[derive(Debug, Clone, Serialize)]
struct ErrorResponse {
    ok: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    slot: Option<ImageSlot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failures: Option<Vec<FailureEntry>>,
}

#[derive(Debug, Clone, Serialize)]
struct FailureEntry {
    slot: ImageSlot,
    image: String,
    error: String,
    error_kind: ErrorKind,
    error_code: String,
}

impl FailureEntry {
    fn from_failure(failure: &SlotFailure) -> Self {
        let kind = failure.source.kind();
        Self {
            slot: failure.slot,
            image: failure.image.clone(),
            error: format!(
                "Failed to reconstruct Dockerfile for {}: {}",
                failure.image, failure.source
            ),
            error_kind: ErrorKind::from(kind),
            error_code: kind.code().to_string(),
        }
    }
}

pub fn error_response(
    status: StatusCode,
    kind: ErrorKind,
    code: impl Into<String>,
    message: impl Into<String>,
) -> ApiObject<Value> {
    (
        status,
        into_json(ErrorResponse {
            ok: false,
            error: message.into(),
            error_kind: Some(kind),
            error_code: Some(code.into()),
            slot: None,
            image: None,
            failures: None,
        }),
    )
}

pub fn validation_error(message: impl Into<String>) -> ApiObject<Value> {
    error_response(
        StatusCode::BAD_REQUEST,
        ErrorKind::Validation,
        "validation_error",
        message,
    )
}

pub fn map_diff_error(error: DiffError) -> ApiObject<Value> {
    match error {
        DiffError::Fetch { failures } => {
            let entries = failures
                .iter()
                .map(FailureEntry::from_failure)
                .collect::<Vec<_>>();
            for failure in &failures {
                warn!(
                    slot = failure.slot.as_str(),
                    image = %failure.image,
                    error = %failure.source,
                    "diff request failed"
                );
            }
            let Some(first) = entries.first().cloned() else {
                return internal_error("fetch failure without failed slots");
            };
            let message = entries
                .iter()
                .map(|entry| entry.error.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            (
                StatusCode::BAD_GATEWAY,
                into_json(ErrorResponse {
                    ok: false,
                    error: message,
                    error_kind: Some(first.error_kind),
                    error_code: Some(first.error_code),
                    slot: Some(first.slot),
                    image: Some(first.image),
                    failures: Some(entries),
                }),
            )
        }
        DiffError::Task(message) => internal_error(message),
    }
}

pub fn internal_error(message: impl Into<String>) -> ApiObject<Value> {
    let detail = message.into();
    error!(detail = %detail, "internal api error");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Infra,
        "internal_error",
        "Internal server error",
    )
}

pub fn into_json(payload: impl Serialize) -> Json<Value> {
    Json(serde_json::to_value(payload).expect("api payload should serialize"))
}
