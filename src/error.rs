//! Typed errors and HTTP mapping.
//!
//! Every failure raised while serving a model route is an [`ApiError`]; it is turned into a
//! `{"error": {"type", "message"}}` body exactly once, when the handler result is converted
//! into a response.

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Message returned for 5xx errors when debug mode is off.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred.";

static DEBUG: AtomicBool = AtomicBool::new(false);

/// Enable or disable verbose error responses for the whole process.
pub fn set_debug(enabled: bool) {
    DEBUG.store(enabled, Ordering::Relaxed);
}

pub fn debug_enabled() -> bool {
    DEBUG.load(Ordering::Relaxed)
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("duplicate {kind}: {name}")]
    Duplicate { kind: &'static str, name: String },
    #[error("invalid field {model}.{field}: {reason}")]
    InvalidField {
        model: String,
        field: String,
        reason: String,
    },
    #[error("unknown pagination strategy: {0}")]
    UnknownPagination(String),
    #[error("invalid setting {key}: {value}")]
    InvalidSetting { key: &'static str, value: String },
    #[error("config load: {0}")]
    Load(String),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    Validation(String),
    #[error("database error: {0}")]
    DatabaseOperation(#[from] sqlx::Error),
    #[error("synchronous operation failed: {0}")]
    SynchronousOperation(String),
    /// Explicitly coded error: the status is passed through unchanged.
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::Http {
            status,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::DatabaseOperation(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            ApiError::DatabaseOperation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::SynchronousOperation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Http { status, .. } => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Name reported in the `type` field of the error body.
    pub fn type_name(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NotFoundError",
            ApiError::PermissionDenied(_) => "PermissionDeniedError",
            ApiError::Validation(_) => "ValidationError",
            ApiError::DatabaseOperation(sqlx::Error::RowNotFound) => "NotFoundError",
            ApiError::DatabaseOperation(_) => "DatabaseOperationError",
            ApiError::SynchronousOperation(_) => "SynchronousOperationError",
            ApiError::Http { .. } | ApiError::Internal(_) => "ApiError",
        }
    }

    /// Build the response body. Server errors hide their detail unless `debug` is set.
    pub fn to_body(&self, debug: bool) -> ErrorBody {
        let message = if self.status_code().is_server_error() && !debug {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        };
        ErrorBody {
            error: ErrorDetail {
                type_: self.type_name().to_string(),
                message,
            },
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Validation(e.to_string())
    }
}

/// Malformed bodies are validation errors; other rejections (missing content type,
/// body too large) keep their status.
impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        match e.status() {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ApiError::Validation(e.body_text()),
            status => ApiError::http(status, e.body_text()),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(e: MultipartRejection) -> Self {
        ApiError::Validation(e.body_text())
    }
}

/// Broken multipart framing is a validation error; an oversized part keeps its 413.
impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        match e.status() {
            StatusCode::PAYLOAD_TOO_LARGE => ApiError::http(StatusCode::PAYLOAD_TOO_LARGE, e.body_text()),
            _ => ApiError::Validation(e.body_text()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::Validation(e.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::SynchronousOperation(e.to_string())
    }
}

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize, Debug)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub type_: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let debug = debug_enabled();
        if status.is_server_error() {
            if debug {
                tracing::error!(error = ?self, kind = self.type_name(), "request failed");
            } else {
                tracing::error!(kind = self.type_name(), "request failed: {}", self);
            }
        } else {
            tracing::debug!(status = %status, kind = self.type_name(), "request rejected: {}", self);
        }
        (status, Json(self.to_body(debug))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_each_kind_to_status_and_type() {
        let cases = [
            (ApiError::NotFound("missing".into()), 404, "NotFoundError"),
            (ApiError::DatabaseOperation(sqlx::Error::RowNotFound), 404, "NotFoundError"),
            (ApiError::PermissionDenied("denied".into()), 403, "PermissionDeniedError"),
            (ApiError::Validation("invalid".into()), 400, "ValidationError"),
            (
                ApiError::DatabaseOperation(sqlx::Error::PoolTimedOut),
                500,
                "DatabaseOperationError",
            ),
            (
                ApiError::SynchronousOperation("sync".into()),
                500,
                "SynchronousOperationError",
            ),
            (ApiError::http(StatusCode::UNAUTHORIZED, "unauthorized"), 401, "ApiError"),
            (ApiError::Internal("crash".into()), 500, "ApiError"),
        ];
        for (err, status, type_name) in cases {
            assert_eq!(err.status_code().as_u16(), status, "{err:?}");
            assert_eq!(err.type_name(), type_name, "{err:?}");
        }
    }

    #[test]
    fn coded_error_keeps_status_and_message() {
        let err = ApiError::http(StatusCode::from_u16(499).unwrap(), "boom");
        let body = err.to_body(false);
        assert_eq!(err.status_code().as_u16(), 499);
        assert_eq!(body.error.message, "boom");
        assert_eq!(body.error.type_, "ApiError");
    }

    #[test]
    fn server_errors_hide_detail_unless_debug() {
        let err = ApiError::Internal("stack trace here".into());
        assert_eq!(err.to_body(false).error.message, GENERIC_ERROR_MESSAGE);
        assert_eq!(err.to_body(true).error.message, "stack trace here");

        let client = ApiError::Validation("title: field required".into());
        assert_eq!(client.to_body(false).error.message, "title: field required");
    }

    #[test]
    fn body_serializes_with_type_key() {
        let body = ApiError::NotFound("gone".into()).to_body(false);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"error": {"type": "NotFoundError", "message": "gone"}})
        );
    }

    #[test]
    fn join_error_maps_to_synchronous_operation() {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let err = rt.block_on(async {
            tokio::task::spawn_blocking(|| panic!("blocking hook failed"))
                .await
                .unwrap_err()
        });
        let api: ApiError = err.into();
        assert_eq!(api.type_name(), "SynchronousOperationError");
    }
}
