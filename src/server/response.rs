//! JSON bodies and error mapping for the HTTP surface.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::{Error, ErrorKind};

/// Current UTC time as RFC 3339.
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[derive(Debug, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Serialize)]
pub struct OutputInfo {
    pub url: String,
    pub filename: String,
    pub dimensions: Dimensions,
    pub format: String,
    pub layout: &'static str,
}

/// Body returned by both merge endpoints on success.
#[derive(Debug, Serialize)]
pub struct MergeResponse {
    pub success: bool,
    pub message: &'static str,
    pub output: OutputInfo,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub success: bool,
    pub cleaned_outputs: usize,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: &'a str,
    detail: &'a str,
}

/// An error rendered as `{success: false, error, detail}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    detail: String,
}

impl ApiError {
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            kind: "not_found",
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "internal",
            detail: detail.into(),
        }
    }

    fn rejected(status: StatusCode, detail: String) -> Self {
        let kind = if status.is_client_error() {
            ErrorKind::InvalidInput.as_str()
        } else {
            "internal"
        };
        Self {
            status,
            kind,
            detail,
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

/// HTTP status for each error kind.
///
/// `GeometryOverflow` is decided from the input dimensions before any pixel
/// work starts, so it is reported as unprocessable input (422) rather than a
/// server fault.
#[must_use]
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ParameterOutOfRange => StatusCode::BAD_REQUEST,
        ErrorKind::InvalidInput | ErrorKind::GeometryOverflow => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::EncodeFailure | ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let kind = err.kind();
        Self {
            status: status_for(kind),
            kind: kind.as_str(),
            detail: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::rejected(err.status(), err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{} ({}): {}", self.status, self.kind, self.detail);
        } else {
            tracing::warn!("{} ({}): {}", self.status, self.kind, self.detail);
        }

        let body = ErrorBody {
            success: false,
            error: self.kind,
            detail: &self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}
