// SPDX-License-Identifier: Apache-2.0

use crate::repository::RepositoryError;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use scorekeep_store::StoreErrorCode;
use serde_json::json;
use tracing::error;

pub(crate) const UNAUTHORIZED_MESSAGE: &str = "Unauthorized access";
pub(crate) const BASIC_REALM: &str = "Basic realm=\"Authentication Required\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ApiErrorKind {
    NotFound,
    BadRequest,
    Unauthorized,
    StoreUnavailable,
    Internal,
}

impl ApiErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::StoreUnavailable => "store_unavailable",
            Self::Internal => "internal_error",
        }
    }
}

#[must_use]
pub(crate) fn api_error_status(kind: ApiErrorKind) -> StatusCode {
    match kind {
        ApiErrorKind::NotFound => StatusCode::NOT_FOUND,
        ApiErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ApiErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ApiErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ApiErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error returned by every JSON route, rendered as `{"error": message}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound, message)
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::BadRequest, message)
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(ApiErrorKind::Unauthorized, UNAUTHORIZED_MESSAGE)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = api_error_status(self.kind);
        let mut resp = (status, Json(json!({"error": self.message}))).into_response();
        match status {
            StatusCode::SERVICE_UNAVAILABLE => {
                resp.headers_mut()
                    .insert("retry-after", HeaderValue::from_static("3"));
            }
            StatusCode::UNAUTHORIZED => {
                resp.headers_mut()
                    .insert("www-authenticate", HeaderValue::from_static(BASIC_REALM));
            }
            _ => {}
        }
        resp
    }
}

impl From<RepositoryError> for ApiError {
    fn from(e: RepositoryError) -> Self {
        let code = e.code();
        error!(error = %e, code = code.as_str(), "score store request failed");
        match code {
            StoreErrorCode::Unavailable => {
                Self::new(ApiErrorKind::StoreUnavailable, "score store unavailable")
            }
            _ => Self::new(ApiErrorKind::Internal, "internal server error"),
        }
    }
}
