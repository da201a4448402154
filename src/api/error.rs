//! API-level error type and its HTTP mapping.

use std::fmt;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

/// Errors a handler can surface to the client.
///
/// The variants are deliberately coarse: the client learns the outcome
/// class and a fixed message, nothing about the cause. In particular,
/// `InvalidCredentials` is byte-identical whether the email was unknown,
/// the password was wrong, or the account has no password at all.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    InvalidCredentials,
    Unauthenticated,
    Forbidden,
    Internal,
}

impl ApiError {
    /// Log the real cause server-side and surface an opaque error.
    pub fn internal(err: impl fmt::Display) -> Self {
        error!(error = %err, "internal error");
        Self::Internal
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::BadRequest(msg) => msg,
            Self::InvalidCredentials => "Invalid email or password",
            Self::Unauthenticated => "Authentication required",
            Self::Forbidden => "Access denied",
            Self::Internal => "Internal server error",
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}
