//! Error responses sent before an archive starts streaming.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use super::auth::REALM;

/// Request failures reported with a status code.
///
/// Once an archive has started streaming its status line is gone; later
/// failures abort the connection instead of producing one of these.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The body was missing or not a manifest.
    #[error("invalid body: {0}")]
    InvalidBody(String),

    /// No entry survived validation.
    #[error("no valid entries")]
    InvalidEntries,

    /// An object store client could not be built from the manifest.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Unknown or expired link id.
    #[error("link not found")]
    LinkNotFound,

    /// Basic auth is enabled and the request did not pass it.
    #[error("unauthorized")]
    Unauthorized,
}

impl ApiError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidBody(_) | Self::InvalidEntries | Self::InvalidCredentials(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::LinkNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Generic messages only; details stay in the logs.
        let status = self.status_code();
        let message = match &self {
            Self::InvalidBody(_) => "invalid body",
            Self::InvalidEntries => "invalid entries",
            Self::InvalidCredentials(_) => "invalid credentials",
            Self::LinkNotFound => "link not found",
            Self::Unauthorized => {
                let challenge = format!("Basic realm=\"{REALM}\"");
                let mut response = (status, "Unauthorized\n").into_response();
                if let Ok(value) = HeaderValue::from_str(&challenge) {
                    response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
                }
                return response;
            }
        };

        (status, Json(json!({ "status": "error", "error": message }))).into_response()
    }
}
