//! HTTP basic auth in front of the manifest endpoints.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::warn;

use super::error::ApiError;

/// Realm announced in `WWW-Authenticate` challenges.
pub const REALM: &str = "zipstream";

/// Expected basic auth credentials
#[derive(Clone)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    /// Auth is only enforced when both parts are set.
    pub fn new(username: &str, password: &str) -> Option<Self> {
        if username.is_empty() || password.is_empty() {
            return None;
        }
        Some(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Check an `Authorization` header value.
    pub fn verify(&self, authorization: &str) -> bool {
        parse_basic(authorization)
            .is_some_and(|(user, pass)| user == self.username && pass == self.password)
    }
}

/// Split a `Basic <base64(user:pass)>` header value.
fn parse_basic(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Middleware rejecting requests without the configured credentials.
pub async fn require_basic_auth(
    State(auth): State<Arc<BasicAuth>>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| auth.verify(value));

    if !authorized {
        warn!(path = %request.uri().path(), "rejected request without valid credentials");
        return ApiError::Unauthorized.into_response();
    }
    next.run(request).await
}
