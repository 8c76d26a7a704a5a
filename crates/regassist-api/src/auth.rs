//! Password login and session-token authentication.
//!
//! `POST /login` exchanges the shared password for a random session token;
//! [`require_session`] validates `Authorization: Bearer <token>` on protected
//! endpoints and attaches the caller's [`Session`] to the request.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rand::Rng;
use subtle::ConstantTimeEq;

use regassist_chat::Session;

use crate::state::AppState;

/// Generate a random 32-character hex token.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

/// Constant-time comparison of the supplied password with the configured one.
/// An empty configured password never matches.
pub fn password_matches(expected: &str, supplied: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or("Missing Authorization header")?;
    let value = value
        .to_str()
        .map_err(|_| "Invalid Authorization header encoding")?;
    value.strip_prefix("Bearer ").ok_or("Invalid bearer token")
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "unauthorized",
            "message": message
        })),
    )
        .into_response()
}

/// Middleware that resolves the bearer token to a live session.
///
/// On success the session is inserted into the request extensions as
/// `Arc<Session>`. Returns 401 if the header is missing, malformed, or the
/// session is unknown or expired.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(req.headers()) {
        Ok(token) => token.to_string(),
        Err(message) => return unauthorized(message),
    };
    let session: Arc<Session> = match state.sessions.get(&token).await {
        Some(session) => session,
        None => return unauthorized("Invalid or expired session"),
    };

    req.extensions_mut().insert(session);
    next.run(req).await
}
