//! Session middleware for protected routes.

use super::SharedState;
use crate::error::{Error, Result};
use crate::session::token_from_headers;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use tracing::debug;

/// Reject requests without a valid `auth_token` cookie.
///
/// On success the verified [`Identity`](crate::session::Identity) is placed
/// in the request extensions for handlers to read. On failure the request
/// never reaches the handler.
pub async fn require_session(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = token_from_headers(request.headers())
        .ok_or_else(|| Error::Unauthorized("missing session cookie".into()))?;
    let identity = state.gate.verify(token, Utc::now())?;

    debug!(username = %identity.username, path = %request.uri().path(), "Session verified");
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
