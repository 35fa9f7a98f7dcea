use crate::AppState;
use crate::error::ApiError;
use axum::extract::Request;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use constant_time_eq::constant_time_eq;
use std::sync::Arc;

const BEARER_PREFIX: &str = "Bearer ";

/// Rejects requests whose `Authorization` header does not carry the
/// configured key. Without a configured key every request passes.
pub(crate) async fn require_bearer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = state.api_key() {
        let presented = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix(BEARER_PREFIX));
        if !bearer_matches(presented, expected) {
            tracing::debug!(path = %request.uri().path(), "rejecting unauthenticated request");
            return Err(ApiError::Unauthorized);
        }
    }
    Ok(next.run(request).await)
}

fn bearer_matches(presented: Option<&str>, expected: &str) -> bool {
    presented.is_some_and(|token| constant_time_eq(token.as_bytes(), expected.as_bytes()))
}
