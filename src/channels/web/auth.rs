//! Bearer-token auth and acting-profile extraction for the gateway.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// Header naming the profile acting on a request.
pub const PROFILE_HEADER: &str = "x-profile-id";

#[derive(Clone)]
pub struct AuthState {
    pub token: String,
}

fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Reject requests whose bearer token does not match.
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = bearer_token(request.headers())
        .is_some_and(|provided| bool::from(provided.as_bytes().ct_eq(auth.token.as_bytes())));
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "Invalid or missing auth token").into_response();
    }
    next.run(request).await
}

/// The profile named by `X-Profile-Id`, if any.
#[derive(Debug, Clone, Copy, Default)]
pub struct Actor(pub Option<Uuid>);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(PROFILE_HEADER) else {
            return Ok(Self(None));
        };
        let raw = raw
            .to_str()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid X-Profile-Id".to_string()))?;
        Uuid::parse_str(raw.trim())
            .map(|id| Self(Some(id)))
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid X-Profile-Id: {e}")))
    }
}
