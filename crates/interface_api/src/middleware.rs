//! API middleware

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{info, warn};

use core_kernel::Actor;

use crate::auth::{validate_token, AuthError};
use crate::error::ApiError;
use crate::AppState;

fn bearer_token(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn resolve_actor(state: &AppState, token: &str) -> Result<Actor, AuthError> {
    validate_token(token, &state.config.jwt_secret)?.to_actor()
}

/// Authentication middleware
///
/// Validates the session token and adds the [`Actor`] to the request
/// extensions. Requests without a valid token are rejected.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&request) else {
        warn!("Missing or invalid Authorization header");
        return ApiError::Unauthorized("Sign in required".into()).into_response();
    };

    match resolve_actor(&state, token) {
        Ok(actor) => {
            request.extensions_mut().insert(actor);
            next.run(request).await
        }
        Err(e) => {
            warn!(error = %e, "Token validation failed");
            ApiError::from(e).into_response()
        }
    }
}

/// Like [`auth_middleware`] but lets anonymous requests through
///
/// Used on public routes that behave differently for signed-in users.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let actor = bearer_token(&request).and_then(|token| match resolve_actor(&state, token) {
        Ok(actor) => Some(actor),
        Err(e) => {
            warn!(error = %e, "Ignoring invalid token on public route");
            None
        }
    });
    if let Some(actor) = actor {
        request.extensions_mut().insert(actor);
    }
    next.run(request).await
}

/// Audit logging middleware
///
/// Logs every API request with the acting user
pub async fn audit_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let user_id = request
        .extensions()
        .get::<Actor>()
        .map(|a| a.user_id.to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    let start = Utc::now();

    let response = next.run(request).await;

    let duration = Utc::now() - start;
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        user = %user_id,
        status = %status.as_u16(),
        duration_ms = duration.num_milliseconds(),
        "API request"
    );

    response
}
