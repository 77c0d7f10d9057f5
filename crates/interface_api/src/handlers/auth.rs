//! Sign-in handler

use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use tracing::{info, warn};

use crate::auth::{create_token, verify_proxy_secret};
use crate::dto::auth::{OrcidLoginRequest, SessionResponse};
use crate::error::ApiError;
use crate::extract::ValidatedJson;
use crate::AppState;

/// Header carrying the identity proxy's shared secret
pub const PROXY_SECRET_HEADER: &str = "x-identity-proxy-secret";

/// Completes an ORCID sign-in relayed by the identity proxy
///
/// Creates or links the account, person and profile, then issues a
/// session token.
pub async fn orcid_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<OrcidLoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let presented = headers.get(PROXY_SECRET_HEADER).and_then(|v| v.to_str().ok());
    if let Err(e) = verify_proxy_secret(presented, &state.config.identity_proxy_secret) {
        warn!("Rejected sign-in without valid proxy credentials");
        return Err(e.into());
    }

    let link = state.people.link_orcid_login(req.into(), Utc::now()).await?;
    if !link.user.is_active {
        warn!(user_id = %link.user.id, "Sign-in attempt for inactive account");
        return Err(ApiError::Forbidden("Account is disabled".into()));
    }

    let actor = link.user.actor(Some(link.person.id));
    let expires_in = state.config.jwt_expiration_secs;
    let token = create_token(&actor, &state.config.jwt_secret, expires_in)?;

    info!(
        user_id = %link.user.id,
        person_id = %link.person.id,
        user_created = link.user_created,
        person_created = link.person_created,
        "ORCID sign-in"
    );

    Ok(Json(SessionResponse {
        token,
        token_type: "Bearer",
        expires_in,
        user_id: link.user.id,
        person_id: link.person.id,
        is_staff: actor.is_staff,
        user_created: link.user_created,
        person_created: link.person_created,
    }))
}
