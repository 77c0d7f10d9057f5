//! Invitation handlers
//!
//! Both routes are reachable without signing in: the token in the emailed
//! link is the credential. Accepting still needs an account, so the
//! signed-in person can be enrolled.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use domain_programs::{InvitationAction, InvitationResponse, PendingInvitation};

use crate::dto::programs::RespondToInvitationRequest;
use crate::error::ApiError;
use crate::extract::MaybeActor;
use crate::handlers::participant_for;
use crate::AppState;

pub async fn lookup(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<PendingInvitation>, ApiError> {
    Ok(Json(state.invitations.lookup(&token, Utc::now()).await?))
}

pub async fn respond(
    State(state): State<AppState>,
    MaybeActor(actor): MaybeActor,
    Path(token): Path<String>,
    Json(req): Json<RespondToInvitationRequest>,
) -> Result<Json<InvitationResponse>, ApiError> {
    let participant = match (&req.action, &actor) {
        (InvitationAction::Accept, Some(actor)) => Some(participant_for(&state, actor).await?),
        _ => None,
    };

    let response = state
        .invitations
        .respond(&token, req.action, participant.as_ref(), Utc::now())
        .await?;
    Ok(Json(response))
}
