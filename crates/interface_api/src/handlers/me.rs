//! Account, profile and dashboard handlers

use axum::{extract::State, Json};
use chrono::Utc;

use domain_people::PeopleError;

use crate::dto::people::{AccountResponse, DashboardResponse, MeResponse, PersonResponse, UpdateProfileRequest};
use crate::dto::reimbursements::ReimbursementListItem;
use crate::error::ApiError;
use crate::extract::{CurrentActor, ValidatedJson};
use crate::AppState;

/// Open programs shown on the dashboard
const DASHBOARD_OPEN_PROGRAMS: u32 = 5;
/// Reimbursement requests shown on the dashboard
const DASHBOARD_RECENT_REIMBURSEMENTS: u32 = 5;

/// Current account and its person
pub async fn get_me(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<MeResponse>, ApiError> {
    let user = state.people.get_user(actor.user_id).await?;
    let person = match state.people.person_for_user(actor.user_id).await {
        Ok(person) => Some(PersonResponse::from(person)),
        Err(PeopleError::ProfileNotLinked(_)) => None,
        Err(e) => return Err(e.into()),
    };

    Ok(Json(MeResponse {
        account: AccountResponse::from(user),
        person,
    }))
}

/// Edits the signed-in person's profile
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<PersonResponse>, ApiError> {
    let person = state.people.update_profile(actor.user_id, req.into()).await?;
    Ok(Json(person.into()))
}

/// Participant home page
pub async fn dashboard(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<DashboardResponse>, ApiError> {
    let now = Utc::now();
    let person = state.people.person_for_user(actor.user_id).await?;

    let overview = state.enrollments.overview(person.id, now).await?;
    let pending_invitations = state
        .invitations
        .pending_for(person.id, person.email.as_deref(), now)
        .await?;
    let open_programs = state
        .programs
        .open_programs_for(person.id, now, DASHBOARD_OPEN_PROGRAMS)
        .await?;
    let recent = state
        .reimbursements
        .requests_for_user(actor.user_id, Some(DASHBOARD_RECENT_REIMBURSEMENTS))
        .await?;

    Ok(Json(DashboardResponse {
        person: person.into(),
        upcoming: overview.upcoming,
        pending_applications: overview.pending_applications,
        past: overview.past,
        pending_invitations,
        open_programs,
        recent_reimbursements: recent.iter().map(ReimbursementListItem::from).collect(),
    }))
}
