//! Program listing and application handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use domain_programs::{services::DEFAULT_UPCOMING_LIMIT, Enrollment, Program};

use crate::dto::programs::EnrollmentDetailsRequest;
use crate::dto::LimitQuery;
use crate::error::ApiError;
use crate::extract::{CurrentActor, ValidatedJson};
use crate::handlers::participant_for;
use crate::AppState;

const MAX_LIST_LIMIT: u32 = 100;
const DEFAULT_OPEN_LIMIT: u32 = 20;

/// Upcoming workshops, public
pub async fn upcoming(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Program>>, ApiError> {
    let limit = query.resolve(DEFAULT_UPCOMING_LIMIT, MAX_LIST_LIMIT);
    Ok(Json(state.programs.upcoming_workshops(limit).await?))
}

/// Programs the signed-in person can still apply to
pub async fn open_programs(
    State(state): State<AppState>,
    actor: CurrentActor,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Program>>, ApiError> {
    let person_id = actor.person_id()?;
    let limit = query.resolve(DEFAULT_OPEN_LIMIT, MAX_LIST_LIMIT);
    Ok(Json(state.programs.open_programs_for(person_id, Utc::now(), limit).await?))
}

/// Applies to a program by its code
pub async fn apply(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(code): Path<i32>,
    ValidatedJson(req): ValidatedJson<EnrollmentDetailsRequest>,
) -> Result<(StatusCode, Json<Enrollment>), ApiError> {
    let participant = participant_for(&state, &actor).await?;
    let enrollment = state
        .enrollments
        .apply(&participant, code, req.into(), Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}
