//! Enrollment handlers for the enrolled person

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use core_kernel::EnrollmentId;
use domain_programs::{Enrollment, EnrollmentWithProgram};

use crate::dto::programs::{EnrollmentDetailsRequest, WithdrawRequest};
use crate::error::ApiError;
use crate::extract::{CurrentActor, ValidatedJson};
use crate::AppState;

pub async fn get_enrollment(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<EnrollmentId>,
) -> Result<Json<EnrollmentWithProgram>, ApiError> {
    let person_id = actor.person_id()?;
    Ok(Json(state.enrollments.get_for_person(person_id, id).await?))
}

/// Replaces the travel and contact logistics
pub async fn update_enrollment(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<EnrollmentId>,
    ValidatedJson(req): ValidatedJson<EnrollmentDetailsRequest>,
) -> Result<Json<Enrollment>, ApiError> {
    let person_id = actor.person_id()?;
    let enrollment = state
        .enrollments
        .update_details(person_id, id, req.into(), Utc::now())
        .await?;
    Ok(Json(enrollment))
}

pub async fn withdraw(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<EnrollmentId>,
    ValidatedJson(req): ValidatedJson<WithdrawRequest>,
) -> Result<Json<Enrollment>, ApiError> {
    let person_id = actor.person_id()?;
    let enrollment = state
        .enrollments
        .withdraw(person_id, id, req.reason.as_deref(), Utc::now())
        .await?;
    Ok(Json(enrollment))
}
