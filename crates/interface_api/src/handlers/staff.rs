//! Staff handlers
//!
//! Permission checks live in the domain services; these handlers only
//! translate requests.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use core_kernel::{EnrollmentId, Money, ProgramId, ReimbursementId};
use domain_programs::{ApplicationDecision, Enrollment, NewProgram, Program, ProgramInvitation};
use domain_reimbursements::{ApprovalOverride, ProgramSummary};

use crate::dto::programs::InviteRequest;
use crate::dto::reimbursements::{
    ApproveRequest, MarkPaidRequest, ReimbursementListItem, ReimbursementResponse, RequestChangesRequest,
};
use crate::error::ApiError;
use crate::extract::{CurrentActor, ValidatedJson};
use crate::AppState;

pub async fn create_program(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(new): Json<NewProgram>,
) -> Result<(StatusCode, Json<Program>), ApiError> {
    let program = state.programs.create_program(&actor, new).await?;
    Ok((StatusCode::CREATED, Json(program)))
}

pub async fn invite(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(program_id): Path<ProgramId>,
    ValidatedJson(req): ValidatedJson<InviteRequest>,
) -> Result<(StatusCode, Json<ProgramInvitation>), ApiError> {
    let invitation = state
        .invitations
        .invite(&actor, program_id, &req.email, req.person_id, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(invitation)))
}

/// Accepts or declines a pending application
pub async fn decide_application(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<EnrollmentId>,
    Json(decision): Json<ApplicationDecision>,
) -> Result<Json<Enrollment>, ApiError> {
    let enrollment = state
        .enrollments
        .decide_application(&actor, id, decision, Utc::now())
        .await?;
    Ok(Json(enrollment))
}

pub async fn pending_review(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<ReimbursementListItem>>, ApiError> {
    let requests = state.reimbursements.pending_review(&actor).await?;
    Ok(Json(requests.iter().map(ReimbursementListItem::from).collect()))
}

pub async fn pending_payment(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<ReimbursementListItem>>, ApiError> {
    let requests = state.reimbursements.pending_payment(&actor).await?;
    Ok(Json(requests.iter().map(ReimbursementListItem::from).collect()))
}

pub async fn request_changes(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<ReimbursementId>,
    ValidatedJson(req): ValidatedJson<RequestChangesRequest>,
) -> Result<Json<ReimbursementResponse>, ApiError> {
    let request = state
        .reimbursements
        .request_changes(&actor, id, &req.notes, Utc::now())
        .await?;
    Ok(Json(request.into()))
}

pub async fn approve(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<ReimbursementId>,
    ValidatedJson(req): ValidatedJson<ApproveRequest>,
) -> Result<Json<ReimbursementResponse>, ApiError> {
    let overrides: Vec<ApprovalOverride> = req.overrides.into_iter().map(Into::into).collect();
    let request = state
        .reimbursements
        .approve(&actor, id, &overrides, Utc::now())
        .await?;
    Ok(Json(request.into()))
}

pub async fn mark_paid(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<ReimbursementId>,
    ValidatedJson(req): ValidatedJson<MarkPaidRequest>,
) -> Result<Json<ReimbursementResponse>, ApiError> {
    let total_paid = req.total_paid.map(Money::usd);
    let request = state
        .reimbursements
        .mark_paid(&actor, id, req.payment_reference.as_deref(), total_paid, Utc::now())
        .await?;
    Ok(Json(request.into()))
}

/// Totals across a program's requests
pub async fn program_reimbursement_summary(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(program_id): Path<ProgramId>,
) -> Result<Json<ProgramSummary>, ApiError> {
    Ok(Json(state.reimbursements.program_summary(&actor, program_id).await?))
}
