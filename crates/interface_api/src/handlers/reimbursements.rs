//! Reimbursement handlers for the submitter

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::warn;

use core_kernel::{LineItemId, ReceiptId, ReimbursementId};
use domain_programs::EnrollmentStatus;
use domain_reimbursements::{NewReimbursement, StatusSummary};

use crate::dto::reimbursements::{
    CancelRequest, CreateReimbursementRequest, DocumentRequest, LineItemAddedResponse, LineItemRequest,
    PayeeDetailsRequest, ReceiptAddedResponse, ReimbursementListItem, ReimbursementResponse, SubmitRequest,
    VisaDocumentRequest,
};
use crate::dto::LimitQuery;
use crate::error::ApiError;
use crate::extract::{CurrentActor, ValidatedJson};
use crate::AppState;

/// The signed-in user's requests, newest first
pub async fn list_requests(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<ReimbursementListItem>>, ApiError> {
    let requests = state
        .reimbursements
        .requests_for_user(actor.user_id, query.limit)
        .await?;
    Ok(Json(requests.iter().map(ReimbursementListItem::from).collect()))
}

/// Opens a draft request, optionally tied to one of the user's enrollments
pub async fn create_request(
    State(state): State<AppState>,
    actor: CurrentActor,
    ValidatedJson(req): ValidatedJson<CreateReimbursementRequest>,
) -> Result<(StatusCode, Json<ReimbursementResponse>), ApiError> {
    let person_id = actor.person_id()?;

    let program_id = match req.enrollment_id {
        Some(enrollment_id) => {
            let found = state.enrollments.get_for_person(person_id, enrollment_id).await?;
            if found.enrollment.status() != EnrollmentStatus::Accepted {
                warn!(enrollment_id = %enrollment_id, "Reimbursement requested for unaccepted enrollment");
                return Err(ApiError::validation_details(
                    "Reimbursements can only be requested for accepted enrollments",
                    vec!["enrollment_id: enrollment is not accepted".to_string()],
                ));
            }
            Some(found.program.id)
        }
        None => None,
    };

    let details = req.details;
    let new = NewReimbursement {
        person_id,
        enrollment_id: req.enrollment_id,
        program_id,
        submitted_by: actor.0.user_id,
        tax: details.tax(),
        payment: details.payment(),
        submitter_notes: details.submitter_notes,
    };
    let request = state.reimbursements.create(&actor.0, new, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(request.into())))
}

/// Counts of the signed-in user's requests by status
pub async fn status_summary(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<StatusSummary>, ApiError> {
    Ok(Json(state.reimbursements.status_summary(actor.user_id).await?))
}

pub async fn get_request(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<ReimbursementId>,
) -> Result<Json<ReimbursementResponse>, ApiError> {
    Ok(Json(state.reimbursements.get(&actor, id).await?.into()))
}

/// Replaces the tax and payment details of an editable request
pub async fn update_request(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<ReimbursementId>,
    ValidatedJson(req): ValidatedJson<PayeeDetailsRequest>,
) -> Result<Json<ReimbursementResponse>, ApiError> {
    let request = state
        .reimbursements
        .update_details(&actor, id, req.into(), Utc::now())
        .await?;
    Ok(Json(request.into()))
}

pub async fn attach_visa_document(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<ReimbursementId>,
    ValidatedJson(req): ValidatedJson<VisaDocumentRequest>,
) -> Result<Json<ReimbursementResponse>, ApiError> {
    let now = Utc::now();
    let request = state
        .reimbursements
        .attach_visa_document(&actor, id, req.kind, req.document.into_document(now), now)
        .await?;
    Ok(Json(request.into()))
}

pub async fn add_expense(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<ReimbursementId>,
    ValidatedJson(req): ValidatedJson<LineItemRequest>,
) -> Result<(StatusCode, Json<LineItemAddedResponse>), ApiError> {
    let (request, line_item_id) = state
        .reimbursements
        .add_line_item(&actor, id, req.into(), Utc::now())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(LineItemAddedResponse {
            line_item_id,
            request: request.into(),
        }),
    ))
}

pub async fn remove_expense(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path((id, expense_id)): Path<(ReimbursementId, LineItemId)>,
) -> Result<Json<ReimbursementResponse>, ApiError> {
    let (request, _removed) = state
        .reimbursements
        .remove_line_item(&actor, id, expense_id, Utc::now())
        .await?;
    Ok(Json(request.into()))
}

pub async fn add_receipt(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path((id, expense_id)): Path<(ReimbursementId, LineItemId)>,
    ValidatedJson(req): ValidatedJson<DocumentRequest>,
) -> Result<(StatusCode, Json<ReceiptAddedResponse>), ApiError> {
    let now = Utc::now();
    let (request, receipt_id) = state
        .reimbursements
        .add_receipt(&actor, id, expense_id, req.into_document(now), now)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ReceiptAddedResponse {
            receipt_id,
            request: request.into(),
        }),
    ))
}

pub async fn remove_receipt(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path((id, expense_id, receipt_id)): Path<(ReimbursementId, LineItemId, ReceiptId)>,
) -> Result<Json<ReimbursementResponse>, ApiError> {
    let (request, _removed) = state
        .reimbursements
        .remove_receipt(&actor, id, expense_id, receipt_id, Utc::now())
        .await?;
    Ok(Json(request.into()))
}

/// Signs and submits the request for review
///
/// Both confirmations must be given; missing ones are reported together.
pub async fn submit(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<ReimbursementId>,
    ValidatedJson(req): ValidatedJson<SubmitRequest>,
) -> Result<Json<ReimbursementResponse>, ApiError> {
    let missing = req.missing_confirmations();
    if !missing.is_empty() {
        return Err(ApiError::validation_details("Confirmation required", missing));
    }

    let request = state
        .reimbursements
        .submit(&actor, id, &req.signature, Utc::now())
        .await?;
    Ok(Json(request.into()))
}

pub async fn cancel(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<ReimbursementId>,
    ValidatedJson(req): ValidatedJson<CancelRequest>,
) -> Result<Json<ReimbursementResponse>, ApiError> {
    let request = state
        .reimbursements
        .cancel(&actor, id, req.reason.as_deref(), Utc::now())
        .await?;
    Ok(Json(request.into()))
}
