//! Reimbursement domain services
//!
//! `ReimbursementService` is the only way requests change. Every mutation
//! loads the aggregate, checks who is acting, applies one operation and
//! saves it against the version it loaded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use core_kernel::{Actor, LineItemId, Money, Permission, PersonId, ProgramId, ReceiptId, ReimbursementId, UserId};

use crate::error::ReimbursementError;
use crate::line_item::{DocumentRef, ExpenseLineItem, NewLineItem, Receipt, DEFAULT_MAX_DOCUMENT_BYTES};
use crate::ports::{ReimbursementPort, ReimbursementQuery};
use crate::request::{
    ApprovalOverride, NewReimbursement, ReimbursementDetails, ReimbursementRequest, RequestStatus,
    VisaDocumentKind,
};
use crate::summary::{ProgramSummary, StatusSummary};

/// Who may perform an operation on a loaded request
#[derive(Debug, Clone, Copy)]
enum Access {
    /// The submitting user only
    Owner,
    /// The submitting user or any staff member
    OwnerOrStaff,
    /// Staff holding the permission
    Staff(Permission),
}

fn require(actor: &Actor, permission: Permission) -> Result<(), ReimbursementError> {
    if actor.has(permission) {
        Ok(())
    } else {
        Err(ReimbursementError::PermissionDenied(permission))
    }
}

/// Application service for reimbursement requests
pub struct ReimbursementService {
    port: Arc<dyn ReimbursementPort>,
    max_document_bytes: u64,
}

impl ReimbursementService {
    pub fn new(port: Arc<dyn ReimbursementPort>) -> Self {
        Self {
            port,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }

    /// Overrides the upload size limit for receipts and visa documents
    pub fn with_max_document_bytes(mut self, max_bytes: u64) -> Self {
        self.max_document_bytes = max_bytes;
        self
    }

    pub fn max_document_bytes(&self) -> u64 {
        self.max_document_bytes
    }

    async fn load(&self, id: ReimbursementId) -> Result<ReimbursementRequest, ReimbursementError> {
        Ok(self.port.get_request(id).await?)
    }

    fn check_access(actor: &Actor, request: &ReimbursementRequest, access: Access) -> Result<(), ReimbursementError> {
        match access {
            Access::Owner | Access::OwnerOrStaff if actor.user_id == request.submitted_by => Ok(()),
            // Another user's request is reported as missing
            Access::Owner => Err(ReimbursementError::not_found(request.id)),
            Access::OwnerOrStaff if actor.is_staff || actor.is_superuser => Ok(()),
            Access::OwnerOrStaff => Err(ReimbursementError::not_found(request.id)),
            Access::Staff(permission) => require(actor, permission),
        }
    }

    /// Loads, checks access, applies `op` and saves with a version check
    async fn mutate<T, F>(
        &self,
        actor: &Actor,
        id: ReimbursementId,
        access: Access,
        action: &'static str,
        op: F,
    ) -> Result<(ReimbursementRequest, T), ReimbursementError>
    where
        F: FnOnce(&mut ReimbursementRequest) -> Result<T, ReimbursementError> + Send,
    {
        if let Access::Staff(permission) = access {
            require(actor, permission)?;
        }
        let mut request = self.load(id).await?;
        Self::check_access(actor, &request, access)?;

        let from = request.status;
        let expected_version = request.version;
        let output = op(&mut request)?;

        let saved = self
            .port
            .save_request(&request, expected_version)
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    warn!(reimbursement_id = %id, action, "Concurrent modification detected");
                }
                ReimbursementError::from(e)
            })?;

        if from != saved.status {
            info!(
                reimbursement_id = %id,
                actor = %actor.user_id,
                from = %from,
                to = %saved.status,
                action,
                "Reimbursement status changed"
            );
        } else {
            info!(reimbursement_id = %id, actor = %actor.user_id, action, "Reimbursement updated");
        }
        Ok((saved, output))
    }

    // ========================================================================
    // Submitter operations
    // ========================================================================

    /// Opens a draft request
    ///
    /// The caller is responsible for checking that the enrollment, if any,
    /// belongs to the payee.
    pub async fn create(
        &self,
        actor: &Actor,
        new: NewReimbursement,
        now: DateTime<Utc>,
    ) -> Result<ReimbursementRequest, ReimbursementError> {
        if new.submitted_by != actor.user_id {
            return Err(ReimbursementError::validation(
                "submitted_by",
                "Requests are submitted by the signed-in user",
            ));
        }
        let request = ReimbursementRequest::create(new, now)?;
        let created = self.port.create_request(&request).await?;
        info!(
            reimbursement_id = %created.id,
            person_id = %created.person_id,
            actor = %actor.user_id,
            "Reimbursement request created"
        );
        Ok(created)
    }

    /// The request, if the actor is its submitter or staff
    pub async fn get(&self, actor: &Actor, id: ReimbursementId) -> Result<ReimbursementRequest, ReimbursementError> {
        let request = self.load(id).await?;
        if !request.is_visible_to(actor) {
            return Err(ReimbursementError::not_found(id));
        }
        Ok(request)
    }

    pub async fn update_details(
        &self,
        actor: &Actor,
        id: ReimbursementId,
        details: ReimbursementDetails,
        now: DateTime<Utc>,
    ) -> Result<ReimbursementRequest, ReimbursementError> {
        let (request, _) = self
            .mutate(actor, id, Access::Owner, "update_details", |r| r.update_details(details, now))
            .await?;
        Ok(request)
    }

    pub async fn attach_visa_document(
        &self,
        actor: &Actor,
        id: ReimbursementId,
        kind: VisaDocumentKind,
        document: DocumentRef,
        now: DateTime<Utc>,
    ) -> Result<ReimbursementRequest, ReimbursementError> {
        let max_bytes = self.max_document_bytes;
        let (request, _) = self
            .mutate(actor, id, Access::Owner, "attach_visa_document", |r| {
                r.attach_visa_document(kind, document, max_bytes, now)
            })
            .await?;
        Ok(request)
    }

    pub async fn add_line_item(
        &self,
        actor: &Actor,
        id: ReimbursementId,
        item: NewLineItem,
        now: DateTime<Utc>,
    ) -> Result<(ReimbursementRequest, LineItemId), ReimbursementError> {
        self.mutate(actor, id, Access::Owner, "add_line_item", |r| r.add_line_item(item, now))
            .await
    }

    pub async fn remove_line_item(
        &self,
        actor: &Actor,
        id: ReimbursementId,
        line_item_id: LineItemId,
        now: DateTime<Utc>,
    ) -> Result<(ReimbursementRequest, ExpenseLineItem), ReimbursementError> {
        self.mutate(actor, id, Access::Owner, "remove_line_item", |r| {
            r.remove_line_item(line_item_id, now)
        })
        .await
    }

    pub async fn add_receipt(
        &self,
        actor: &Actor,
        id: ReimbursementId,
        line_item_id: LineItemId,
        document: DocumentRef,
        now: DateTime<Utc>,
    ) -> Result<(ReimbursementRequest, ReceiptId), ReimbursementError> {
        let max_bytes = self.max_document_bytes;
        self.mutate(actor, id, Access::Owner, "add_receipt", |r| {
            r.add_receipt(line_item_id, document, max_bytes, now)
        })
        .await
    }

    /// Detaches a receipt; the returned receipt's document can then be purged
    pub async fn remove_receipt(
        &self,
        actor: &Actor,
        id: ReimbursementId,
        line_item_id: LineItemId,
        receipt_id: ReceiptId,
        now: DateTime<Utc>,
    ) -> Result<(ReimbursementRequest, Receipt), ReimbursementError> {
        self.mutate(actor, id, Access::Owner, "remove_receipt", |r| {
            r.remove_receipt(line_item_id, receipt_id, now)
        })
        .await
    }

    pub async fn submit(
        &self,
        actor: &Actor,
        id: ReimbursementId,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<ReimbursementRequest, ReimbursementError> {
        let (request, _) = self
            .mutate(actor, id, Access::Owner, "submit", |r| r.submit(signature, now))
            .await?;
        Ok(request)
    }

    /// Cancels a request; the submitter or any staff member may do so
    pub async fn cancel(
        &self,
        actor: &Actor,
        id: ReimbursementId,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ReimbursementRequest, ReimbursementError> {
        let user_id = actor.user_id;
        let (request, _) = self
            .mutate(actor, id, Access::OwnerOrStaff, "cancel", |r| r.cancel(user_id, reason, now))
            .await?;
        Ok(request)
    }

    // ========================================================================
    // Staff operations
    // ========================================================================

    pub async fn request_changes(
        &self,
        actor: &Actor,
        id: ReimbursementId,
        notes: &str,
        now: DateTime<Utc>,
    ) -> Result<ReimbursementRequest, ReimbursementError> {
        let user_id = actor.user_id;
        let (request, _) = self
            .mutate(
                actor,
                id,
                Access::Staff(Permission::ReviewReimbursements),
                "request_changes",
                |r| r.request_changes(user_id, notes, now),
            )
            .await?;
        Ok(request)
    }

    pub async fn approve(
        &self,
        actor: &Actor,
        id: ReimbursementId,
        overrides: &[ApprovalOverride],
        now: DateTime<Utc>,
    ) -> Result<ReimbursementRequest, ReimbursementError> {
        let user_id = actor.user_id;
        let (request, _) = self
            .mutate(
                actor,
                id,
                Access::Staff(Permission::ApproveReimbursements),
                "approve",
                |r| r.approve(user_id, overrides, now),
            )
            .await?;
        Ok(request)
    }

    pub async fn mark_paid(
        &self,
        actor: &Actor,
        id: ReimbursementId,
        reference: Option<&str>,
        total_paid: Option<Money>,
        now: DateTime<Utc>,
    ) -> Result<ReimbursementRequest, ReimbursementError> {
        let user_id = actor.user_id;
        let (request, _) = self
            .mutate(
                actor,
                id,
                Access::Staff(Permission::MarkReimbursementsPaid),
                "mark_paid",
                |r| r.mark_paid(user_id, reference, total_paid, now),
            )
            .await?;
        Ok(request)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Requests the user submitted, newest first
    pub async fn requests_for_user(
        &self,
        user_id: UserId,
        limit: Option<u32>,
    ) -> Result<Vec<ReimbursementRequest>, ReimbursementError> {
        let mut query = ReimbursementQuery::for_user(user_id);
        query.limit = limit;
        Ok(self.port.find_requests(&query).await?)
    }

    /// Requests paying the person, newest first
    pub async fn requests_for_person(
        &self,
        person_id: PersonId,
    ) -> Result<Vec<ReimbursementRequest>, ReimbursementError> {
        Ok(self.port.find_requests(&ReimbursementQuery::for_person(person_id)).await?)
    }

    /// Submitted requests awaiting review
    pub async fn pending_review(&self, actor: &Actor) -> Result<Vec<ReimbursementRequest>, ReimbursementError> {
        require(actor, Permission::ReviewReimbursements)?;
        Ok(self
            .port
            .find_requests(&ReimbursementQuery::with_status([RequestStatus::Submitted]))
            .await?)
    }

    /// Approved requests awaiting payment
    pub async fn pending_payment(&self, actor: &Actor) -> Result<Vec<ReimbursementRequest>, ReimbursementError> {
        require(actor, Permission::MarkReimbursementsPaid)?;
        Ok(self
            .port
            .find_requests(&ReimbursementQuery::with_status([RequestStatus::Approved]))
            .await?)
    }

    /// Requests sent back for changes; staff see all, others their own
    pub async fn needs_attention(&self, actor: &Actor) -> Result<Vec<ReimbursementRequest>, ReimbursementError> {
        self.scoped(actor, [RequestStatus::ChangesNeeded]).await
    }

    /// Paid or cancelled requests; staff see all, others their own
    pub async fn completed(&self, actor: &Actor) -> Result<Vec<ReimbursementRequest>, ReimbursementError> {
        let finished = RequestStatus::ALL.into_iter().filter(RequestStatus::is_terminal);
        self.scoped(actor, finished).await
    }

    async fn scoped(
        &self,
        actor: &Actor,
        statuses: impl IntoIterator<Item = RequestStatus>,
    ) -> Result<Vec<ReimbursementRequest>, ReimbursementError> {
        let query = if actor.is_staff || actor.is_superuser {
            ReimbursementQuery::with_status(statuses)
        } else {
            ReimbursementQuery::for_user(actor.user_id).statuses(statuses)
        };
        Ok(self.port.find_requests(&query).await?)
    }

    /// Counts of the user's requests by status
    pub async fn status_summary(&self, user_id: UserId) -> Result<StatusSummary, ReimbursementError> {
        let requests = self.port.find_requests(&ReimbursementQuery::for_user(user_id)).await?;
        Ok(StatusSummary::from_requests(&requests))
    }

    /// Totals for one program, for reviewers and for finance staff
    /// exporting reimbursement data
    pub async fn program_summary(
        &self,
        actor: &Actor,
        program_id: ProgramId,
    ) -> Result<ProgramSummary, ReimbursementError> {
        if !actor.has(Permission::ExportReimbursements) {
            require(actor, Permission::ReviewReimbursements)?;
        }
        Ok(self.port.program_summary(program_id).await?)
    }
}
