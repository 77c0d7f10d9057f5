//! Reimbursement request aggregate and its state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use core_kernel::{
    Actor, Currency, EnrollmentId, LineItemId, Money, PersonId, ProgramId, ReceiptId,
    ReimbursementId, UserId,
};

use crate::error::ReimbursementError;
use crate::line_item::{DocumentRef, ExpenseLineItem, NewLineItem, Receipt};
use crate::payee::{filled, PaymentDetails, PaymentInfoSnapshot, TaxDetails, TaxInfoSnapshot};

/// Maximum length of a typed signature
pub const MAX_SIGNATURE_LEN: usize = 255;

/// Maximum length of a payment reference (check number, wire id)
pub const MAX_PAYMENT_REFERENCE_LEN: usize = 100;

/// Workflow states of a reimbursement request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Draft,
    Submitted,
    ChangesNeeded,
    Approved,
    Paid,
    Cancelled,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 6] = [
        RequestStatus::Draft,
        RequestStatus::Submitted,
        RequestStatus::ChangesNeeded,
        RequestStatus::Approved,
        RequestStatus::Paid,
        RequestStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Draft => "draft",
            RequestStatus::Submitted => "submitted",
            RequestStatus::ChangesNeeded => "changes_needed",
            RequestStatus::Approved => "approved",
            RequestStatus::Paid => "paid",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RequestStatus::Draft => "Draft",
            RequestStatus::Submitted => "Submitted",
            RequestStatus::ChangesNeeded => "Changes Needed",
            RequestStatus::Approved => "Approved",
            RequestStatus::Paid => "Paid",
            RequestStatus::Cancelled => "Cancelled",
        }
    }

    /// Paid and cancelled requests are finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Paid | RequestStatus::Cancelled)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = ReimbursementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ReimbursementError::validation("status", format!("Unknown status: {}", s)))
    }
}

/// Which visa document is being attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisaDocumentKind {
    PassportCopy,
    I94,
}

/// Input for a new request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReimbursement {
    /// The payee
    pub person_id: PersonId,
    /// Program attendance this is for; `None` for staff or vendor requests
    pub enrollment_id: Option<EnrollmentId>,
    pub program_id: Option<ProgramId>,
    pub submitted_by: UserId,
    pub tax: TaxDetails,
    pub payment: PaymentDetails,
    pub submitter_notes: Option<String>,
}

/// Editable fields of a draft request
///
/// Completeness is only enforced on submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReimbursementDetails {
    pub tax: TaxDetails,
    pub payment: PaymentDetails,
    pub submitter_notes: Option<String>,
}

/// Reviewer-set amount for one line item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalOverride {
    pub line_item_id: LineItemId,
    pub amount_approved: Money,
    pub reviewer_notes: Option<String>,
}

/// A request for reimbursement of travel and related expenses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReimbursementRequest {
    pub id: ReimbursementId,
    pub person_id: PersonId,
    pub enrollment_id: Option<EnrollmentId>,
    pub program_id: Option<ProgramId>,
    pub submitted_by: UserId,
    /// Only ever changed by the transition methods below
    pub status: RequestStatus,
    pub currency: Currency,

    pub tax: TaxDetails,
    pub passport_copy: Option<DocumentRef>,
    pub i94_document: Option<DocumentRef>,
    pub tax_info_snapshot: Option<TaxInfoSnapshot>,

    pub payment: PaymentDetails,
    pub payment_info_snapshot: Option<PaymentInfoSnapshot>,

    pub line_items: Vec<ExpenseLineItem>,
    pub total_requested: Money,
    pub total_approved: Option<Money>,
    pub total_paid: Option<Money>,

    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<UserId>,
    pub paid_at: Option<DateTime<Utc>>,
    pub paid_by: Option<UserId>,
    pub payment_reference: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<UserId>,
    pub cancellation_reason: Option<String>,

    pub submitter_notes: Option<String>,
    pub reviewer_notes: Option<String>,
    pub change_request_notes: Option<String>,
    pub signature: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,

    /// Version for optimistic concurrency
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReimbursementRequest {
    /// Opens a draft request after checking the payment and tax details
    pub fn create(new: NewReimbursement, now: DateTime<Utc>) -> Result<Self, ReimbursementError> {
        if new.program_id.is_some() && new.enrollment_id.is_none() {
            return Err(ReimbursementError::validation(
                "enrollment_id",
                "A program can only be set through an enrollment",
            ));
        }
        new.payment.validate_format()?;
        if let Some((field, message)) = new.payment.missing_fields().into_iter().next() {
            return Err(ReimbursementError::validation(field, message));
        }
        if new.tax.tax_status.is_visa_holder() && filled(&new.tax.citizenship_country).is_none() {
            return Err(ReimbursementError::validation(
                "citizenship_country",
                "Citizenship country is required for visa holders.",
            ));
        }

        let currency = Currency::USD;
        Ok(Self {
            id: ReimbursementId::new_v7(),
            person_id: new.person_id,
            enrollment_id: new.enrollment_id,
            program_id: new.program_id,
            submitted_by: new.submitted_by,
            status: RequestStatus::Draft,
            currency,
            tax: new.tax,
            passport_copy: None,
            i94_document: None,
            tax_info_snapshot: None,
            payment: new.payment,
            payment_info_snapshot: None,
            line_items: Vec::new(),
            total_requested: Money::zero(currency),
            total_approved: None,
            total_paid: None,
            submitted_at: None,
            reviewed_at: None,
            reviewed_by: None,
            approved_at: None,
            approved_by: None,
            paid_at: None,
            paid_by: None,
            payment_reference: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            submitter_notes: non_blank(new.submitter_notes),
            reviewer_notes: None,
            change_request_notes: None,
            signature: None,
            signed_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    // ========================================================================
    // Derived state
    // ========================================================================

    /// Whether the submitter may still edit the request
    pub fn is_editable(&self) -> bool {
        matches!(self.status, RequestStatus::Draft | RequestStatus::ChangesNeeded)
    }

    pub fn requires_visa_docs(&self) -> bool {
        self.tax.tax_status.is_visa_holder()
    }

    pub fn calculate_total_requested(&self) -> Result<Money, ReimbursementError> {
        let amounts: Vec<Money> = self.line_items.iter().map(|i| i.amount_requested).collect();
        Ok(Money::sum(self.currency, &amounts)?)
    }

    /// Sum of approved amounts; items not yet approved count as zero
    pub fn calculate_total_approved(&self) -> Result<Money, ReimbursementError> {
        let amounts: Vec<Money> = self.line_items.iter().map(|i| i.approved_or_zero()).collect();
        Ok(Money::sum(self.currency, &amounts)?)
    }

    /// The submitter and staff may see a request
    pub fn is_visible_to(&self, actor: &Actor) -> bool {
        actor.is_staff || actor.is_superuser || actor.user_id == self.submitted_by
    }

    pub fn line_item(&self, id: LineItemId) -> Option<&ExpenseLineItem> {
        self.line_items.iter().find(|i| i.id == id)
    }

    /// Every reason the request cannot be submitted yet
    pub fn readiness_problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.line_items.is_empty() {
            problems.push("At least one expense line item is required.".to_string());
        }
        for (_, message) in self.payment.missing_fields() {
            problems.push(message.to_string());
        }
        if self.requires_visa_docs() {
            if filled(&self.tax.citizenship_country).is_none() {
                problems.push("Citizenship country is required for visa holders.".to_string());
            }
            if filled(&self.tax.visa_type).is_none() {
                problems.push("Visa type is required for visa holders.".to_string());
            }
            if self.passport_copy.is_none() {
                problems.push("Passport copy is required for visa holders.".to_string());
            }
        }
        problems
    }

    // ========================================================================
    // Draft editing
    // ========================================================================

    fn ensure_editable(&self) -> Result<(), ReimbursementError> {
        if !self.is_editable() {
            return Err(ReimbursementError::NotEditable(self.status.label().to_string()));
        }
        Ok(())
    }

    pub fn update_details(
        &mut self,
        details: ReimbursementDetails,
        now: DateTime<Utc>,
    ) -> Result<(), ReimbursementError> {
        self.ensure_editable()?;
        details.payment.validate_format()?;
        self.tax = details.tax;
        self.payment = details.payment;
        self.submitter_notes = non_blank(details.submitter_notes);
        self.updated_at = now;
        Ok(())
    }

    /// Stores a passport copy or I-94 record; replaces any earlier one
    pub fn attach_visa_document(
        &mut self,
        kind: VisaDocumentKind,
        document: DocumentRef,
        max_bytes: u64,
        now: DateTime<Utc>,
    ) -> Result<(), ReimbursementError> {
        self.ensure_editable()?;
        document.validate(max_bytes)?;
        match kind {
            VisaDocumentKind::PassportCopy => self.passport_copy = Some(document),
            VisaDocumentKind::I94 => self.i94_document = Some(document),
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn add_line_item(
        &mut self,
        new: NewLineItem,
        now: DateTime<Utc>,
    ) -> Result<LineItemId, ReimbursementError> {
        self.ensure_editable()?;
        let item = ExpenseLineItem::create(new, now)?;
        let id = item.id;
        self.line_items.push(item);
        self.updated_at = now;
        Ok(id)
    }

    pub fn remove_line_item(
        &mut self,
        id: LineItemId,
        now: DateTime<Utc>,
    ) -> Result<ExpenseLineItem, ReimbursementError> {
        self.ensure_editable()?;
        let index = self
            .line_items
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| ReimbursementError::LineItemNotFound(id.to_string()))?;
        self.updated_at = now;
        Ok(self.line_items.remove(index))
    }

    pub fn add_receipt(
        &mut self,
        line_item_id: LineItemId,
        document: DocumentRef,
        max_bytes: u64,
        now: DateTime<Utc>,
    ) -> Result<ReceiptId, ReimbursementError> {
        self.ensure_editable()?;
        document.validate(max_bytes)?;
        let item = self.line_item_mut(line_item_id)?;
        let receipt = Receipt::new(document);
        let id = receipt.id;
        item.receipts.push(receipt);
        self.updated_at = now;
        Ok(id)
    }

    pub fn remove_receipt(
        &mut self,
        line_item_id: LineItemId,
        receipt_id: ReceiptId,
        now: DateTime<Utc>,
    ) -> Result<Receipt, ReimbursementError> {
        self.ensure_editable()?;
        let item = self.line_item_mut(line_item_id)?;
        let index = item
            .receipts
            .iter()
            .position(|r| r.id == receipt_id)
            .ok_or_else(|| ReimbursementError::ReceiptNotFound(receipt_id.to_string()))?;
        let receipt = item.receipts.remove(index);
        self.updated_at = now;
        Ok(receipt)
    }

    fn line_item_mut(&mut self, id: LineItemId) -> Result<&mut ExpenseLineItem, ReimbursementError> {
        self.line_items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| ReimbursementError::LineItemNotFound(id.to_string()))
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    fn can_transition_to(&self, target: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self.status, target),
            (Draft, Submitted) |
            (ChangesNeeded, Submitted) |
            (Submitted, ChangesNeeded) |
            (Submitted, Approved) |
            (Approved, Paid) |
            (Draft, Cancelled) |
            (Submitted, Cancelled) |
            (ChangesNeeded, Cancelled) |
            (Approved, Cancelled)
        )
    }

    fn ensure_transition(&self, target: RequestStatus) -> Result<(), ReimbursementError> {
        if !self.can_transition_to(target) {
            return Err(ReimbursementError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        Ok(())
    }

    /// Signs and submits the request for review
    ///
    /// All readiness problems are reported at once. On success the totals
    /// are derived from the line items and the tax and payment details are
    /// frozen.
    pub fn submit(&mut self, signature: &str, now: DateTime<Utc>) -> Result<(), ReimbursementError> {
        self.ensure_transition(RequestStatus::Submitted)?;
        let signature = signature.trim();
        if signature.is_empty() {
            return Err(ReimbursementError::validation("signature", "Signature is required."));
        }
        if signature.chars().count() > MAX_SIGNATURE_LEN {
            return Err(ReimbursementError::validation(
                "signature",
                format!("Signature must be at most {} characters.", MAX_SIGNATURE_LEN),
            ));
        }
        let problems = self.readiness_problems();
        if !problems.is_empty() {
            return Err(ReimbursementError::NotReady(problems));
        }

        let total_requested = self.calculate_total_requested()?;
        total_requested
            .validate_storage()
            .map_err(|e| ReimbursementError::validation("total_requested", e.to_string()))?;

        self.total_requested = total_requested;
        self.signature = Some(signature.to_string());
        self.signed_at = Some(now);
        self.submitted_at = Some(now);
        self.tax_info_snapshot = Some(self.tax.snapshot());
        self.payment_info_snapshot = Some(self.payment.snapshot());
        self.status = RequestStatus::Submitted;
        self.updated_at = now;
        Ok(())
    }

    /// Sends the request back to the submitter
    pub fn request_changes(
        &mut self,
        reviewer: UserId,
        notes: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ReimbursementError> {
        self.ensure_transition(RequestStatus::ChangesNeeded)?;
        let notes = notes.trim();
        if notes.is_empty() {
            return Err(ReimbursementError::validation(
                "notes",
                "Notes explaining required changes are required.",
            ));
        }
        self.reviewed_at = Some(now);
        self.reviewed_by = Some(reviewer);
        self.change_request_notes = Some(notes.to_string());
        self.status = RequestStatus::ChangesNeeded;
        self.updated_at = now;
        Ok(())
    }

    /// Approves the request; items without an override are approved in full
    pub fn approve(
        &mut self,
        approver: UserId,
        overrides: &[ApprovalOverride],
        now: DateTime<Utc>,
    ) -> Result<(), ReimbursementError> {
        self.ensure_transition(RequestStatus::Approved)?;

        let mut seen = HashSet::new();
        for o in overrides {
            let item = self
                .line_item(o.line_item_id)
                .ok_or_else(|| ReimbursementError::LineItemNotFound(o.line_item_id.to_string()))?;
            if !seen.insert(o.line_item_id) {
                return Err(ReimbursementError::validation(
                    "approved_amounts",
                    format!("Expense {} has more than one approved amount", o.line_item_id),
                ));
            }
            let amount = o.amount_approved;
            if amount.is_negative() || amount.amount() > item.amount_requested.amount() {
                return Err(ReimbursementError::validation(
                    "approved_amounts",
                    format!(
                        "Approved amount for {} must be between 0 and {}",
                        o.line_item_id, item.amount_requested
                    ),
                ));
            }
            amount
                .validate_storage()
                .map_err(|e| ReimbursementError::validation("approved_amounts", e.to_string()))?;
        }

        let approved: Vec<Money> = self
            .line_items
            .iter()
            .map(|item| {
                overrides
                    .iter()
                    .find(|o| o.line_item_id == item.id)
                    .map_or(item.amount_requested, |o| o.amount_approved)
            })
            .collect();
        let total_approved = Money::sum(self.currency, &approved)?;
        total_approved
            .validate_storage()
            .map_err(|e| ReimbursementError::validation("total_approved", e.to_string()))?;

        for (item, amount) in self.line_items.iter_mut().zip(approved) {
            item.amount_approved = Some(amount);
            if let Some(o) = overrides.iter().find(|o| o.line_item_id == item.id) {
                if let Some(notes) = non_blank(o.reviewer_notes.clone()) {
                    item.reviewer_notes = Some(notes);
                }
            }
        }

        self.total_approved = Some(total_approved);
        self.approved_at = Some(now);
        self.approved_by = Some(approver);
        self.reviewed_at = Some(now);
        self.reviewed_by = Some(approver);
        self.status = RequestStatus::Approved;
        self.updated_at = now;
        Ok(())
    }

    /// Records payment; the amount paid defaults to the approved total
    pub fn mark_paid(
        &mut self,
        payer: UserId,
        reference: Option<&str>,
        total_paid: Option<Money>,
        now: DateTime<Utc>,
    ) -> Result<(), ReimbursementError> {
        self.ensure_transition(RequestStatus::Paid)?;
        let reference = reference.map(str::trim).filter(|r| !r.is_empty());
        if reference.map_or(false, |r| r.chars().count() > MAX_PAYMENT_REFERENCE_LEN) {
            return Err(ReimbursementError::validation(
                "payment_reference",
                format!("Payment reference must be at most {} characters.", MAX_PAYMENT_REFERENCE_LEN),
            ));
        }
        let paid = match total_paid {
            Some(amount) => {
                if amount.is_negative() {
                    return Err(ReimbursementError::validation(
                        "total_paid",
                        "Amount paid must not be negative",
                    ));
                }
                amount
                    .validate_storage()
                    .map_err(|e| ReimbursementError::validation("total_paid", e.to_string()))?;
                amount
            }
            None => match self.total_approved {
                Some(total) => total,
                None => self.calculate_total_approved()?,
            },
        };

        self.total_paid = Some(paid);
        self.payment_reference = reference.map(str::to_string);
        self.paid_at = Some(now);
        self.paid_by = Some(payer);
        self.status = RequestStatus::Paid;
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(
        &mut self,
        actor: UserId,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), ReimbursementError> {
        match self.status {
            RequestStatus::Paid => return Err(ReimbursementError::CannotCancelPaid),
            RequestStatus::Cancelled => return Err(ReimbursementError::AlreadyCancelled),
            _ => self.ensure_transition(RequestStatus::Cancelled)?,
        }
        self.cancelled_at = Some(now);
        self.cancelled_by = Some(actor);
        self.cancellation_reason = reason.map(str::trim).filter(|r| !r.is_empty()).map(str::to_string);
        self.status = RequestStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
