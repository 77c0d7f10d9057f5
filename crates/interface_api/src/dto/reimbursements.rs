//! Reimbursement DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{EnrollmentId, LineItemId, Money, ProgramId, ReceiptId, ReimbursementId};
use domain_reimbursements::{
    ApprovalOverride, BankAccountType, DocumentRef, ExpenseCategory, NewLineItem, PaymentDetails,
    PaymentMethod, ReimbursementDetails, ReimbursementRequest, RequestStatus, TaxDetails, TaxStatus,
    TimelineEntry, VisaDocumentKind,
};

/// Tax and payment details as entered on the request form
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PayeeDetailsRequest {
    pub tax_status: TaxStatus,
    #[validate(length(max = 100))]
    pub citizenship_country: Option<String>,
    #[validate(length(max = 50))]
    pub visa_type: Option<String>,
    #[validate(length(max = 50))]
    pub passport_number: Option<String>,
    pub us_entry_date: Option<NaiveDate>,

    pub payment_method: PaymentMethod,
    #[validate(length(max = 500))]
    pub payment_address: Option<String>,
    #[validate(length(max = 255))]
    pub bank_name: Option<String>,
    #[validate(length(max = 9))]
    pub bank_routing_number: Option<String>,
    #[validate(length(max = 17))]
    pub bank_account_number: Option<String>,
    pub bank_account_type: Option<BankAccountType>,

    #[validate(length(max = 2000))]
    pub submitter_notes: Option<String>,
}

impl PayeeDetailsRequest {
    pub fn tax(&self) -> TaxDetails {
        TaxDetails {
            tax_status: self.tax_status,
            citizenship_country: self.citizenship_country.clone(),
            visa_type: self.visa_type.clone(),
            passport_number: self.passport_number.clone(),
            us_entry_date: self.us_entry_date,
        }
    }

    pub fn payment(&self) -> PaymentDetails {
        PaymentDetails {
            payment_method: self.payment_method,
            payment_address: self.payment_address.clone(),
            bank_name: self.bank_name.clone(),
            bank_routing_number: self.bank_routing_number.clone(),
            bank_account_number: self.bank_account_number.clone(),
            bank_account_type: self.bank_account_type,
        }
    }
}

impl From<PayeeDetailsRequest> for ReimbursementDetails {
    fn from(req: PayeeDetailsRequest) -> Self {
        ReimbursementDetails {
            tax: req.tax(),
            payment: req.payment(),
            submitter_notes: req.submitter_notes,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReimbursementRequest {
    /// Enrollment the travel was for; sets the program
    pub enrollment_id: Option<EnrollmentId>,
    #[serde(flatten)]
    #[validate(nested)]
    pub details: PayeeDetailsRequest,
}

/// Reference to a file already placed in document storage
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DocumentRequest {
    #[validate(length(min = 1, max = 500))]
    pub storage_key: String,
    #[validate(length(min = 1, max = 255))]
    pub original_filename: String,
    pub file_size: u64,
}

impl DocumentRequest {
    pub fn into_document(self, now: DateTime<Utc>) -> DocumentRef {
        DocumentRef::new(self.storage_key, self.original_filename, self.file_size, now)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct VisaDocumentRequest {
    pub kind: VisaDocumentKind,
    #[validate(nested)]
    pub document: DocumentRequest,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LineItemRequest {
    pub category: ExpenseCategory,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    pub date_incurred: NaiveDate,
    /// Amount in US dollars
    pub amount: Decimal,
}

impl From<LineItemRequest> for NewLineItem {
    fn from(req: LineItemRequest) -> Self {
        NewLineItem {
            category: req.category,
            description: req.description,
            date_incurred: req.date_incurred,
            amount_requested: Money::usd(req.amount),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitRequest {
    /// Typed full name
    #[validate(length(min = 1, max = 255))]
    pub signature: String,
    /// Confirms the expenses are accurate and were incurred for the program
    #[serde(default)]
    pub confirm_accurate: bool,
    /// Confirms the reimbursement policy was read
    #[serde(default)]
    pub confirm_policy: bool,
}

impl SubmitRequest {
    /// Missing confirmations, as messages
    pub fn missing_confirmations(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if !self.confirm_accurate {
            missing.push("confirm_accurate: Please confirm the expenses are accurate".to_string());
        }
        if !self.confirm_policy {
            missing.push("confirm_policy: Please confirm you have read the reimbursement policy".to_string());
        }
        missing
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CancelRequest {
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RequestChangesRequest {
    #[validate(length(min = 1, max = 2000))]
    pub notes: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ApprovalOverrideRequest {
    pub line_item_id: LineItemId,
    pub amount_approved: Decimal,
    #[validate(length(max = 2000))]
    pub reviewer_notes: Option<String>,
}

impl From<ApprovalOverrideRequest> for ApprovalOverride {
    fn from(req: ApprovalOverrideRequest) -> Self {
        ApprovalOverride {
            line_item_id: req.line_item_id,
            amount_approved: Money::usd(req.amount_approved),
            reviewer_notes: req.reviewer_notes,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ApproveRequest {
    /// Line items approved for less than requested; others are approved in full
    #[serde(default)]
    #[validate(nested)]
    pub overrides: Vec<ApprovalOverrideRequest>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct MarkPaidRequest {
    #[validate(length(max = 100))]
    pub payment_reference: Option<String>,
    /// Defaults to the approved total
    pub total_paid: Option<Decimal>,
}

fn mask_account_number(number: &str) -> String {
    let digits: Vec<char> = number.chars().collect();
    let visible = digits.len().min(4);
    let last: String = digits[digits.len() - visible..].iter().collect();
    format!("****{}", last)
}

/// A request with its timeline
///
/// The bank account number is masked to its last four digits.
#[derive(Debug, Serialize)]
pub struct ReimbursementResponse {
    #[serde(flatten)]
    pub request: ReimbursementRequest,
    pub is_editable: bool,
    pub timeline: Vec<TimelineEntry>,
}

impl From<ReimbursementRequest> for ReimbursementResponse {
    fn from(mut request: ReimbursementRequest) -> Self {
        request.payment.bank_account_number = request
            .payment
            .bank_account_number
            .as_deref()
            .map(mask_account_number);
        Self {
            is_editable: request.is_editable(),
            timeline: request.timeline(),
            request,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LineItemAddedResponse {
    pub line_item_id: LineItemId,
    pub request: ReimbursementResponse,
}

#[derive(Debug, Serialize)]
pub struct ReceiptAddedResponse {
    pub receipt_id: ReceiptId,
    pub request: ReimbursementResponse,
}

/// One row of a request list
#[derive(Debug, Serialize)]
pub struct ReimbursementListItem {
    pub id: ReimbursementId,
    pub status: RequestStatus,
    pub status_label: &'static str,
    pub program_id: Option<ProgramId>,
    pub enrollment_id: Option<EnrollmentId>,
    pub line_item_count: usize,
    pub total_requested: Money,
    pub total_approved: Option<Money>,
    pub total_paid: Option<Money>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&ReimbursementRequest> for ReimbursementListItem {
    fn from(request: &ReimbursementRequest) -> Self {
        Self {
            id: request.id,
            status: request.status,
            status_label: request.status.label(),
            program_id: request.program_id,
            enrollment_id: request.enrollment_id,
            line_item_count: request.line_items.len(),
            total_requested: request.total_requested,
            total_approved: request.total_approved,
            total_paid: request.total_paid,
            submitted_at: request.submitted_at,
            created_at: request.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_account_number() {
        assert_eq!(mask_account_number("000123456789"), "****6789");
        assert_eq!(mask_account_number("12"), "****12");
    }

    #[test]
    fn test_missing_confirmations() {
        let req = SubmitRequest {
            signature: "Ada Lovelace".into(),
            confirm_accurate: true,
            confirm_policy: false,
        };
        let missing = req.missing_confirmations();
        assert_eq!(missing.len(), 1);
        assert!(missing[0].starts_with("confirm_policy"));
    }
}
