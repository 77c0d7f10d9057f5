//! Reimbursements Domain - travel expense requests
//!
//! A participant opens a draft request, lists expenses with receipts, signs
//! and submits it. Staff review, approve (possibly lowering amounts) and
//! record payment.
//!
//! # Request Lifecycle
//!
//! ```text
//! DRAFT ──submit──> SUBMITTED ──approve──> APPROVED ──mark_paid──> PAID
//!   ^                 │
//!   │          request_changes
//!   │                 v
//!   └──(edit)── CHANGES_NEEDED ──submit──> SUBMITTED
//!
//! {DRAFT, SUBMITTED, CHANGES_NEEDED, APPROVED} ──cancel──> CANCELLED
//! ```
//!
//! Totals are derived from the line items at submit and approve time.
//! Tax and payment details are frozen into snapshots on submit.

pub mod request;
pub mod line_item;
pub mod payee;
pub mod timeline;
pub mod summary;
pub mod error;
pub mod ports;
pub mod services;

pub use request::{
    ApprovalOverride, NewReimbursement, ReimbursementDetails, ReimbursementRequest, RequestStatus,
    VisaDocumentKind,
};
pub use line_item::{DocumentRef, ExpenseCategory, ExpenseLineItem, NewLineItem, Receipt};
pub use payee::{
    BankAccountType, PaymentDetails, PaymentInfoSnapshot, PaymentMethod, TaxDetails, TaxInfoSnapshot,
    TaxStatus,
};
pub use timeline::TimelineEntry;
pub use summary::{ProgramSummary, StatusSummary};
pub use error::ReimbursementError;
pub use ports::{ReimbursementPort, ReimbursementQuery};
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::MockReimbursementPort;
pub use services::ReimbursementService;
