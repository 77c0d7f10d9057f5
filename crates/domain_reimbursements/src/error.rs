//! Reimbursement domain errors

use thiserror::Error;

use core_kernel::{MoneyError, Permission, PortError};

/// Errors that can occur in the reimbursements domain
#[derive(Debug, Error)]
pub enum ReimbursementError {
    #[error("Reimbursement request not found: {0}")]
    NotFound(String),

    #[error("Expense not found: {0}")]
    LineItemNotFound(String),

    #[error("Receipt not found: {0}")]
    ReceiptNotFound(String),

    /// Invalid status transition attempted
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        from: String,
        to: String,
    },

    /// The request is past the draft/changes-needed stage
    #[error("Request cannot be edited once it is {0}")]
    NotEditable(String),

    /// Everything that blocks a submission, reported together
    #[error("Request is not ready for submission: {}", .0.join("; "))]
    NotReady(Vec<String>),

    #[error("Request is already cancelled")]
    AlreadyCancelled,

    #[error("Cannot cancel a paid request")]
    CannotCancelPaid,

    #[error("Permission denied: requires {0}")]
    PermissionDenied(Permission),

    #[error("Validation error on {field}: {message}")]
    Validation {
        field: String,
        message: String,
    },

    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    /// Someone else saved the request first
    #[error("Request was modified concurrently; reload and try again")]
    StaleVersion,

    #[error(transparent)]
    Port(PortError),
}

impl ReimbursementError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ReimbursementError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(id: impl std::fmt::Display) -> Self {
        ReimbursementError::NotFound(id.to_string())
    }
}

impl From<PortError> for ReimbursementError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { id, .. } => ReimbursementError::NotFound(id),
            PortError::Conflict { .. } => ReimbursementError::StaleVersion,
            other => ReimbursementError::Port(other),
        }
    }
}
