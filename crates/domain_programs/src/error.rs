//! Program domain errors

use thiserror::Error;

use core_kernel::{Permission, PortError};

/// Errors that can occur in the programs domain
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("Program not found: {0}")]
    ProgramNotFound(String),

    #[error("Enrollment not found: {0}")]
    EnrollmentNotFound(String),

    #[error("Invitation not found")]
    InvitationNotFound,

    #[error("{0} is not currently accepting applications")]
    NotAcceptingApplications(String),

    /// The person already has an enrollment in the program
    #[error("Already enrolled in {0}")]
    AlreadyEnrolled(String),

    #[error("Declined enrollments cannot be edited")]
    EnrollmentReadOnly,

    #[error("You can only withdraw from accepted enrollments")]
    NotAccepted,

    #[error("You have already withdrawn from this program")]
    AlreadyWithdrawn,

    #[error("The program has already started; please contact staff")]
    ProgramStarted,

    /// A staff decision was attempted on an application that is not pending
    #[error("Application has already been decided")]
    NotPending,

    #[error("Invitation has already been {0}")]
    AlreadyResponded(String),

    #[error("Invitation has expired")]
    InvitationExpired,

    /// Accepting an invitation needs a signed-in account linked to a person
    #[error("Sign in to accept this invitation")]
    LoginRequired,

    #[error("Permission denied: requires {0}")]
    PermissionDenied(Permission),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Port(#[from] PortError),
}

impl ProgramError {
    pub fn validation(message: impl Into<String>) -> Self {
        ProgramError::Validation(message.into())
    }

    pub fn program_not_found(id: impl std::fmt::Display) -> Self {
        ProgramError::ProgramNotFound(id.to_string())
    }

    pub fn enrollment_not_found(id: impl std::fmt::Display) -> Self {
        ProgramError::EnrollmentNotFound(id.to_string())
    }
}
