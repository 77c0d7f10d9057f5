//! API error handling
//!
//! Domain errors are translated here so handlers can use `?` throughout.
//! Missing or foreign records are 404, permission problems 403, state
//! conflicts 409 and rule violations 422.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use core_kernel::PortError;
use domain_people::PeopleError;
use domain_programs::ProgramError;
use domain_reimbursements::ReimbursementError;

use crate::auth::AuthError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Vec<String>,
    },

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn validation_details(message: impl Into<String>, details: Vec<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::Validation { message, details } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                message,
                (!details.is_empty()).then_some(details),
            ),
            ApiError::Unavailable(msg) => {
                error!(error = %msg, "Backing service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "unavailable",
                    "Service temporarily unavailable".to_string(),
                    None,
                )
            }
            ApiError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { entity_type, id } => ApiError::NotFound(format!("{} {}", entity_type, id)),
            PortError::Validation { message, field } => match field {
                Some(field) => ApiError::validation_details(message.clone(), vec![format!("{}: {}", field, message)]),
                None => ApiError::validation(message),
            },
            PortError::Conflict { message } => ApiError::Conflict(message),
            err @ PortError::Connection { .. } => ApiError::Unavailable(err.to_string()),
            err @ PortError::Internal { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

impl From<PeopleError> for ApiError {
    fn from(err: PeopleError) -> Self {
        match err {
            PeopleError::PersonNotFound(_) | PeopleError::UserNotFound(_) => ApiError::NotFound(err.to_string()),
            PeopleError::ProfileNotLinked(_) => ApiError::Forbidden(err.to_string()),
            PeopleError::InvalidOrcid(_) | PeopleError::InvalidEmail(_) => ApiError::validation(err.to_string()),
            PeopleError::DuplicateEmail(_) | PeopleError::DuplicateOrcid(_) => ApiError::Conflict(err.to_string()),
            PeopleError::Port(port) => port.into(),
        }
    }
}

impl From<ProgramError> for ApiError {
    fn from(err: ProgramError) -> Self {
        match err {
            ProgramError::ProgramNotFound(_)
            | ProgramError::EnrollmentNotFound(_)
            | ProgramError::InvitationNotFound => ApiError::NotFound(err.to_string()),
            ProgramError::AlreadyEnrolled(_)
            | ProgramError::AlreadyWithdrawn
            | ProgramError::NotPending
            | ProgramError::AlreadyResponded(_) => ApiError::Conflict(err.to_string()),
            ProgramError::NotAcceptingApplications(_)
            | ProgramError::EnrollmentReadOnly
            | ProgramError::NotAccepted
            | ProgramError::ProgramStarted
            | ProgramError::InvitationExpired
            | ProgramError::Validation(_) => ApiError::validation(err.to_string()),
            ProgramError::LoginRequired => ApiError::Unauthorized(err.to_string()),
            ProgramError::PermissionDenied(_) => ApiError::Forbidden(err.to_string()),
            ProgramError::Port(port) => port.into(),
        }
    }
}

impl From<ReimbursementError> for ApiError {
    fn from(err: ReimbursementError) -> Self {
        match err {
            ReimbursementError::NotFound(_)
            | ReimbursementError::LineItemNotFound(_)
            | ReimbursementError::ReceiptNotFound(_) => ApiError::NotFound(err.to_string()),
            ReimbursementError::InvalidStatusTransition { .. }
            | ReimbursementError::NotEditable(_)
            | ReimbursementError::AlreadyCancelled
            | ReimbursementError::CannotCancelPaid
            | ReimbursementError::StaleVersion => ApiError::Conflict(err.to_string()),
            ReimbursementError::NotReady(problems) => {
                ApiError::validation_details("Request is not ready for submission", problems)
            }
            ReimbursementError::Validation { field, message } => {
                ApiError::validation_details(message.clone(), vec![format!("{}: {}", field, message)])
            }
            ReimbursementError::Money(_) => ApiError::validation(err.to_string()),
            ReimbursementError::PermissionDenied(_) => ApiError::Forbidden(err.to_string()),
            ReimbursementError::Port(port) => port.into(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => format!("{}: {}", field, message),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        details.sort();
        ApiError::validation_details("Request body failed validation", details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{Permission, UserId};

    fn status(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_people_error_statuses() {
        assert_eq!(status(PeopleError::person_not_found("x")), StatusCode::NOT_FOUND);
        assert_eq!(status(PeopleError::ProfileNotLinked(UserId::new())), StatusCode::FORBIDDEN);
        assert_eq!(status(PeopleError::DuplicateEmail("a@b.c".into())), StatusCode::CONFLICT);
        assert_eq!(status(PeopleError::InvalidOrcid("x".into())), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_program_error_statuses() {
        assert_eq!(status(ProgramError::InvitationNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status(ProgramError::AlreadyEnrolled("W1".into())), StatusCode::CONFLICT);
        assert_eq!(status(ProgramError::ProgramStarted), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status(ProgramError::LoginRequired), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status(ProgramError::PermissionDenied(Permission::ManagePrograms)),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_reimbursement_error_statuses() {
        assert_eq!(status(ReimbursementError::StaleVersion), StatusCode::CONFLICT);
        assert_eq!(status(ReimbursementError::NotReady(vec!["x".into()])), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            status(ReimbursementError::PermissionDenied(Permission::ApproveReimbursements)),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_port_error_statuses() {
        assert_eq!(status(PortError::connection("down")), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status(PortError::internal("boom")), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status(PortError::conflict("taken")), StatusCode::CONFLICT);
    }

    #[test]
    fn test_not_ready_carries_details() {
        let err = ApiError::from(ReimbursementError::NotReady(vec!["Add at least one expense".into()]));
        match err {
            ApiError::Validation { details, .. } => assert_eq!(details, vec!["Add at least one expense"]),
            other => panic!("unexpected {:?}", other),
        }
    }
}
