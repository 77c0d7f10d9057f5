//! People domain errors

use thiserror::Error;

use core_kernel::{PortError, UserId};

/// Errors that can occur in the people domain
#[derive(Debug, Error)]
pub enum PeopleError {
    /// Person with the given ID was not found
    #[error("Person not found: {0}")]
    PersonNotFound(String),

    /// User account with the given ID was not found
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// The account has no profile linking it to a person
    #[error("User {0} is not linked to a person record")]
    ProfileNotLinked(UserId),

    #[error("Invalid ORCID iD: {0}")]
    InvalidOrcid(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    /// Another person already uses this email address
    #[error("Email address already in use: {0}")]
    DuplicateEmail(String),

    /// Another person already uses this ORCID iD
    #[error("ORCID iD already in use: {0}")]
    DuplicateOrcid(String),

    /// Storage failure
    #[error(transparent)]
    Port(#[from] PortError),
}

impl PeopleError {
    pub fn person_not_found(id: impl std::fmt::Display) -> Self {
        PeopleError::PersonNotFound(id.to_string())
    }

    pub fn user_not_found(id: impl std::fmt::Display) -> Self {
        PeopleError::UserNotFound(id.to_string())
    }
}
