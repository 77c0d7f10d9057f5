//! Errors raised while assembling the system from its configuration

use thiserror::Error;

/// Core error type for the kernel
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A secret is unset or still holds a well-known placeholder
    #[error("{name} must be set to a private value")]
    InsecureSecret { name: String },
}

impl CoreError {
    pub fn configuration(message: impl Into<String>) -> Self {
        CoreError::Configuration(message.into())
    }

    pub fn insecure_secret(name: impl Into<String>) -> Self {
        CoreError::InsecureSecret { name: name.into() }
    }
}
