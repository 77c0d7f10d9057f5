//! Core Kernel - Foundational types and utilities for the AIM back office
//!
//! This crate provides the building blocks shared by every domain crate:
//! - Money types with precise decimal arithmetic
//! - Strongly-typed identifiers
//! - The acting user and the staff permission model
//! - Port error and health-check abstractions for storage adapters
//! - Institute-local calendar dates

pub mod money;
pub mod identifiers;
pub mod actor;
pub mod clock;
pub mod ports;
pub mod error;

pub use money::{Money, Currency, MoneyError};
pub use identifiers::{
    PersonId, UserId, UserProfileId,
    ProgramId, EnrollmentId, InvitationId,
    ReimbursementId, LineItemId, ReceiptId,
};
pub use actor::{Actor, Permission};
pub use clock::InstituteClock;
pub use ports::{PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth};
pub use error::CoreError;
