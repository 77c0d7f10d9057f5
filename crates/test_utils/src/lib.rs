//! Test Utilities Crate
//!
//! Shared test infrastructure, fixtures, and helpers for the AIM back
//! office test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built test data for common entities
//! - `builders`: Builder patterns for test data construction
//! - `services`: Domain services over in-memory ports
//! - `database`: PostgreSQL container management
//! - `assertions`: Custom assertion helpers for domain types
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod services;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use services::TestServices;
pub use database::*;
pub use assertions::*;
pub use generators::*;
