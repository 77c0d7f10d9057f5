//! People Domain
//!
//! This crate owns the canonical identity of everyone the institute deals
//! with and the accounts they sign in with:
//!
//! - **Person**: the canonical identity record (name, email, ORCID, contact
//!   details). Email and ORCID are unique per person.
//! - **UserAccount**: a login. Accounts are created and linked through ORCID
//!   sign-in.
//! - **UserProfile**: the one-per-account link between a login and a person.
//!
//! The ORCID OAuth handshake itself happens upstream; this crate receives the
//! verified [`OrcidIdentity`] and resolves it to an account, a person and a
//! profile via [`PeopleService::link_orcid_login`].

pub mod person;
pub mod account;
pub mod validation;
pub mod error;
pub mod ports;
pub mod services;

pub use person::{Person, PersonUpdate};
pub use account::{UserAccount, UserProfile, OrcidIdentity};
pub use validation::{validate_orcid, validate_email, orcid_check_digit};
pub use error::PeopleError;
pub use ports::{PeoplePort, LoginLink};
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::MockPeoplePort;
pub use services::PeopleService;
