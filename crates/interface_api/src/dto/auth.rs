//! Sign-in DTOs

use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{PersonId, UserId};
use domain_people::OrcidIdentity;

/// Verified identity posted by the ORCID proxy
#[derive(Debug, Deserialize, Validate)]
pub struct OrcidLoginRequest {
    #[validate(length(min = 1, max = 64))]
    pub orcid_id: String,
    #[validate(length(max = 254))]
    pub email: Option<String>,
    #[validate(length(max = 150))]
    pub given_name: Option<String>,
    #[validate(length(max = 150))]
    pub family_name: Option<String>,
}

impl From<OrcidLoginRequest> for OrcidIdentity {
    fn from(req: OrcidLoginRequest) -> Self {
        OrcidIdentity {
            orcid_id: req.orcid_id,
            email: req.email,
            given_name: req.given_name,
            family_name: req.family_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user_id: UserId,
    pub person_id: PersonId,
    pub is_staff: bool,
    /// The account was created by this sign-in
    pub user_created: bool,
    /// The person record was created by this sign-in
    pub person_created: bool,
}
