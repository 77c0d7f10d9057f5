//! Account and profile DTOs

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{Permission, UserId};
use domain_people::{Person, PersonUpdate, UserAccount};
use domain_programs::{EnrollmentWithProgram, PendingInvitation, Program};

use crate::dto::reimbursements::ReimbursementListItem;

/// Profile edit; an empty string clears a field
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub middle_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    #[validate(length(max = 150))]
    pub preferred_name: Option<String>,
    #[validate(length(max = 254))]
    pub email: Option<String>,
    #[validate(length(max = 500))]
    pub mailing_address: Option<String>,
    #[validate(length(max = 50))]
    pub phone_number: Option<String>,
    #[validate(length(max = 64))]
    pub orcid_id: Option<String>,
    #[validate(length(max = 200))]
    pub home_page: Option<String>,
    #[validate(length(max = 50))]
    pub math_review_id: Option<String>,
    #[validate(length(max = 255))]
    pub institution: Option<String>,
    #[validate(length(max = 500))]
    pub dietary_restrictions: Option<String>,
    #[validate(length(max = 100))]
    pub gender: Option<String>,
    #[validate(length(max = 100))]
    pub ethnicity: Option<String>,
}

impl From<UpdateProfileRequest> for PersonUpdate {
    fn from(req: UpdateProfileRequest) -> Self {
        PersonUpdate {
            first_name: req.first_name,
            middle_name: req.middle_name,
            last_name: req.last_name,
            preferred_name: req.preferred_name,
            email: req.email,
            mailing_address: req.mailing_address,
            phone_number: req.phone_number,
            orcid_id: req.orcid_id,
            home_page: req.home_page,
            math_review_id: req.math_review_id,
            institution: req.institution,
            dietary_restrictions: req.dietary_restrictions,
            gender: req.gender,
            ethnicity: req.ethnicity,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub permissions: BTreeSet<Permission>,
}

impl From<UserAccount> for AccountResponse {
    fn from(user: UserAccount) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            permissions: user.permissions,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PersonResponse {
    pub display_name: String,
    pub profile_completion: u8,
    #[serde(flatten)]
    pub person: Person,
}

impl From<Person> for PersonResponse {
    fn from(person: Person) -> Self {
        Self {
            display_name: person.display_name(),
            profile_completion: person.profile_completion(),
            person,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub account: AccountResponse,
    /// Absent for accounts not linked to a person
    pub person: Option<PersonResponse>,
}

/// Everything the participant home page shows
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub person: PersonResponse,
    pub upcoming: Vec<EnrollmentWithProgram>,
    pub pending_applications: Vec<EnrollmentWithProgram>,
    pub past: Vec<EnrollmentWithProgram>,
    pub pending_invitations: Vec<PendingInvitation>,
    pub open_programs: Vec<Program>,
    pub recent_reimbursements: Vec<ReimbursementListItem>,
}
