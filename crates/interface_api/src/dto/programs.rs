//! Program, enrollment and invitation DTOs

use chrono::NaiveDate;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use core_kernel::PersonId;
use domain_programs::{EnrollmentDetails, InvitationAction};

fn check_dates(details: &EnrollmentDetailsRequest) -> Result<(), ValidationError> {
    match (details.check_in_date, details.check_out_date) {
        (Some(check_in), Some(check_out)) if check_out < check_in => {
            let mut err = ValidationError::new("date_order");
            err.message = Some("Check-out date is before check-in date".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

/// Logistics sent with an application or an edit
#[derive(Debug, Default, Deserialize, Validate)]
#[validate(schema(function = "check_dates", skip_on_field_errors = false))]
pub struct EnrollmentDetailsRequest {
    pub check_in_date: Option<NaiveDate>,
    pub check_out_date: Option<NaiveDate>,
    #[validate(length(max = 50))]
    pub phone_number: Option<String>,
    #[validate(length(max = 500))]
    pub mailing_address: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate(length(max = 100))]
    pub airport1: Option<String>,
    #[validate(length(max = 100))]
    pub airport2: Option<String>,
    #[validate(length(max = 255))]
    pub funding: Option<String>,
}

impl From<EnrollmentDetailsRequest> for EnrollmentDetails {
    fn from(req: EnrollmentDetailsRequest) -> Self {
        EnrollmentDetails {
            check_in_date: req.check_in_date,
            check_out_date: req.check_out_date,
            phone_number: req.phone_number,
            mailing_address: req.mailing_address,
            notes: req.notes,
            airport1: req.airport1,
            airport2: req.airport2,
            funding: req.funding,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct WithdrawRequest {
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RespondToInvitationRequest {
    pub action: InvitationAction,
}

#[derive(Debug, Deserialize, Validate)]
pub struct InviteRequest {
    #[validate(email)]
    pub email: String,
    /// Existing person the invitation is meant for, if known
    pub person_id: Option<PersonId>,
}
