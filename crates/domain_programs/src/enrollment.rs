//! Enrollment entity and lifecycle

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{EnrollmentId, PersonId, ProgramId};
use crate::error::ProgramError;
use crate::program::Program;

/// How the enrollment came about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentSource {
    Invitation,
    Application,
    Staff,
}

impl EnrollmentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentSource::Invitation => "invitation",
            EnrollmentSource::Application => "application",
            EnrollmentSource::Staff => "staff",
        }
    }
}

/// Derived participation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    /// Applied, no decision yet
    Pending,
    Accepted,
    /// Declined by staff or withdrawn by the participant
    Declined,
}

/// The person taking part, with the fields frozen onto an enrollment
///
/// Enrollment keeps its own copy of the name and contact fields so the
/// record reads the same even if the person's profile changes later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub person_id: PersonId,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub orcid_id: Option<String>,
    pub institution: Option<String>,
}

/// Logistics a participant can fill in and edit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentDetails {
    pub check_in_date: Option<NaiveDate>,
    pub check_out_date: Option<NaiveDate>,
    pub phone_number: Option<String>,
    pub mailing_address: Option<String>,
    pub notes: Option<String>,
    /// Preferred departure airport
    pub airport1: Option<String>,
    /// Alternate departure airport
    pub airport2: Option<String>,
    pub funding: Option<String>,
}

impl EnrollmentDetails {
    fn validate(&self) -> Result<(), ProgramError> {
        if let (Some(check_in), Some(check_out)) = (self.check_in_date, self.check_out_date) {
            if check_out < check_in {
                return Err(ProgramError::validation("Check-out date is before check-in date"));
            }
        }
        Ok(())
    }
}

/// A person's participation in a program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub person_id: PersonId,
    pub program_id: ProgramId,
    pub source: EnrollmentSource,
    // Snapshot at enrollment time
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub email_snapshot: Option<String>,
    pub orcid_snapshot: Option<String>,
    pub institution: Option<String>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub declined_at: Option<DateTime<Utc>>,
    pub declined_reason: Option<String>,
    pub details: EnrollmentDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Enrollment {
    fn from_participant(
        participant: &Participant,
        program_id: ProgramId,
        source: EnrollmentSource,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EnrollmentId::new_v7(),
            person_id: participant.person_id,
            program_id,
            source,
            first_name: participant.first_name.clone(),
            middle_name: participant.middle_name.clone(),
            last_name: participant.last_name.clone(),
            email_snapshot: participant.email.clone(),
            orcid_snapshot: participant.orcid_id.clone(),
            institution: participant.institution.clone(),
            accepted_at: None,
            declined_at: None,
            declined_reason: None,
            details: EnrollmentDetails::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// A pending application
    pub fn application(
        participant: &Participant,
        program_id: ProgramId,
        details: EnrollmentDetails,
        now: DateTime<Utc>,
    ) -> Result<Self, ProgramError> {
        details.validate()?;
        let mut enrollment =
            Self::from_participant(participant, program_id, EnrollmentSource::Application, now);
        enrollment.details = details;
        Ok(enrollment)
    }

    /// An accepted enrollment created from an invitation
    pub fn from_invitation(participant: &Participant, program_id: ProgramId, now: DateTime<Utc>) -> Self {
        let mut enrollment =
            Self::from_participant(participant, program_id, EnrollmentSource::Invitation, now);
        enrollment.accepted_at = Some(now);
        enrollment
    }

    /// An accepted enrollment entered by staff
    pub fn by_staff(participant: &Participant, program_id: ProgramId, now: DateTime<Utc>) -> Self {
        let mut enrollment = Self::from_participant(participant, program_id, EnrollmentSource::Staff, now);
        enrollment.accepted_at = Some(now);
        enrollment
    }

    /// Current status, derived from the decision timestamps
    pub fn status(&self) -> EnrollmentStatus {
        if self.declined_at.is_some() {
            EnrollmentStatus::Declined
        } else if self.accepted_at.is_some() {
            EnrollmentStatus::Accepted
        } else {
            EnrollmentStatus::Pending
        }
    }

    /// Whether the participant withdrew after being accepted
    pub fn is_withdrawn(&self) -> bool {
        self.accepted_at.is_some() && self.declined_at.is_some()
    }

    pub fn is_editable(&self) -> bool {
        self.status() != EnrollmentStatus::Declined
    }

    /// Replaces the logistics fields
    ///
    /// # Errors
    ///
    /// `EnrollmentReadOnly` for declined enrollments
    pub fn update_details(&mut self, details: EnrollmentDetails, now: DateTime<Utc>) -> Result<(), ProgramError> {
        if !self.is_editable() {
            return Err(ProgramError::EnrollmentReadOnly);
        }
        details.validate()?;
        self.details = details;
        self.updated_at = now;
        Ok(())
    }

    /// Withdraws from an accepted enrollment before the program starts
    ///
    /// # Arguments
    ///
    /// * `program` - The program enrolled in
    /// * `reason` - Optional reason given by the participant
    /// * `today` - Institute-local date
    /// * `now` - Current instant
    pub fn withdraw(
        &mut self,
        program: &Program,
        reason: Option<&str>,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(), ProgramError> {
        if self.accepted_at.is_none() {
            return Err(ProgramError::NotAccepted);
        }
        if program.has_started(today) {
            return Err(ProgramError::ProgramStarted);
        }
        if self.declined_at.is_some() {
            return Err(ProgramError::AlreadyWithdrawn);
        }

        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        self.declined_at = Some(now);
        self.declined_reason = Some(match reason {
            Some(r) => format!("Withdrawn by participant: {}", r),
            None => "Withdrawn by participant".to_string(),
        });
        self.updated_at = now;
        Ok(())
    }

    /// Accepts a pending application
    pub fn accept(&mut self, now: DateTime<Utc>) -> Result<(), ProgramError> {
        if self.status() != EnrollmentStatus::Pending {
            return Err(ProgramError::NotPending);
        }
        self.accepted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Declines a pending application
    pub fn decline(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<(), ProgramError> {
        if self.status() != EnrollmentStatus::Pending {
            return Err(ProgramError::NotPending);
        }
        self.declined_at = Some(now);
        self.declined_reason = reason.filter(|r| !r.trim().is_empty());
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{NewProgram, ProgramType};

    fn participant() -> Participant {
        Participant {
            person_id: PersonId::new(),
            first_name: Some("Emmy".into()),
            middle_name: None,
            last_name: Some("Noether".into()),
            email: Some("emmy@example.org".into()),
            orcid_id: None,
            institution: Some("Bryn Mawr".into()),
        }
    }

    fn program_starting(start: NaiveDate) -> Program {
        Program::create(NewProgram {
            code: 7,
            title: "Invariant Theory".into(),
            abbreviation: None,
            program_type: ProgramType::Workshop,
            organizers: vec![],
            location: None,
            application_deadline: None,
            start_date: Some(start),
            end_date: Some(start + chrono::Days::new(4)),
            description: None,
            online: false,
        })
        .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_application_is_pending_with_snapshot() {
        let p = participant();
        let enrollment =
            Enrollment::application(&p, ProgramId::new(), EnrollmentDetails::default(), Utc::now()).unwrap();
        assert_eq!(enrollment.status(), EnrollmentStatus::Pending);
        assert_eq!(enrollment.source, EnrollmentSource::Application);
        assert_eq!(enrollment.email_snapshot, p.email);
        assert_eq!(enrollment.institution.as_deref(), Some("Bryn Mawr"));
    }

    #[test]
    fn test_withdraw_records_reason() {
        let program = program_starting(date(2025, 6, 2));
        let mut enrollment = Enrollment::from_invitation(&participant(), program.id, Utc::now());

        enrollment
            .withdraw(&program, Some("  family emergency "), date(2025, 5, 20), Utc::now())
            .unwrap();

        assert_eq!(enrollment.status(), EnrollmentStatus::Declined);
        assert!(enrollment.is_withdrawn());
        assert_eq!(
            enrollment.declined_reason.as_deref(),
            Some("Withdrawn by participant: family emergency")
        );
    }

    #[test]
    fn test_withdraw_without_reason() {
        let program = program_starting(date(2025, 6, 2));
        let mut enrollment = Enrollment::from_invitation(&participant(), program.id, Utc::now());
        enrollment.withdraw(&program, Some(""), date(2025, 5, 20), Utc::now()).unwrap();
        assert_eq!(enrollment.declined_reason.as_deref(), Some("Withdrawn by participant"));
    }

    #[test]
    fn test_withdraw_guards() {
        let program = program_starting(date(2025, 6, 2));
        let p = participant();

        let mut pending =
            Enrollment::application(&p, program.id, EnrollmentDetails::default(), Utc::now()).unwrap();
        assert!(matches!(
            pending.withdraw(&program, None, date(2025, 5, 1), Utc::now()),
            Err(ProgramError::NotAccepted)
        ));

        let mut accepted = Enrollment::from_invitation(&p, program.id, Utc::now());
        assert!(matches!(
            accepted.withdraw(&program, None, date(2025, 6, 2), Utc::now()),
            Err(ProgramError::ProgramStarted)
        ));

        accepted.withdraw(&program, None, date(2025, 6, 1), Utc::now()).unwrap();
        assert!(matches!(
            accepted.withdraw(&program, None, date(2025, 6, 1), Utc::now()),
            Err(ProgramError::AlreadyWithdrawn)
        ));
        // Once the program has started that takes precedence
        assert!(matches!(
            accepted.withdraw(&program, None, date(2025, 6, 3), Utc::now()),
            Err(ProgramError::ProgramStarted)
        ));
    }

    #[test]
    fn test_declined_is_read_only() {
        let mut enrollment =
            Enrollment::application(&participant(), ProgramId::new(), EnrollmentDetails::default(), Utc::now())
                .unwrap();
        enrollment.decline(Some("Program full".into()), Utc::now()).unwrap();
        assert!(matches!(
            enrollment.update_details(EnrollmentDetails::default(), Utc::now()),
            Err(ProgramError::EnrollmentReadOnly)
        ));
    }

    #[test]
    fn test_decision_only_on_pending() {
        let mut enrollment = Enrollment::by_staff(&participant(), ProgramId::new(), Utc::now());
        assert!(matches!(enrollment.accept(Utc::now()), Err(ProgramError::NotPending)));
        assert!(matches!(enrollment.decline(None, Utc::now()), Err(ProgramError::NotPending)));
    }

    #[test]
    fn test_details_reject_inverted_stay() {
        let mut enrollment = Enrollment::by_staff(&participant(), ProgramId::new(), Utc::now());
        let details = EnrollmentDetails {
            check_in_date: Some(date(2025, 6, 5)),
            check_out_date: Some(date(2025, 6, 1)),
            ..Default::default()
        };
        assert!(matches!(
            enrollment.update_details(details, Utc::now()),
            Err(ProgramError::Validation(_))
        ));
    }
}
