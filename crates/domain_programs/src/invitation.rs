//! Program invitations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use core_kernel::{EnrollmentId, InvitationId, PersonId, ProgramId, UserId};
use crate::error::ProgramError;
use crate::program::Program;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
        }
    }
}

/// The invitee's answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationAction {
    Accept,
    Decline,
}

impl FromStr for InvitationAction {
    type Err = ProgramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(InvitationAction::Accept),
            "decline" => Ok(InvitationAction::Decline),
            other => Err(ProgramError::validation(format!("Unknown action: {}", other))),
        }
    }
}

/// An emailed invitation to join a program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramInvitation {
    pub id: InvitationId,
    pub program_id: ProgramId,
    /// Address the invitation was sent to
    pub email: String,
    /// Known person record of the invitee, set at invite time or on accept
    pub person_id: Option<PersonId>,
    /// Opaque token embedded in the invitation link
    pub token: String,
    pub status: InvitationStatus,
    pub invited_by: Option<UserId>,
    pub enrollment_id: Option<EnrollmentId>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub declined_at: Option<DateTime<Utc>>,
}

/// Generates a 256-bit random token, hex encoded
fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

impl ProgramInvitation {
    pub fn new(
        program_id: ProgramId,
        email: impl Into<String>,
        person_id: Option<PersonId>,
        invited_by: Option<UserId>,
    ) -> Self {
        Self {
            id: InvitationId::new_v7(),
            program_id,
            email: email.into(),
            person_id,
            token: generate_token(),
            status: InvitationStatus::Pending,
            invited_by,
            enrollment_id: None,
            created_at: Utc::now(),
            accepted_at: None,
            declined_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == InvitationStatus::Pending
    }

    /// Whether the invitation lapsed at the program's application deadline
    ///
    /// Programs without a deadline never expire their invitations.
    pub fn is_expired(&self, program: &Program, now: DateTime<Utc>) -> bool {
        program.application_deadline.map_or(false, |deadline| now > deadline)
    }

    /// Checks the invitation can still be answered
    pub fn ensure_open(&self, program: &Program, now: DateTime<Utc>) -> Result<(), ProgramError> {
        if !self.is_pending() {
            return Err(ProgramError::AlreadyResponded(self.status.as_str().to_string()));
        }
        if self.is_expired(program, now) {
            return Err(ProgramError::InvitationExpired);
        }
        Ok(())
    }

    /// Marks the invitation accepted and links the person and enrollment
    pub fn accept(
        &mut self,
        person_id: PersonId,
        enrollment_id: EnrollmentId,
        now: DateTime<Utc>,
    ) -> Result<(), ProgramError> {
        if !self.is_pending() {
            return Err(ProgramError::AlreadyResponded(self.status.as_str().to_string()));
        }
        self.status = InvitationStatus::Accepted;
        self.person_id = Some(person_id);
        self.enrollment_id = Some(enrollment_id);
        self.accepted_at = Some(now);
        Ok(())
    }

    pub fn decline(&mut self, now: DateTime<Utc>) -> Result<(), ProgramError> {
        if !self.is_pending() {
            return Err(ProgramError::AlreadyResponded(self.status.as_str().to_string()));
        }
        self.status = InvitationStatus::Declined;
        self.declined_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{NewProgram, ProgramType};
    use chrono::Duration;

    fn program(deadline: Option<DateTime<Utc>>) -> Program {
        Program::create(NewProgram {
            code: 12,
            title: "L-functions".into(),
            abbreviation: None,
            program_type: ProgramType::Workshop,
            organizers: vec![],
            location: None,
            application_deadline: deadline,
            start_date: None,
            end_date: None,
            description: None,
            online: false,
        })
        .unwrap()
    }

    #[test]
    fn test_tokens_are_unique_and_long() {
        let a = ProgramInvitation::new(ProgramId::new(), "a@example.org", None, None);
        let b = ProgramInvitation::new(ProgramId::new(), "a@example.org", None, None);
        assert_ne!(a.token, b.token);
        assert_eq!(a.token.len(), 64);
    }

    #[test]
    fn test_expiry_follows_deadline() {
        let now = Utc::now();
        let invitation = ProgramInvitation::new(ProgramId::new(), "a@example.org", None, None);

        assert!(!invitation.is_expired(&program(None), now));
        assert!(!invitation.is_expired(&program(Some(now + Duration::hours(1))), now));
        assert!(invitation.is_expired(&program(Some(now - Duration::hours(1))), now));
    }

    #[test]
    fn test_cannot_respond_twice() {
        let now = Utc::now();
        let mut invitation = ProgramInvitation::new(ProgramId::new(), "a@example.org", None, None);
        invitation.decline(now).unwrap();

        let err = invitation.ensure_open(&program(None), now).unwrap_err();
        assert!(matches!(err, ProgramError::AlreadyResponded(ref s) if s == "declined"));
        assert!(invitation.accept(PersonId::new(), EnrollmentId::new(), now).is_err());
    }

    #[test]
    fn test_action_parse() {
        assert_eq!("accept".parse::<InvitationAction>().unwrap(), InvitationAction::Accept);
        assert!("maybe".parse::<InvitationAction>().is_err());
    }
}
