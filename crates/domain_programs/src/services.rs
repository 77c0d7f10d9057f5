//! Program domain services
//!
//! Services orchestrate the entities in this crate over the two ports.
//! They take the acting person or [`Actor`] explicitly; resolving a login
//! to a person is the caller's job.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::ValidateEmail;

use core_kernel::{
    Actor, EnrollmentId, InstituteClock, Permission, PersonId, PortError, ProgramId,
};

use crate::enrollment::{Enrollment, EnrollmentDetails, EnrollmentStatus, Participant};
use crate::error::ProgramError;
use crate::invitation::{InvitationAction, ProgramInvitation};
use crate::ports::{EnrollmentPort, ProgramPort, ProgramQuery};
use crate::program::{NewProgram, Program};

/// Default number of upcoming workshops listed
pub const DEFAULT_UPCOMING_LIMIT: u32 = 12;

fn require(actor: &Actor, permission: Permission) -> Result<(), ProgramError> {
    if actor.has(permission) {
        Ok(())
    } else {
        Err(ProgramError::PermissionDenied(permission))
    }
}

/// An enrollment together with its program
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentWithProgram {
    pub enrollment: Enrollment,
    pub program: Program,
}

/// A person's enrollments grouped for the dashboard
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnrollmentOverview {
    /// Accepted, not withdrawn, program not over; by start date
    pub upcoming: Vec<EnrollmentWithProgram>,
    /// Awaiting a decision, program not over; by start date
    pub pending_applications: Vec<EnrollmentWithProgram>,
    /// Accepted, not withdrawn, program over; most recent first
    pub past: Vec<EnrollmentWithProgram>,
}

/// Staff decision on an application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ApplicationDecision {
    Accept,
    Decline { reason: Option<String> },
}

/// An invitation with its program, as shown to the invitee
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingInvitation {
    pub invitation: ProgramInvitation,
    pub program: Program,
    pub expired: bool,
}

/// Outcome of answering an invitation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvitationResponse {
    pub invitation: ProgramInvitation,
    /// The enrollment created or linked by an acceptance
    pub enrollment: Option<Enrollment>,
    /// The invitee was already enrolled before accepting
    pub already_enrolled: bool,
}

async fn load_program(programs: &dyn ProgramPort, id: ProgramId) -> Result<Program, ProgramError> {
    programs.get_program(id).await.map_err(|e| {
        if e.is_not_found() {
            ProgramError::program_not_found(id)
        } else {
            e.into()
        }
    })
}

// ============================================================================
// Programs
// ============================================================================

/// Service for the program catalogue
#[derive(Clone)]
pub struct ProgramService {
    programs: Arc<dyn ProgramPort>,
    enrollments: Arc<dyn EnrollmentPort>,
    clock: InstituteClock,
}

impl ProgramService {
    pub fn new(
        programs: Arc<dyn ProgramPort>,
        enrollments: Arc<dyn EnrollmentPort>,
        clock: InstituteClock,
    ) -> Self {
        Self { programs, enrollments, clock }
    }

    pub async fn get(&self, id: ProgramId) -> Result<Program, ProgramError> {
        load_program(self.programs.as_ref(), id).await
    }

    pub async fn get_by_code(&self, code: i32) -> Result<Program, ProgramError> {
        self.programs.get_program_by_code(code).await.map_err(|e| {
            if e.is_not_found() {
                ProgramError::program_not_found(code)
            } else {
                e.into()
            }
        })
    }

    /// Workshops that have not ended as of institute-local today, by start date
    pub async fn upcoming_workshops(&self, limit: u32) -> Result<Vec<Program>, ProgramError> {
        let query = ProgramQuery::upcoming_workshops(self.clock.today()).limit(limit);
        Ok(self.programs.find_programs(&query).await?)
    }

    /// Programs accepting applications that the person is not enrolled in,
    /// nearest deadline first
    pub async fn open_programs_for(
        &self,
        person_id: PersonId,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Program>, ProgramError> {
        let enrolled: Vec<ProgramId> = self
            .enrollments
            .list_for_person(person_id)
            .await?
            .into_iter()
            .map(|e| e.program_id)
            .collect();
        let query = ProgramQuery::accepting_applications(now)
            .excluding(enrolled)
            .limit(limit);
        Ok(self.programs.find_programs(&query).await?)
    }

    /// Adds a program to the catalogue
    pub async fn create_program(&self, actor: &Actor, new: NewProgram) -> Result<Program, ProgramError> {
        require(actor, Permission::ManagePrograms)?;
        let program = Program::create(new)?;
        let program = self.programs.create_program(&program).await.map_err(|e| {
            if e.is_conflict() {
                ProgramError::validation(format!("Program code {} already exists", program.code))
            } else {
                e.into()
            }
        })?;
        info!(program_id = %program.id, code = program.code, "Program created");
        Ok(program)
    }
}

// ============================================================================
// Enrollments
// ============================================================================

/// Service for applying to, editing and leaving programs
#[derive(Clone)]
pub struct EnrollmentService {
    programs: Arc<dyn ProgramPort>,
    enrollments: Arc<dyn EnrollmentPort>,
    clock: InstituteClock,
}

impl EnrollmentService {
    pub fn new(
        programs: Arc<dyn ProgramPort>,
        enrollments: Arc<dyn EnrollmentPort>,
        clock: InstituteClock,
    ) -> Self {
        Self { programs, enrollments, clock }
    }

    async fn load(&self, id: EnrollmentId) -> Result<Enrollment, ProgramError> {
        self.enrollments.get_enrollment(id).await.map_err(|e| {
            if e.is_not_found() {
                ProgramError::enrollment_not_found(id)
            } else {
                e.into()
            }
        })
    }

    async fn load_owned(&self, person_id: PersonId, id: EnrollmentId) -> Result<Enrollment, ProgramError> {
        let enrollment = self.load(id).await?;
        if enrollment.person_id != person_id {
            // Foreign enrollments look missing
            return Err(ProgramError::enrollment_not_found(id));
        }
        Ok(enrollment)
    }

    /// Applies to a program by its code
    ///
    /// # Errors
    ///
    /// - `ProgramNotFound` for an unknown code
    /// - `NotAcceptingApplications` when the deadline is missing or passed
    /// - `AlreadyEnrolled` when the person already has an enrollment
    pub async fn apply(
        &self,
        participant: &Participant,
        program_code: i32,
        details: EnrollmentDetails,
        now: DateTime<Utc>,
    ) -> Result<Enrollment, ProgramError> {
        let program = self.programs.get_program_by_code(program_code).await.map_err(|e| {
            if e.is_not_found() {
                ProgramError::program_not_found(program_code)
            } else {
                e.into()
            }
        })?;

        if !program.is_accepting_applications(now) {
            return Err(ProgramError::NotAcceptingApplications(program.title));
        }
        if self
            .enrollments
            .find_enrollment(participant.person_id, program.id)
            .await?
            .is_some()
        {
            return Err(ProgramError::AlreadyEnrolled(program.title));
        }

        let enrollment = Enrollment::application(participant, program.id, details, now)?;
        let enrollment = self
            .enrollments
            .create_enrollment(&enrollment)
            .await
            .map_err(|e| already_enrolled_on_conflict(e, &program))?;

        info!(
            enrollment_id = %enrollment.id,
            person_id = %participant.person_id,
            program_code = program.code,
            "Application submitted"
        );
        Ok(enrollment)
    }

    /// Returns one of the person's enrollments with its program
    pub async fn get_for_person(
        &self,
        person_id: PersonId,
        id: EnrollmentId,
    ) -> Result<EnrollmentWithProgram, ProgramError> {
        let enrollment = self.load_owned(person_id, id).await?;
        let program = load_program(self.programs.as_ref(), enrollment.program_id).await?;
        Ok(EnrollmentWithProgram { enrollment, program })
    }

    /// Returns any enrollment (staff and cross-domain checks)
    pub async fn get(&self, id: EnrollmentId) -> Result<Enrollment, ProgramError> {
        self.load(id).await
    }

    /// Replaces the logistics on one of the person's enrollments
    pub async fn update_details(
        &self,
        person_id: PersonId,
        id: EnrollmentId,
        details: EnrollmentDetails,
        now: DateTime<Utc>,
    ) -> Result<Enrollment, ProgramError> {
        let mut enrollment = self.load_owned(person_id, id).await?;
        enrollment.update_details(details, now)?;
        Ok(self.enrollments.update_enrollment(&enrollment).await?)
    }

    /// Withdraws from an accepted enrollment before the program starts
    pub async fn withdraw(
        &self,
        person_id: PersonId,
        id: EnrollmentId,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Enrollment, ProgramError> {
        let mut enrollment = self.load_owned(person_id, id).await?;
        let program = load_program(self.programs.as_ref(), enrollment.program_id).await?;
        enrollment.withdraw(&program, reason, self.clock.local_date(now), now)?;
        let enrollment = self.enrollments.update_enrollment(&enrollment).await?;
        info!(enrollment_id = %enrollment.id, program_code = program.code, "Participant withdrew");
        Ok(enrollment)
    }

    /// Records a staff decision on a pending application
    pub async fn decide_application(
        &self,
        actor: &Actor,
        id: EnrollmentId,
        decision: ApplicationDecision,
        now: DateTime<Utc>,
    ) -> Result<Enrollment, ProgramError> {
        require(actor, Permission::ManagePrograms)?;
        let mut enrollment = self.load(id).await?;
        match &decision {
            ApplicationDecision::Accept => enrollment.accept(now)?,
            ApplicationDecision::Decline { reason } => enrollment.decline(reason.clone(), now)?,
        }
        let enrollment = self.enrollments.update_enrollment(&enrollment).await?;
        info!(
            enrollment_id = %enrollment.id,
            decided_by = %actor.user_id,
            status = ?enrollment.status(),
            "Application decided"
        );
        Ok(enrollment)
    }

    /// Groups the person's enrollments into upcoming, pending and past
    pub async fn overview(
        &self,
        person_id: PersonId,
        now: DateTime<Utc>,
    ) -> Result<EnrollmentOverview, ProgramError> {
        let today = self.clock.local_date(now);
        let enrollments = self.enrollments.list_for_person(person_id).await?;
        let ids: Vec<ProgramId> = enrollments.iter().map(|e| e.program_id).collect();
        let programs: HashMap<ProgramId, Program> = self
            .programs
            .get_programs(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut overview = EnrollmentOverview::default();
        for enrollment in enrollments {
            let Some(program) = programs.get(&enrollment.program_id).cloned() else {
                warn!(enrollment_id = %enrollment.id, "Enrollment references a missing program");
                continue;
            };
            let ended = program.has_ended(today);
            let item = EnrollmentWithProgram { enrollment, program };
            match (item.enrollment.status(), ended) {
                (EnrollmentStatus::Accepted, false) => overview.upcoming.push(item),
                (EnrollmentStatus::Accepted, true) => overview.past.push(item),
                (EnrollmentStatus::Pending, false) => overview.pending_applications.push(item),
                _ => {}
            }
        }

        overview.upcoming.sort_by_key(|i| i.program.start_date);
        overview.pending_applications.sort_by_key(|i| i.program.start_date);
        overview.past.sort_by(|a, b| b.program.end_date.cmp(&a.program.end_date));
        Ok(overview)
    }
}

fn already_enrolled_on_conflict(error: PortError, program: &Program) -> ProgramError {
    if error.is_conflict() {
        ProgramError::AlreadyEnrolled(program.title.clone())
    } else {
        error.into()
    }
}

// ============================================================================
// Invitations
// ============================================================================

/// Service for sending and answering program invitations
#[derive(Clone)]
pub struct InvitationService {
    programs: Arc<dyn ProgramPort>,
    enrollments: Arc<dyn EnrollmentPort>,
}

impl InvitationService {
    pub fn new(programs: Arc<dyn ProgramPort>, enrollments: Arc<dyn EnrollmentPort>) -> Self {
        Self { programs, enrollments }
    }

    /// Creates a pending invitation with a fresh token
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` without `ManagePrograms`
    /// - `Validation` for a malformed email or a program whose deadline has passed
    pub async fn invite(
        &self,
        actor: &Actor,
        program_id: ProgramId,
        email: &str,
        person_id: Option<PersonId>,
        now: DateTime<Utc>,
    ) -> Result<ProgramInvitation, ProgramError> {
        require(actor, Permission::ManagePrograms)?;
        let email = email.trim();
        if !email.validate_email() {
            return Err(ProgramError::validation(format!("Invalid email address: {}", email)));
        }
        let program = load_program(self.programs.as_ref(), program_id).await?;

        let invitation = ProgramInvitation::new(program.id, email, person_id, Some(actor.user_id));
        if invitation.is_expired(&program, now) {
            return Err(ProgramError::validation("The program's application deadline has passed"));
        }
        let invitation = self.enrollments.create_invitation(&invitation).await?;
        info!(
            invitation_id = %invitation.id,
            program_code = program.code,
            invited_by = %actor.user_id,
            "Invitation created"
        );
        Ok(invitation)
    }

    async fn load(&self, token: &str) -> Result<(ProgramInvitation, Program), ProgramError> {
        let invitation = self
            .enrollments
            .get_invitation_by_token(token)
            .await?
            .ok_or(ProgramError::InvitationNotFound)?;
        let program = load_program(self.programs.as_ref(), invitation.program_id).await?;
        Ok((invitation, program))
    }

    /// Looks an invitation up by token for display
    pub async fn lookup(&self, token: &str, now: DateTime<Utc>) -> Result<PendingInvitation, ProgramError> {
        let (invitation, program) = self.load(token).await?;
        let expired = invitation.is_expired(&program, now);
        Ok(PendingInvitation { invitation, program, expired })
    }

    /// Accepts or declines an invitation
    ///
    /// Declining needs no sign-in. Accepting needs the invitee's
    /// participant record; if they are already enrolled the invitation is
    /// linked to the existing enrollment, otherwise an accepted enrollment
    /// is created together with the invitation update.
    ///
    /// # Errors
    ///
    /// - `InvitationNotFound` for an unknown token
    /// - `AlreadyResponded` if the invitation is not pending
    /// - `InvitationExpired` past the program's application deadline
    /// - `LoginRequired` when accepting without a participant
    pub async fn respond(
        &self,
        token: &str,
        action: InvitationAction,
        participant: Option<&Participant>,
        now: DateTime<Utc>,
    ) -> Result<InvitationResponse, ProgramError> {
        let (mut invitation, program) = self.load(token).await?;
        invitation.ensure_open(&program, now)?;

        match action {
            InvitationAction::Decline => {
                invitation.decline(now)?;
                let invitation = match self.enrollments.update_invitation(&invitation).await {
                    Ok(saved) => saved,
                    Err(e) => return Err(self.answered_meanwhile(e, token, None).await),
                };
                info!(invitation_id = %invitation.id, program_code = program.code, "Invitation declined");
                Ok(InvitationResponse {
                    invitation,
                    enrollment: None,
                    already_enrolled: false,
                })
            }
            InvitationAction::Accept => {
                let participant = participant.ok_or(ProgramError::LoginRequired)?;

                if let Some(existing) = self
                    .enrollments
                    .find_enrollment(participant.person_id, program.id)
                    .await?
                {
                    invitation.accept(participant.person_id, existing.id, now)?;
                    if let Err(e) = self.enrollments.accept_invitation(&invitation, None).await {
                        return Err(self.answered_meanwhile(e, token, None).await);
                    }
                    info!(
                        invitation_id = %invitation.id,
                        enrollment_id = %existing.id,
                        "Invitation accepted by an already enrolled person"
                    );
                    return Ok(InvitationResponse {
                        invitation,
                        enrollment: Some(existing),
                        already_enrolled: true,
                    });
                }

                let enrollment = Enrollment::from_invitation(participant, program.id, now);
                invitation.accept(participant.person_id, enrollment.id, now)?;
                if let Err(e) = self.enrollments.accept_invitation(&invitation, Some(&enrollment)).await {
                    return Err(self.answered_meanwhile(e, token, Some(&program)).await);
                }

                info!(
                    invitation_id = %invitation.id,
                    enrollment_id = %enrollment.id,
                    program_code = program.code,
                    "Invitation accepted"
                );
                Ok(InvitationResponse {
                    invitation,
                    enrollment: Some(enrollment),
                    already_enrolled: false,
                })
            }
        }
    }

    /// Explains a conflicting write by re-reading the invitation
    ///
    /// A response that lost the race to another one becomes
    /// `AlreadyResponded`. Otherwise a conflict while enrolling means the
    /// person was enrolled in the meantime.
    async fn answered_meanwhile(&self, error: PortError, token: &str, enrolling: Option<&Program>) -> ProgramError {
        if !error.is_conflict() {
            return error.into();
        }
        match self.enrollments.get_invitation_by_token(token).await {
            Ok(Some(current)) if !current.is_pending() => {
                warn!(invitation_id = %current.id, status = %current.status.as_str(), "Invitation answered concurrently");
                ProgramError::AlreadyResponded(current.status.as_str().to_string())
            }
            Ok(_) => match enrolling {
                Some(program) => already_enrolled_on_conflict(error, program),
                None => error.into(),
            },
            Err(e) => e.into(),
        }
    }

    /// Open invitations addressed to the person or their email, nearest deadline first
    pub async fn pending_for(
        &self,
        person_id: PersonId,
        email: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<PendingInvitation>, ProgramError> {
        let invitations = self.enrollments.list_pending_invitations(person_id, email).await?;
        let ids: Vec<ProgramId> = invitations.iter().map(|i| i.program_id).collect();
        let programs: HashMap<ProgramId, Program> = self
            .programs
            .get_programs(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut pending: Vec<PendingInvitation> = invitations
            .into_iter()
            .filter_map(|invitation| {
                let program = programs.get(&invitation.program_id)?.clone();
                let expired = invitation.is_expired(&program, now);
                (!expired).then_some(PendingInvitation { invitation, program, expired })
            })
            .collect();
        pending.sort_by_key(|p| (p.program.application_deadline.is_none(), p.program.application_deadline));
        Ok(pending)
    }
}
