//! Programs Domain Ports
//!
//! Two ports: `ProgramPort` for the program catalogue and
//! `EnrollmentPort` for enrollments and invitations. They are separate
//! because programs are curated by staff while enrollments change with
//! every participant action. Both have PostgreSQL adapters in `infra_db`
//! and in-memory adapters in [`mock`].

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use core_kernel::{
    DomainPort, EnrollmentId, HealthCheckable, PersonId, PortError, ProgramId,
};

use crate::enrollment::Enrollment;
use crate::invitation::ProgramInvitation;
use crate::program::{Program, ProgramType};

/// Sort order for program listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgramOrder {
    /// Earliest start date first
    #[default]
    StartDate,
    /// Earliest application deadline first
    Deadline,
}

/// Query parameters for finding programs
#[derive(Debug, Clone, Default)]
pub struct ProgramQuery {
    pub program_type: Option<ProgramType>,
    /// Only programs whose end date is on or after this date
    pub ends_on_or_after: Option<NaiveDate>,
    /// Only programs whose application deadline is set and on or after this instant
    pub deadline_on_or_after: Option<DateTime<Utc>>,
    /// Programs to leave out
    pub exclude: Vec<ProgramId>,
    pub order: ProgramOrder,
    pub limit: Option<u32>,
}

impl ProgramQuery {
    /// Workshops that have not ended as of the given local date, by start date
    pub fn upcoming_workshops(today: NaiveDate) -> Self {
        Self {
            program_type: Some(ProgramType::Workshop),
            ends_on_or_after: Some(today),
            order: ProgramOrder::StartDate,
            ..Default::default()
        }
    }

    /// Programs still accepting applications, by deadline
    pub fn accepting_applications(now: DateTime<Utc>) -> Self {
        Self {
            deadline_on_or_after: Some(now),
            order: ProgramOrder::Deadline,
            ..Default::default()
        }
    }

    pub fn excluding(mut self, ids: Vec<ProgramId>) -> Self {
        self.exclude = ids;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a program satisfies the filters (ordering and limit aside)
    pub fn matches(&self, program: &Program) -> bool {
        if let Some(program_type) = self.program_type {
            if program.program_type != program_type {
                return false;
            }
        }
        if let Some(date) = self.ends_on_or_after {
            if !program.end_date.map_or(false, |end| end >= date) {
                return false;
            }
        }
        if let Some(at) = self.deadline_on_or_after {
            if !program.application_deadline.map_or(false, |d| d >= at) {
                return false;
            }
        }
        !self.exclude.contains(&program.id)
    }
}

/// Port for the program catalogue
#[async_trait]
pub trait ProgramPort: DomainPort + HealthCheckable {
    /// Retrieves a program by ID, or `PortError::NotFound`
    async fn get_program(&self, id: ProgramId) -> Result<Program, PortError>;

    /// Retrieves a program by its institute code, or `PortError::NotFound`
    async fn get_program_by_code(&self, code: i32) -> Result<Program, PortError>;

    /// Retrieves several programs; missing IDs are skipped
    async fn get_programs(&self, ids: &[ProgramId]) -> Result<Vec<Program>, PortError>;

    /// Finds programs matching the query
    async fn find_programs(&self, query: &ProgramQuery) -> Result<Vec<Program>, PortError>;

    /// Inserts a program; `PortError::Conflict` if the code is taken
    async fn create_program(&self, program: &Program) -> Result<Program, PortError>;
}

/// Port for enrollments and invitations
#[async_trait]
pub trait EnrollmentPort: DomainPort + HealthCheckable {
    // ========================================================================
    // Enrollments
    // ========================================================================

    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Enrollment, PortError>;

    /// The person's enrollment in a program, if any
    async fn find_enrollment(
        &self,
        person_id: PersonId,
        program_id: ProgramId,
    ) -> Result<Option<Enrollment>, PortError>;

    async fn list_for_person(&self, person_id: PersonId) -> Result<Vec<Enrollment>, PortError>;

    async fn list_for_program(&self, program_id: ProgramId) -> Result<Vec<Enrollment>, PortError>;

    /// Inserts an enrollment; `PortError::Conflict` if the person is
    /// already enrolled in the program
    async fn create_enrollment(&self, enrollment: &Enrollment) -> Result<Enrollment, PortError>;

    async fn update_enrollment(&self, enrollment: &Enrollment) -> Result<Enrollment, PortError>;

    // ========================================================================
    // Invitations
    // ========================================================================

    async fn get_invitation_by_token(&self, token: &str) -> Result<Option<ProgramInvitation>, PortError>;

    async fn create_invitation(&self, invitation: &ProgramInvitation) -> Result<ProgramInvitation, PortError>;

    /// Saves the response to an invitation
    ///
    /// `PortError::Conflict` if the stored invitation is no longer pending.
    async fn update_invitation(&self, invitation: &ProgramInvitation) -> Result<ProgramInvitation, PortError>;

    /// Pending invitations addressed to the person or to the email (case-insensitive)
    async fn list_pending_invitations(
        &self,
        person_id: PersonId,
        email: Option<&str>,
    ) -> Result<Vec<ProgramInvitation>, PortError>;

    /// Records an accepted invitation in one unit of work
    ///
    /// Inserts `new_enrollment` when given, then saves the invitation.
    /// Neither write is visible unless both succeed. `PortError::Conflict`
    /// if the person is already enrolled or the stored invitation is no
    /// longer pending.
    async fn accept_invitation(
        &self,
        invitation: &ProgramInvitation,
        new_enrollment: Option<&Enrollment>,
    ) -> Result<(), PortError>;
}

/// In-memory adapters for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    use core_kernel::{HealthCheckResult, InvitationId};

    /// In-memory mock implementation of ProgramPort
    #[derive(Debug, Default, Clone)]
    pub struct MockProgramPort {
        programs: Arc<RwLock<HashMap<ProgramId, Program>>>,
    }

    impl MockProgramPort {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates with programs for testing
        pub async fn with_programs(programs: Vec<Program>) -> Self {
            let port = Self::new();
            for program in programs {
                port.programs.write().await.insert(program.id, program);
            }
            port
        }
    }

    impl DomainPort for MockProgramPort {}

    #[async_trait]
    impl HealthCheckable for MockProgramPort {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("mock-program-port")
        }
    }

    #[async_trait]
    impl ProgramPort for MockProgramPort {
        async fn get_program(&self, id: ProgramId) -> Result<Program, PortError> {
            self.programs
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Program", id))
        }

        async fn get_program_by_code(&self, code: i32) -> Result<Program, PortError> {
            self.programs
                .read()
                .await
                .values()
                .find(|p| p.code == code)
                .cloned()
                .ok_or_else(|| PortError::not_found("Program", code))
        }

        async fn get_programs(&self, ids: &[ProgramId]) -> Result<Vec<Program>, PortError> {
            let programs = self.programs.read().await;
            Ok(ids.iter().filter_map(|id| programs.get(id).cloned()).collect())
        }

        async fn find_programs(&self, query: &ProgramQuery) -> Result<Vec<Program>, PortError> {
            let mut results: Vec<Program> = self
                .programs
                .read()
                .await
                .values()
                .filter(|p| query.matches(p))
                .cloned()
                .collect();

            match query.order {
                ProgramOrder::StartDate => results.sort_by_key(|p| (p.start_date, p.code)),
                ProgramOrder::Deadline => results.sort_by_key(|p| (p.application_deadline, p.code)),
            }
            if let Some(limit) = query.limit {
                results.truncate(limit as usize);
            }
            Ok(results)
        }

        async fn create_program(&self, program: &Program) -> Result<Program, PortError> {
            let mut programs = self.programs.write().await;
            if programs.values().any(|p| p.code == program.code) {
                return Err(PortError::conflict(format!("program code {} already exists", program.code)));
            }
            programs.insert(program.id, program.clone());
            Ok(program.clone())
        }
    }

    #[derive(Debug, Default)]
    struct EnrollmentStore {
        enrollments: HashMap<EnrollmentId, Enrollment>,
        invitations: HashMap<InvitationId, ProgramInvitation>,
    }

    impl EnrollmentStore {
        fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), PortError> {
            let duplicate = self.enrollments.values().any(|e| {
                e.person_id == enrollment.person_id && e.program_id == enrollment.program_id
            });
            if duplicate {
                return Err(PortError::conflict("person is already enrolled in this program"));
            }
            self.enrollments.insert(enrollment.id, enrollment.clone());
            Ok(())
        }
    }

    /// In-memory mock implementation of EnrollmentPort
    #[derive(Debug, Default, Clone)]
    pub struct MockEnrollmentPort {
        store: Arc<RwLock<EnrollmentStore>>,
    }

    impl MockEnrollmentPort {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn enrollment_count(&self) -> usize {
            self.store.read().await.enrollments.len()
        }
    }

    impl DomainPort for MockEnrollmentPort {}

    #[async_trait]
    impl HealthCheckable for MockEnrollmentPort {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("mock-enrollment-port")
        }
    }

    #[async_trait]
    impl EnrollmentPort for MockEnrollmentPort {
        async fn get_enrollment(&self, id: EnrollmentId) -> Result<Enrollment, PortError> {
            self.store
                .read()
                .await
                .enrollments
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Enrollment", id))
        }

        async fn find_enrollment(
            &self,
            person_id: PersonId,
            program_id: ProgramId,
        ) -> Result<Option<Enrollment>, PortError> {
            Ok(self
                .store
                .read()
                .await
                .enrollments
                .values()
                .find(|e| e.person_id == person_id && e.program_id == program_id)
                .cloned())
        }

        async fn list_for_person(&self, person_id: PersonId) -> Result<Vec<Enrollment>, PortError> {
            Ok(self
                .store
                .read()
                .await
                .enrollments
                .values()
                .filter(|e| e.person_id == person_id)
                .cloned()
                .collect())
        }

        async fn list_for_program(&self, program_id: ProgramId) -> Result<Vec<Enrollment>, PortError> {
            Ok(self
                .store
                .read()
                .await
                .enrollments
                .values()
                .filter(|e| e.program_id == program_id)
                .cloned()
                .collect())
        }

        async fn create_enrollment(&self, enrollment: &Enrollment) -> Result<Enrollment, PortError> {
            self.store.write().await.insert_enrollment(enrollment)?;
            Ok(enrollment.clone())
        }

        async fn update_enrollment(&self, enrollment: &Enrollment) -> Result<Enrollment, PortError> {
            let mut store = self.store.write().await;
            let existing = store
                .enrollments
                .get_mut(&enrollment.id)
                .ok_or_else(|| PortError::not_found("Enrollment", enrollment.id))?;
            *existing = enrollment.clone();
            Ok(enrollment.clone())
        }

        async fn get_invitation_by_token(&self, token: &str) -> Result<Option<ProgramInvitation>, PortError> {
            Ok(self
                .store
                .read()
                .await
                .invitations
                .values()
                .find(|i| i.token == token)
                .cloned())
        }

        async fn create_invitation(&self, invitation: &ProgramInvitation) -> Result<ProgramInvitation, PortError> {
            self.store
                .write()
                .await
                .invitations
                .insert(invitation.id, invitation.clone());
            Ok(invitation.clone())
        }

        async fn update_invitation(&self, invitation: &ProgramInvitation) -> Result<ProgramInvitation, PortError> {
            let mut store = self.store.write().await;
            let existing = store
                .invitations
                .get_mut(&invitation.id)
                .ok_or_else(|| PortError::not_found("Invitation", invitation.id))?;
            if !existing.is_pending() {
                return Err(already_answered(invitation));
            }
            *existing = invitation.clone();
            Ok(invitation.clone())
        }

        async fn list_pending_invitations(
            &self,
            person_id: PersonId,
            email: Option<&str>,
        ) -> Result<Vec<ProgramInvitation>, PortError> {
            Ok(self
                .store
                .read()
                .await
                .invitations
                .values()
                .filter(|i| i.is_pending())
                .filter(|i| {
                    i.person_id == Some(person_id)
                        || email.map_or(false, |e| i.email.eq_ignore_ascii_case(e.trim()))
                })
                .cloned()
                .collect())
        }

        async fn accept_invitation(
            &self,
            invitation: &ProgramInvitation,
            new_enrollment: Option<&Enrollment>,
        ) -> Result<(), PortError> {
            let mut store = self.store.write().await;
            match store.invitations.get(&invitation.id) {
                None => return Err(PortError::not_found("Invitation", invitation.id)),
                Some(stored) if !stored.is_pending() => return Err(already_answered(invitation)),
                Some(_) => {}
            }
            if let Some(enrollment) = new_enrollment {
                store.insert_enrollment(enrollment)?;
            }
            store.invitations.insert(invitation.id, invitation.clone());
            Ok(())
        }
    }

    fn already_answered(invitation: &ProgramInvitation) -> PortError {
        PortError::conflict(format!("invitation {} has already been answered", invitation.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::mock::{MockEnrollmentPort, MockProgramPort};
    use crate::enrollment::{EnrollmentDetails, Participant};
    use crate::program::NewProgram;
    use chrono::Duration;

    fn program(code: i32, program_type: ProgramType, end: Option<NaiveDate>) -> Program {
        Program::create(NewProgram {
            code,
            title: format!("Program {}", code),
            abbreviation: None,
            program_type,
            organizers: vec![],
            location: None,
            application_deadline: None,
            start_date: end,
            end_date: end,
            description: None,
            online: false,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_upcoming_workshops_query() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let port = MockProgramPort::with_programs(vec![
            program(1, ProgramType::Workshop, NaiveDate::from_ymd_opt(2025, 2, 28)),
            program(2, ProgramType::Workshop, NaiveDate::from_ymd_opt(2025, 4, 1)),
            program(3, ProgramType::Workshop, Some(today)),
            program(4, ProgramType::Square, NaiveDate::from_ymd_opt(2025, 4, 1)),
        ])
        .await;

        let found = port.find_programs(&ProgramQuery::upcoming_workshops(today)).await.unwrap();
        let codes: Vec<i32> = found.iter().map(|p| p.code).collect();
        assert_eq!(codes, vec![3, 2]);
    }

    #[tokio::test]
    async fn test_accepting_query_skips_missing_deadline() {
        let now = Utc::now();
        let mut open = program(1, ProgramType::Workshop, None);
        open.application_deadline = Some(now + Duration::days(3));
        let closed = program(2, ProgramType::Workshop, None);
        let port = MockProgramPort::with_programs(vec![open.clone(), closed]).await;

        let found = port
            .find_programs(&ProgramQuery::accepting_applications(now))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, open.id);

        let none = port
            .find_programs(&ProgramQuery::accepting_applications(now).excluding(vec![open.id]))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_program_code() {
        let port = MockProgramPort::new();
        port.create_program(&program(1, ProgramType::Meeting, None)).await.unwrap();
        let err = port
            .create_program(&program(1, ProgramType::Meeting, None))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_duplicate_enrollment() {
        let port = MockEnrollmentPort::new();
        let participant = Participant {
            person_id: PersonId::new(),
            first_name: None,
            middle_name: None,
            last_name: None,
            email: None,
            orcid_id: None,
            institution: None,
        };
        let program_id = ProgramId::new();
        let first =
            Enrollment::application(&participant, program_id, EnrollmentDetails::default(), Utc::now()).unwrap();
        let second =
            Enrollment::application(&participant, program_id, EnrollmentDetails::default(), Utc::now()).unwrap();

        port.create_enrollment(&first).await.unwrap();
        assert!(port.create_enrollment(&second).await.unwrap_err().is_conflict());
        assert_eq!(port.enrollment_count().await, 1);
    }

    #[tokio::test]
    async fn test_answered_invitation_cannot_be_overwritten() {
        let port = MockEnrollmentPort::new();
        let invitation = ProgramInvitation::new(ProgramId::new(), "noether@example.org", None, None);
        port.create_invitation(&invitation).await.unwrap();

        let mut declined = invitation.clone();
        declined.decline(Utc::now()).unwrap();
        port.update_invitation(&declined).await.unwrap();

        // A second response prepared from the same pending read
        let mut accepted = invitation.clone();
        accepted.accept(PersonId::new(), EnrollmentId::new(), Utc::now()).unwrap();
        assert!(port.accept_invitation(&accepted, None).await.unwrap_err().is_conflict());
        assert!(port.update_invitation(&accepted).await.unwrap_err().is_conflict());

        let stored = port.get_invitation_by_token(&invitation.token).await.unwrap().unwrap();
        assert_eq!(stored.status, declined.status);
    }
}
