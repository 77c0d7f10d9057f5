//! Service-level tests for programs, enrollments and invitations

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use core_kernel::{
    Actor, DomainPort, EnrollmentId, HealthCheckResult, HealthCheckable, InstituteClock, Permission, PersonId,
    PortError, ProgramId, UserId,
};
use domain_programs::{
    ApplicationDecision, Enrollment, EnrollmentDetails, EnrollmentPort, EnrollmentService, EnrollmentSource,
    EnrollmentStatus, InvitationAction, InvitationService, InvitationStatus, MockEnrollmentPort,
    MockProgramPort, NewProgram, Participant, Program, ProgramError, ProgramInvitation, ProgramService,
    ProgramType,
};

struct Harness {
    enrollments: Arc<MockEnrollmentPort>,
    programs_service: ProgramService,
    enrollment_service: EnrollmentService,
    invitation_service: InvitationService,
}

async fn harness(programs: Vec<Program>) -> Harness {
    let program_port = Arc::new(MockProgramPort::with_programs(programs).await);
    let enrollments = Arc::new(MockEnrollmentPort::new());
    let clock = InstituteClock::default();
    Harness {
        programs_service: ProgramService::new(program_port.clone(), enrollments.clone(), clock),
        enrollment_service: EnrollmentService::new(program_port.clone(), enrollments.clone(), clock),
        invitation_service: InvitationService::new(program_port, enrollments.clone()),
        enrollments,
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 18, 0, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn program(code: i32, deadline: Option<DateTime<Utc>>, start: NaiveDate) -> Program {
    Program::create(NewProgram {
        code,
        title: format!("Workshop {}", code),
        abbreviation: None,
        program_type: ProgramType::Workshop,
        organizers: vec![],
        location: Some("Caltech".into()),
        application_deadline: deadline,
        start_date: Some(start),
        end_date: Some(start + chrono::Days::new(4)),
        description: None,
        online: false,
    })
    .unwrap()
}

fn participant() -> Participant {
    Participant {
        person_id: PersonId::new(),
        first_name: Some("Srinivasa".into()),
        middle_name: None,
        last_name: Some("Ramanujan".into()),
        email: Some("ramanujan@example.org".into()),
        orcid_id: None,
        institution: Some("Trinity College".into()),
    }
}

fn staff() -> Actor {
    Actor::staff(UserId::new(), [Permission::ManagePrograms])
}

// ============================================================================
// Applications
// ============================================================================

mod application_tests {
    use super::*;

    #[tokio::test]
    async fn test_apply_creates_pending_application() {
        let open = program(100, Some(now() + Duration::days(10)), date(2025, 5, 1));
        let h = harness(vec![open.clone()]).await;
        let p = participant();

        let enrollment = h
            .enrollment_service
            .apply(&p, 100, EnrollmentDetails::default(), now())
            .await
            .unwrap();

        assert_eq!(enrollment.status(), EnrollmentStatus::Pending);
        assert_eq!(enrollment.source, EnrollmentSource::Application);
        assert_eq!(enrollment.program_id, open.id);
        assert_eq!(enrollment.last_name.as_deref(), Some("Ramanujan"));
    }

    #[tokio::test]
    async fn test_apply_closed_program() {
        let closed = program(101, Some(now() - Duration::days(1)), date(2025, 5, 1));
        let no_deadline = program(102, None, date(2025, 5, 1));
        let h = harness(vec![closed, no_deadline]).await;

        for code in [101, 102] {
            let result = h
                .enrollment_service
                .apply(&participant(), code, EnrollmentDetails::default(), now())
                .await;
            assert!(matches!(result, Err(ProgramError::NotAcceptingApplications(_))));
        }
    }

    #[tokio::test]
    async fn test_apply_twice() {
        let h = harness(vec![program(100, Some(now() + Duration::days(10)), date(2025, 5, 1))]).await;
        let p = participant();
        h.enrollment_service
            .apply(&p, 100, EnrollmentDetails::default(), now())
            .await
            .unwrap();

        let again = h
            .enrollment_service
            .apply(&p, 100, EnrollmentDetails::default(), now())
            .await;
        assert!(matches!(again, Err(ProgramError::AlreadyEnrolled(_))));
    }

    #[tokio::test]
    async fn test_apply_unknown_code() {
        let h = harness(vec![]).await;
        let result = h
            .enrollment_service
            .apply(&participant(), 999, EnrollmentDetails::default(), now())
            .await;
        assert!(matches!(result, Err(ProgramError::ProgramNotFound(_))));
    }

    #[tokio::test]
    async fn test_staff_decision() {
        let h = harness(vec![program(100, Some(now() + Duration::days(10)), date(2025, 5, 1))]).await;
        let enrollment = h
            .enrollment_service
            .apply(&participant(), 100, EnrollmentDetails::default(), now())
            .await
            .unwrap();

        let participant_actor = Actor::participant(UserId::new(), None);
        let denied = h
            .enrollment_service
            .decide_application(&participant_actor, enrollment.id, ApplicationDecision::Accept, now())
            .await;
        assert!(matches!(denied, Err(ProgramError::PermissionDenied(Permission::ManagePrograms))));

        let accepted = h
            .enrollment_service
            .decide_application(&staff(), enrollment.id, ApplicationDecision::Accept, now())
            .await
            .unwrap();
        assert_eq!(accepted.status(), EnrollmentStatus::Accepted);

        let again = h
            .enrollment_service
            .decide_application(
                &staff(),
                enrollment.id,
                ApplicationDecision::Decline { reason: None },
                now(),
            )
            .await;
        assert!(matches!(again, Err(ProgramError::NotPending)));
    }
}

// ============================================================================
// Enrollment maintenance
// ============================================================================

mod enrollment_tests {
    use super::*;

    #[tokio::test]
    async fn test_other_person_cannot_see_or_edit() {
        let h = harness(vec![program(100, Some(now() + Duration::days(10)), date(2025, 5, 1))]).await;
        let enrollment = h
            .enrollment_service
            .apply(&participant(), 100, EnrollmentDetails::default(), now())
            .await
            .unwrap();

        let stranger = PersonId::new();
        assert!(matches!(
            h.enrollment_service.get_for_person(stranger, enrollment.id).await,
            Err(ProgramError::EnrollmentNotFound(_))
        ));
        assert!(matches!(
            h.enrollment_service
                .update_details(stranger, enrollment.id, EnrollmentDetails::default(), now())
                .await,
            Err(ProgramError::EnrollmentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_details_on_pending_application() {
        let h = harness(vec![program(100, Some(now() + Duration::days(10)), date(2025, 5, 1))]).await;
        let p = participant();
        let enrollment = h
            .enrollment_service
            .apply(&p, 100, EnrollmentDetails::default(), now())
            .await
            .unwrap();

        let updated = h
            .enrollment_service
            .update_details(
                p.person_id,
                enrollment.id,
                EnrollmentDetails {
                    airport1: Some("LAX".into()),
                    check_in_date: Some(date(2025, 4, 30)),
                    check_out_date: Some(date(2025, 5, 6)),
                    ..Default::default()
                },
                now(),
            )
            .await
            .unwrap();
        assert_eq!(updated.details.airport1.as_deref(), Some("LAX"));
    }

    #[tokio::test]
    async fn test_withdraw_uses_institute_local_date() {
        // Program starts March 2; at 2025-03-02T05:00Z it is still March 1 in Pasadena
        let starting = program(100, None, date(2025, 3, 2));
        let h = harness(vec![starting.clone()]).await;
        let p = participant();
        let enrollment = domain_programs::Enrollment::from_invitation(&p, starting.id, now());
        h.enrollments.create_enrollment(&enrollment).await.unwrap();

        let at = Utc.with_ymd_and_hms(2025, 3, 2, 5, 0, 0).unwrap();
        let withdrawn = h
            .enrollment_service
            .withdraw(p.person_id, enrollment.id, Some("visa delay"), at)
            .await
            .unwrap();
        assert_eq!(withdrawn.status(), EnrollmentStatus::Declined);
        assert_eq!(
            withdrawn.declined_reason.as_deref(),
            Some("Withdrawn by participant: visa delay")
        );
    }

    #[tokio::test]
    async fn test_withdraw_after_start() {
        let started = program(100, None, date(2025, 2, 27));
        let h = harness(vec![started.clone()]).await;
        let p = participant();
        let enrollment = domain_programs::Enrollment::from_invitation(&p, started.id, now());
        h.enrollments.create_enrollment(&enrollment).await.unwrap();

        let result = h
            .enrollment_service
            .withdraw(p.person_id, enrollment.id, None, now())
            .await;
        assert!(matches!(result, Err(ProgramError::ProgramStarted)));
    }

    #[tokio::test]
    async fn test_overview_groups_enrollments() {
        let upcoming = program(1, None, date(2025, 4, 1));
        let past = program(2, None, date(2025, 1, 6));
        let applied = program(3, Some(now() + Duration::days(5)), date(2025, 6, 1));
        let h = harness(vec![upcoming.clone(), past.clone(), applied.clone()]).await;
        let p = participant();

        for prog in [&upcoming, &past] {
            let e = domain_programs::Enrollment::from_invitation(&p, prog.id, now());
            h.enrollments.create_enrollment(&e).await.unwrap();
        }
        h.enrollment_service
            .apply(&p, 3, EnrollmentDetails::default(), now())
            .await
            .unwrap();

        let overview = h.enrollment_service.overview(p.person_id, now()).await.unwrap();
        assert_eq!(overview.upcoming.len(), 1);
        assert_eq!(overview.upcoming[0].program.id, upcoming.id);
        assert_eq!(overview.past.len(), 1);
        assert_eq!(overview.past[0].program.id, past.id);
        assert_eq!(overview.pending_applications.len(), 1);
        assert_eq!(overview.pending_applications[0].program.id, applied.id);
    }
}

// ============================================================================
// Catalogue
// ============================================================================

mod catalogue_tests {
    use super::*;

    #[tokio::test]
    async fn test_open_programs_exclude_enrolled() {
        let a = program(1, Some(now() + Duration::days(3)), date(2025, 5, 1));
        let b = program(2, Some(now() + Duration::days(1)), date(2025, 6, 1));
        let closed = program(3, Some(now() - Duration::days(1)), date(2025, 6, 1));
        let h = harness(vec![a.clone(), b.clone(), closed]).await;
        let p = participant();

        let open = h.programs_service.open_programs_for(p.person_id, now(), 5).await.unwrap();
        let codes: Vec<i32> = open.iter().map(|p| p.code).collect();
        assert_eq!(codes, vec![2, 1]);

        h.enrollment_service
            .apply(&p, 2, EnrollmentDetails::default(), now())
            .await
            .unwrap();
        let open = h.programs_service.open_programs_for(p.person_id, now(), 5).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, a.id);
    }

    #[tokio::test]
    async fn test_create_program_requires_permission() {
        let h = harness(vec![]).await;
        let new = NewProgram {
            code: 5000,
            title: "Moduli of Curves".into(),
            abbreviation: Some("moduli".into()),
            program_type: ProgramType::Square,
            organizers: vec![],
            location: None,
            application_deadline: None,
            start_date: None,
            end_date: None,
            description: None,
            online: true,
        };

        let denied = h
            .programs_service
            .create_program(&Actor::participant(UserId::new(), None), new.clone())
            .await;
        assert!(matches!(denied, Err(ProgramError::PermissionDenied(_))));

        let created = h.programs_service.create_program(&staff(), new.clone()).await.unwrap();
        assert_eq!(h.programs_service.get_by_code(5000).await.unwrap().id, created.id);

        let duplicate = h.programs_service.create_program(&staff(), new).await;
        assert!(matches!(duplicate, Err(ProgramError::Validation(_))));
    }
}

// ============================================================================
// Invitations
// ============================================================================

mod invitation_tests {
    use super::*;

    async fn invited(h: &Harness, program_id: ProgramId, email: &str) -> String {
        h.invitation_service
            .invite(&staff(), program_id, email, None, now())
            .await
            .unwrap()
            .token
    }

    #[tokio::test]
    async fn test_accept_creates_accepted_enrollment() {
        let prog = program(100, Some(now() + Duration::days(10)), date(2025, 5, 1));
        let h = harness(vec![prog.clone()]).await;
        let token = invited(&h, prog.id, "ramanujan@example.org").await;
        let p = participant();

        let response = h
            .invitation_service
            .respond(&token, InvitationAction::Accept, Some(&p), now())
            .await
            .unwrap();

        let enrollment = response.enrollment.unwrap();
        assert!(!response.already_enrolled);
        assert_eq!(enrollment.status(), EnrollmentStatus::Accepted);
        assert_eq!(enrollment.source, EnrollmentSource::Invitation);
        assert_eq!(response.invitation.status, InvitationStatus::Accepted);
        assert_eq!(response.invitation.enrollment_id, Some(enrollment.id));
        assert_eq!(response.invitation.person_id, Some(p.person_id));
        assert_eq!(h.enrollments.enrollment_count().await, 1);
    }

    #[tokio::test]
    async fn test_accept_when_already_enrolled_links_existing() {
        let prog = program(100, Some(now() + Duration::days(10)), date(2025, 5, 1));
        let h = harness(vec![prog.clone()]).await;
        let p = participant();
        let existing = h
            .enrollment_service
            .apply(&p, 100, EnrollmentDetails::default(), now())
            .await
            .unwrap();
        let token = invited(&h, prog.id, "ramanujan@example.org").await;

        let response = h
            .invitation_service
            .respond(&token, InvitationAction::Accept, Some(&p), now())
            .await
            .unwrap();

        assert!(response.already_enrolled);
        assert_eq!(response.invitation.enrollment_id, Some(existing.id));
        assert_eq!(h.enrollments.enrollment_count().await, 1);
    }

    #[tokio::test]
    async fn test_decline_without_login() {
        let prog = program(100, Some(now() + Duration::days(10)), date(2025, 5, 1));
        let h = harness(vec![prog.clone()]).await;
        let token = invited(&h, prog.id, "someone@example.org").await;

        let response = h
            .invitation_service
            .respond(&token, InvitationAction::Decline, None, now())
            .await
            .unwrap();
        assert_eq!(response.invitation.status, InvitationStatus::Declined);

        let again = h
            .invitation_service
            .respond(&token, InvitationAction::Accept, Some(&participant()), now())
            .await;
        assert!(matches!(again, Err(ProgramError::AlreadyResponded(_))));
    }

    #[tokio::test]
    async fn test_accept_requires_login() {
        let prog = program(100, Some(now() + Duration::days(10)), date(2025, 5, 1));
        let h = harness(vec![prog.clone()]).await;
        let token = invited(&h, prog.id, "someone@example.org").await;

        let result = h
            .invitation_service
            .respond(&token, InvitationAction::Accept, None, now())
            .await;
        assert!(matches!(result, Err(ProgramError::LoginRequired)));
    }

    #[tokio::test]
    async fn test_expired_invitation() {
        let prog = program(100, Some(now() + Duration::days(1)), date(2025, 5, 1));
        let h = harness(vec![prog.clone()]).await;
        let token = invited(&h, prog.id, "someone@example.org").await;

        let later = now() + Duration::days(2);
        let result = h
            .invitation_service
            .respond(&token, InvitationAction::Decline, None, later)
            .await;
        assert!(matches!(result, Err(ProgramError::InvitationExpired)));
        assert!(h.invitation_service.lookup(&token, later).await.unwrap().expired);
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let h = harness(vec![]).await;
        let result = h
            .invitation_service
            .respond("nope", InvitationAction::Decline, None, now())
            .await;
        assert!(matches!(result, Err(ProgramError::InvitationNotFound)));
    }

    #[tokio::test]
    async fn test_invite_validation() {
        let closed = program(100, Some(now() - Duration::days(1)), date(2025, 5, 1));
        let h = harness(vec![closed.clone()]).await;

        let bad_email = h
            .invitation_service
            .invite(&staff(), closed.id, "not-an-email", None, now())
            .await;
        assert!(matches!(bad_email, Err(ProgramError::Validation(_))));

        let past_deadline = h
            .invitation_service
            .invite(&staff(), closed.id, "ok@example.org", None, now())
            .await;
        assert!(matches!(past_deadline, Err(ProgramError::Validation(_))));

        let denied = h
            .invitation_service
            .invite(&Actor::participant(UserId::new(), None), closed.id, "ok@example.org", None, now())
            .await;
        assert!(matches!(denied, Err(ProgramError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_pending_for_matches_email_case_insensitively() {
        let soon = program(1, Some(now() + Duration::days(2)), date(2025, 5, 1));
        let later = program(2, Some(now() + Duration::days(9)), date(2025, 6, 1));
        let h = harness(vec![soon.clone(), later.clone()]).await;
        let p = participant();

        invited(&h, later.id, "Ramanujan@Example.org").await;
        h.invitation_service
            .invite(&staff(), soon.id, "other@example.org", Some(p.person_id), now())
            .await
            .unwrap();
        invited(&h, soon.id, "unrelated@example.org").await;

        let pending = h
            .invitation_service
            .pending_for(p.person_id, p.email.as_deref(), now())
            .await
            .unwrap();
        let codes: Vec<i32> = pending.iter().map(|i| i.program.code).collect();
        assert_eq!(codes, vec![1, 2]);

        let after_first_deadline = h
            .invitation_service
            .pending_for(p.person_id, p.email.as_deref(), now() + Duration::days(3))
            .await
            .unwrap();
        assert_eq!(after_first_deadline.len(), 1);
    }

    /// Serves one stale read of an invitation, as a response racing
    /// another one would have seen it
    struct StaleFirstRead {
        inner: Arc<MockEnrollmentPort>,
        stale: Mutex<Option<ProgramInvitation>>,
    }

    impl DomainPort for StaleFirstRead {}

    #[async_trait]
    impl HealthCheckable for StaleFirstRead {
        async fn health_check(&self) -> HealthCheckResult {
            self.inner.health_check().await
        }
    }

    #[async_trait]
    impl EnrollmentPort for StaleFirstRead {
        async fn get_enrollment(&self, id: EnrollmentId) -> Result<Enrollment, PortError> {
            self.inner.get_enrollment(id).await
        }
        async fn find_enrollment(&self, person_id: PersonId, program_id: ProgramId) -> Result<Option<Enrollment>, PortError> {
            self.inner.find_enrollment(person_id, program_id).await
        }
        async fn list_for_person(&self, person_id: PersonId) -> Result<Vec<Enrollment>, PortError> {
            self.inner.list_for_person(person_id).await
        }
        async fn list_for_program(&self, program_id: ProgramId) -> Result<Vec<Enrollment>, PortError> {
            self.inner.list_for_program(program_id).await
        }
        async fn create_enrollment(&self, enrollment: &Enrollment) -> Result<Enrollment, PortError> {
            self.inner.create_enrollment(enrollment).await
        }
        async fn update_enrollment(&self, enrollment: &Enrollment) -> Result<Enrollment, PortError> {
            self.inner.update_enrollment(enrollment).await
        }
        async fn get_invitation_by_token(&self, token: &str) -> Result<Option<ProgramInvitation>, PortError> {
            let stale = self.stale.lock().unwrap().take();
            match stale {
                Some(invitation) => Ok(Some(invitation)),
                None => self.inner.get_invitation_by_token(token).await,
            }
        }
        async fn create_invitation(&self, invitation: &ProgramInvitation) -> Result<ProgramInvitation, PortError> {
            self.inner.create_invitation(invitation).await
        }
        async fn update_invitation(&self, invitation: &ProgramInvitation) -> Result<ProgramInvitation, PortError> {
            self.inner.update_invitation(invitation).await
        }
        async fn list_pending_invitations(
            &self,
            person_id: PersonId,
            email: Option<&str>,
        ) -> Result<Vec<ProgramInvitation>, PortError> {
            self.inner.list_pending_invitations(person_id, email).await
        }
        async fn accept_invitation(
            &self,
            invitation: &ProgramInvitation,
            new_enrollment: Option<&Enrollment>,
        ) -> Result<(), PortError> {
            self.inner.accept_invitation(invitation, new_enrollment).await
        }
    }

    #[tokio::test]
    async fn test_decline_racing_an_acceptance_is_rejected() {
        let prog = program(100, Some(now() + Duration::days(10)), date(2025, 5, 1));
        let h = harness(vec![prog.clone()]).await;
        let token = invited(&h, prog.id, "ramanujan@example.org").await;
        let pending = h.enrollments.get_invitation_by_token(&token).await.unwrap().unwrap();

        h.invitation_service
            .respond(&token, InvitationAction::Accept, Some(&participant()), now())
            .await
            .unwrap();

        let racing = StaleFirstRead {
            inner: h.enrollments.clone(),
            stale: Mutex::new(Some(pending)),
        };
        let program_port = Arc::new(MockProgramPort::with_programs(vec![prog]).await);
        let service = InvitationService::new(program_port, Arc::new(racing));

        let result = service.respond(&token, InvitationAction::Decline, None, now()).await;
        assert!(matches!(result, Err(ProgramError::AlreadyResponded(ref s)) if s == "accepted"));

        let stored = h.enrollments.get_invitation_by_token(&token).await.unwrap().unwrap();
        assert_eq!(stored.status, InvitationStatus::Accepted);
        assert_eq!(h.enrollments.enrollment_count().await, 1);
    }

    #[tokio::test]
    async fn test_accept_racing_a_decline_creates_no_enrollment() {
        let prog = program(100, Some(now() + Duration::days(10)), date(2025, 5, 1));
        let h = harness(vec![prog.clone()]).await;
        let token = invited(&h, prog.id, "ramanujan@example.org").await;
        let pending = h.enrollments.get_invitation_by_token(&token).await.unwrap().unwrap();

        h.invitation_service
            .respond(&token, InvitationAction::Decline, None, now())
            .await
            .unwrap();

        let racing = StaleFirstRead {
            inner: h.enrollments.clone(),
            stale: Mutex::new(Some(pending)),
        };
        let program_port = Arc::new(MockProgramPort::with_programs(vec![prog]).await);
        let service = InvitationService::new(program_port, Arc::new(racing));

        let result = service
            .respond(&token, InvitationAction::Accept, Some(&participant()), now())
            .await;
        assert!(matches!(result, Err(ProgramError::AlreadyResponded(ref s)) if s == "declined"));
        assert_eq!(h.enrollments.enrollment_count().await, 0);
    }
}
