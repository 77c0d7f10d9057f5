//! Domain services wired to in-memory ports

use std::sync::Arc;

use domain_people::{MockPeoplePort, PeopleService};
use domain_programs::{
    EnrollmentService, InvitationService, MockEnrollmentPort, MockProgramPort, Program, ProgramService,
};
use domain_reimbursements::{MockReimbursementPort, ReimbursementService};

use crate::fixtures::TEST_CLOCK;

/// Every service over shared mock ports
///
/// The mocks are kept so tests can seed or inspect storage directly.
pub struct TestServices {
    pub people_port: MockPeoplePort,
    pub program_port: MockProgramPort,
    pub enrollment_port: MockEnrollmentPort,
    pub reimbursement_port: MockReimbursementPort,
    pub people: PeopleService,
    pub programs: ProgramService,
    pub enrollments: EnrollmentService,
    pub invitations: InvitationService,
    pub reimbursements: ReimbursementService,
}

impl TestServices {
    pub async fn new() -> Self {
        Self::with_programs(Vec::new()).await
    }

    pub async fn with_programs(programs: Vec<Program>) -> Self {
        let people_port = MockPeoplePort::new();
        let program_port = MockProgramPort::with_programs(programs).await;
        let enrollment_port = MockEnrollmentPort::new();
        let reimbursement_port = MockReimbursementPort::new();

        Self {
            people: PeopleService::new(Arc::new(people_port.clone())),
            programs: ProgramService::new(
                Arc::new(program_port.clone()),
                Arc::new(enrollment_port.clone()),
                *TEST_CLOCK,
            ),
            enrollments: EnrollmentService::new(
                Arc::new(program_port.clone()),
                Arc::new(enrollment_port.clone()),
                *TEST_CLOCK,
            ),
            invitations: InvitationService::new(Arc::new(program_port.clone()), Arc::new(enrollment_port.clone())),
            reimbursements: ReimbursementService::new(Arc::new(reimbursement_port.clone())),
            people_port,
            program_port,
            enrollment_port,
            reimbursement_port,
        }
    }
}
