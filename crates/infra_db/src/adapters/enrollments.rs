//! PostgreSQL Enrollment Adapter
//!
//! Implements `EnrollmentPort` for enrollments and program invitations.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{
    DomainPort, EnrollmentId, HealthCheckResult, HealthCheckable, InvitationId, PersonId,
    PortError, ProgramId, UserId,
};
use domain_programs::{
    Enrollment, EnrollmentDetails, EnrollmentPort, EnrollmentSource, InvitationStatus,
    ProgramInvitation,
};

use crate::repositories::enrollments::{
    EnrollmentRepository, EnrollmentRow, EnrollmentSource as DbEnrollmentSource, InvitationRow,
    InvitationStatus as DbInvitationStatus,
};

/// PostgreSQL-backed implementation of the EnrollmentPort trait
#[derive(Debug, Clone)]
pub struct PostgresEnrollmentAdapter {
    repository: EnrollmentRepository,
    pool: PgPool,
}

impl PostgresEnrollmentAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: EnrollmentRepository::new(pool.clone()),
            pool,
        }
    }
}

impl DomainPort for PostgresEnrollmentAdapter {}

#[async_trait]
impl HealthCheckable for PostgresEnrollmentAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        super::check_pool(&self.pool, "postgres-enrollment-adapter").await
    }
}

#[async_trait]
impl EnrollmentPort for PostgresEnrollmentAdapter {
    #[instrument(skip(self), fields(enrollment_id = %id))]
    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Enrollment, PortError> {
        let row = self.repository.get_enrollment(*id.as_uuid()).await?;
        Ok(row_to_enrollment(row))
    }

    #[instrument(skip(self), fields(person_id = %person_id, program_id = %program_id))]
    async fn find_enrollment(
        &self,
        person_id: PersonId,
        program_id: ProgramId,
    ) -> Result<Option<Enrollment>, PortError> {
        let row = self
            .repository
            .find_enrollment(*person_id.as_uuid(), *program_id.as_uuid())
            .await?;
        Ok(row.map(row_to_enrollment))
    }

    #[instrument(skip(self), fields(person_id = %person_id))]
    async fn list_for_person(&self, person_id: PersonId) -> Result<Vec<Enrollment>, PortError> {
        let rows = self.repository.list_for_person(*person_id.as_uuid()).await?;
        Ok(rows.into_iter().map(row_to_enrollment).collect())
    }

    #[instrument(skip(self), fields(program_id = %program_id))]
    async fn list_for_program(&self, program_id: ProgramId) -> Result<Vec<Enrollment>, PortError> {
        let rows = self.repository.list_for_program(*program_id.as_uuid()).await?;
        Ok(rows.into_iter().map(row_to_enrollment).collect())
    }

    #[instrument(skip(self, enrollment), fields(enrollment_id = %enrollment.id))]
    async fn create_enrollment(&self, enrollment: &Enrollment) -> Result<Enrollment, PortError> {
        debug!("Creating enrollment");
        let row = self.repository.insert_enrollment(&enrollment_to_row(enrollment)).await?;
        Ok(row_to_enrollment(row))
    }

    #[instrument(skip(self, enrollment), fields(enrollment_id = %enrollment.id))]
    async fn update_enrollment(&self, enrollment: &Enrollment) -> Result<Enrollment, PortError> {
        debug!("Updating enrollment");
        let row = self.repository.update_enrollment(&enrollment_to_row(enrollment)).await?;
        Ok(row_to_enrollment(row))
    }

    #[instrument(skip(self, token))]
    async fn get_invitation_by_token(&self, token: &str) -> Result<Option<ProgramInvitation>, PortError> {
        let row = self.repository.get_invitation_by_token(token).await?;
        Ok(row.map(row_to_invitation))
    }

    #[instrument(skip(self, invitation), fields(invitation_id = %invitation.id))]
    async fn create_invitation(&self, invitation: &ProgramInvitation) -> Result<ProgramInvitation, PortError> {
        debug!("Creating invitation");
        let row = self.repository.insert_invitation(&invitation_to_row(invitation)).await?;
        Ok(row_to_invitation(row))
    }

    #[instrument(skip(self, invitation), fields(invitation_id = %invitation.id))]
    async fn update_invitation(&self, invitation: &ProgramInvitation) -> Result<ProgramInvitation, PortError> {
        let row = self.repository.update_invitation(&invitation_to_row(invitation)).await?;
        Ok(row_to_invitation(row))
    }

    #[instrument(skip(self, email), fields(person_id = %person_id))]
    async fn list_pending_invitations(
        &self,
        person_id: PersonId,
        email: Option<&str>,
    ) -> Result<Vec<ProgramInvitation>, PortError> {
        let rows = self
            .repository
            .list_pending_invitations(*person_id.as_uuid(), email)
            .await?;
        Ok(rows.into_iter().map(row_to_invitation).collect())
    }

    #[instrument(skip(self, invitation, new_enrollment), fields(invitation_id = %invitation.id))]
    async fn accept_invitation(
        &self,
        invitation: &ProgramInvitation,
        new_enrollment: Option<&Enrollment>,
    ) -> Result<(), PortError> {
        debug!(creates_enrollment = new_enrollment.is_some(), "Accepting invitation");
        let enrollment_row = new_enrollment.map(enrollment_to_row);
        self.repository
            .accept_invitation(&invitation_to_row(invitation), enrollment_row.as_ref())
            .await?;
        Ok(())
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn row_to_enrollment(row: EnrollmentRow) -> Enrollment {
    Enrollment {
        id: EnrollmentId::from_uuid(row.enrollment_id),
        person_id: PersonId::from_uuid(row.person_id),
        program_id: ProgramId::from_uuid(row.program_id),
        source: match row.source {
            DbEnrollmentSource::Invitation => EnrollmentSource::Invitation,
            DbEnrollmentSource::Application => EnrollmentSource::Application,
            DbEnrollmentSource::Staff => EnrollmentSource::Staff,
        },
        first_name: row.first_name,
        middle_name: row.middle_name,
        last_name: row.last_name,
        email_snapshot: row.email_snapshot,
        orcid_snapshot: row.orcid_snapshot,
        institution: row.institution,
        accepted_at: row.accepted_at,
        declined_at: row.declined_at,
        declined_reason: row.declined_reason,
        details: EnrollmentDetails {
            check_in_date: row.check_in_date,
            check_out_date: row.check_out_date,
            phone_number: row.phone_number,
            mailing_address: row.mailing_address,
            notes: row.notes,
            airport1: row.airport1,
            airport2: row.airport2,
            funding: row.funding,
        },
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn enrollment_to_row(enrollment: &Enrollment) -> EnrollmentRow {
    let details = &enrollment.details;
    EnrollmentRow {
        enrollment_id: *enrollment.id.as_uuid(),
        person_id: *enrollment.person_id.as_uuid(),
        program_id: *enrollment.program_id.as_uuid(),
        source: match enrollment.source {
            EnrollmentSource::Invitation => DbEnrollmentSource::Invitation,
            EnrollmentSource::Application => DbEnrollmentSource::Application,
            EnrollmentSource::Staff => DbEnrollmentSource::Staff,
        },
        first_name: enrollment.first_name.clone(),
        middle_name: enrollment.middle_name.clone(),
        last_name: enrollment.last_name.clone(),
        email_snapshot: enrollment.email_snapshot.clone(),
        orcid_snapshot: enrollment.orcid_snapshot.clone(),
        institution: enrollment.institution.clone(),
        accepted_at: enrollment.accepted_at,
        declined_at: enrollment.declined_at,
        declined_reason: enrollment.declined_reason.clone(),
        check_in_date: details.check_in_date,
        check_out_date: details.check_out_date,
        phone_number: details.phone_number.clone(),
        mailing_address: details.mailing_address.clone(),
        notes: details.notes.clone(),
        airport1: details.airport1.clone(),
        airport2: details.airport2.clone(),
        funding: details.funding.clone(),
        created_at: enrollment.created_at,
        updated_at: enrollment.updated_at,
    }
}

fn row_to_invitation(row: InvitationRow) -> ProgramInvitation {
    ProgramInvitation {
        id: InvitationId::from_uuid(row.invitation_id),
        program_id: ProgramId::from_uuid(row.program_id),
        email: row.email,
        person_id: row.person_id.map(PersonId::from_uuid),
        token: row.token,
        status: match row.status {
            DbInvitationStatus::Pending => InvitationStatus::Pending,
            DbInvitationStatus::Accepted => InvitationStatus::Accepted,
            DbInvitationStatus::Declined => InvitationStatus::Declined,
        },
        invited_by: row.invited_by.map(UserId::from_uuid),
        enrollment_id: row.enrollment_id.map(EnrollmentId::from_uuid),
        created_at: row.created_at,
        accepted_at: row.accepted_at,
        declined_at: row.declined_at,
    }
}

fn invitation_to_row(invitation: &ProgramInvitation) -> InvitationRow {
    InvitationRow {
        invitation_id: *invitation.id.as_uuid(),
        program_id: *invitation.program_id.as_uuid(),
        email: invitation.email.clone(),
        person_id: invitation.person_id.map(|id| *id.as_uuid()),
        token: invitation.token.clone(),
        status: match invitation.status {
            InvitationStatus::Pending => DbInvitationStatus::Pending,
            InvitationStatus::Accepted => DbInvitationStatus::Accepted,
            InvitationStatus::Declined => DbInvitationStatus::Declined,
        },
        invited_by: invitation.invited_by.map(|id| *id.as_uuid()),
        enrollment_id: invitation.enrollment_id.map(|id| *id.as_uuid()),
        created_at: invitation.created_at,
        accepted_at: invitation.accepted_at,
        declined_at: invitation.declined_at,
    }
}
