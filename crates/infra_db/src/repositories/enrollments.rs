//! Enrollment and invitation repository

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseError;

const ENROLLMENT_COLUMNS: &str = r#"
    enrollment_id, person_id, program_id, source, first_name, middle_name, last_name,
    email_snapshot, orcid_snapshot, institution, accepted_at, declined_at, declined_reason,
    check_in_date, check_out_date, phone_number, mailing_address, notes, airport1, airport2,
    funding, created_at, updated_at
"#;

const INVITATION_COLUMNS: &str = r#"
    invitation_id, program_id, email, person_id, token, status, invited_by,
    enrollment_id, created_at, accepted_at, declined_at
"#;

/// Repository for enrollments and program invitations
#[derive(Debug, Clone)]
pub struct EnrollmentRepository {
    pool: PgPool,
}

impl EnrollmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Enrollments
    // ========================================================================

    pub async fn get_enrollment(&self, enrollment_id: Uuid) -> Result<EnrollmentRow, DatabaseError> {
        sqlx::query_as::<_, EnrollmentRow>(&format!(
            "SELECT {} FROM enrollments WHERE enrollment_id = $1",
            ENROLLMENT_COLUMNS
        ))
        .bind(enrollment_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Enrollment", enrollment_id))
    }

    pub async fn find_enrollment(
        &self,
        person_id: Uuid,
        program_id: Uuid,
    ) -> Result<Option<EnrollmentRow>, DatabaseError> {
        let row = sqlx::query_as::<_, EnrollmentRow>(&format!(
            "SELECT {} FROM enrollments WHERE person_id = $1 AND program_id = $2",
            ENROLLMENT_COLUMNS
        ))
        .bind(person_id)
        .bind(program_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_for_person(&self, person_id: Uuid) -> Result<Vec<EnrollmentRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, EnrollmentRow>(&format!(
            "SELECT {} FROM enrollments WHERE person_id = $1 ORDER BY created_at DESC",
            ENROLLMENT_COLUMNS
        ))
        .bind(person_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_for_program(&self, program_id: Uuid) -> Result<Vec<EnrollmentRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, EnrollmentRow>(&format!(
            "SELECT {} FROM enrollments WHERE program_id = $1 ORDER BY last_name, first_name",
            ENROLLMENT_COLUMNS
        ))
        .bind(program_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn insert_enrollment(&self, enrollment: &EnrollmentRow) -> Result<EnrollmentRow, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        insert_enrollment(&mut conn, enrollment).await
    }

    pub async fn update_enrollment(&self, enrollment: &EnrollmentRow) -> Result<EnrollmentRow, DatabaseError> {
        sqlx::query_as::<_, EnrollmentRow>(&format!(
            r#"
            UPDATE enrollments SET
                first_name = $2, middle_name = $3, last_name = $4, email_snapshot = $5,
                orcid_snapshot = $6, institution = $7, accepted_at = $8, declined_at = $9,
                declined_reason = $10, check_in_date = $11, check_out_date = $12,
                phone_number = $13, mailing_address = $14, notes = $15, airport1 = $16,
                airport2 = $17, funding = $18, updated_at = $19
            WHERE enrollment_id = $1
            RETURNING {}
            "#,
            ENROLLMENT_COLUMNS
        ))
        .bind(enrollment.enrollment_id)
        .bind(&enrollment.first_name)
        .bind(&enrollment.middle_name)
        .bind(&enrollment.last_name)
        .bind(&enrollment.email_snapshot)
        .bind(&enrollment.orcid_snapshot)
        .bind(&enrollment.institution)
        .bind(enrollment.accepted_at)
        .bind(enrollment.declined_at)
        .bind(&enrollment.declined_reason)
        .bind(enrollment.check_in_date)
        .bind(enrollment.check_out_date)
        .bind(&enrollment.phone_number)
        .bind(&enrollment.mailing_address)
        .bind(&enrollment.notes)
        .bind(&enrollment.airport1)
        .bind(&enrollment.airport2)
        .bind(&enrollment.funding)
        .bind(enrollment.updated_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Enrollment", enrollment.enrollment_id))
    }

    // ========================================================================
    // Invitations
    // ========================================================================

    pub async fn get_invitation_by_token(&self, token: &str) -> Result<Option<InvitationRow>, DatabaseError> {
        let row = sqlx::query_as::<_, InvitationRow>(&format!(
            "SELECT {} FROM program_invitations WHERE token = $1",
            INVITATION_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn insert_invitation(&self, invitation: &InvitationRow) -> Result<InvitationRow, DatabaseError> {
        let row = sqlx::query_as::<_, InvitationRow>(&format!(
            r#"
            INSERT INTO program_invitations (
                invitation_id, program_id, email, person_id, token, status, invited_by,
                enrollment_id, created_at, accepted_at, declined_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            INVITATION_COLUMNS
        ))
        .bind(invitation.invitation_id)
        .bind(invitation.program_id)
        .bind(&invitation.email)
        .bind(invitation.person_id)
        .bind(&invitation.token)
        .bind(invitation.status)
        .bind(invitation.invited_by)
        .bind(invitation.enrollment_id)
        .bind(invitation.created_at)
        .bind(invitation.accepted_at)
        .bind(invitation.declined_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Records the response to a pending invitation
    ///
    /// Returns `VersionConflict` if the stored invitation has already been
    /// answered.
    pub async fn update_invitation(&self, invitation: &InvitationRow) -> Result<InvitationRow, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        update_invitation(&mut conn, invitation).await
    }

    /// Pending invitations for a person, or addressed to their email
    pub async fn list_pending_invitations(
        &self,
        person_id: Uuid,
        email: Option<&str>,
    ) -> Result<Vec<InvitationRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, InvitationRow>(&format!(
            r#"
            SELECT {} FROM program_invitations
            WHERE status = 'pending'
              AND (person_id = $1 OR ($2::text IS NOT NULL AND lower(email) = lower($2)))
            ORDER BY created_at DESC
            "#,
            INVITATION_COLUMNS
        ))
        .bind(person_id)
        .bind(email.map(str::trim))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Inserts the enrollment (when given) and saves the accepted
    /// invitation in a single transaction
    ///
    /// Nothing is written if the invitation was answered in the meantime.
    pub async fn accept_invitation(
        &self,
        invitation: &InvitationRow,
        enrollment: Option<&EnrollmentRow>,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        if let Some(enrollment) = enrollment {
            insert_enrollment(&mut tx, enrollment).await?;
        }
        update_invitation(&mut tx, invitation).await?;

        tx.commit().await?;
        Ok(())
    }
}

async fn insert_enrollment(
    conn: &mut sqlx::PgConnection,
    enrollment: &EnrollmentRow,
) -> Result<EnrollmentRow, DatabaseError> {
    sqlx::query_as::<_, EnrollmentRow>(&format!(
        r#"
        INSERT INTO enrollments (
            enrollment_id, person_id, program_id, source, first_name, middle_name, last_name,
            email_snapshot, orcid_snapshot, institution, accepted_at, declined_at, declined_reason,
            check_in_date, check_out_date, phone_number, mailing_address, notes, airport1, airport2,
            funding, created_at, updated_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
            $17, $18, $19, $20, $21, $22, $23
        )
        RETURNING {}
        "#,
        ENROLLMENT_COLUMNS
    ))
    .bind(enrollment.enrollment_id)
    .bind(enrollment.person_id)
    .bind(enrollment.program_id)
    .bind(enrollment.source)
    .bind(&enrollment.first_name)
    .bind(&enrollment.middle_name)
    .bind(&enrollment.last_name)
    .bind(&enrollment.email_snapshot)
    .bind(&enrollment.orcid_snapshot)
    .bind(&enrollment.institution)
    .bind(enrollment.accepted_at)
    .bind(enrollment.declined_at)
    .bind(&enrollment.declined_reason)
    .bind(enrollment.check_in_date)
    .bind(enrollment.check_out_date)
    .bind(&enrollment.phone_number)
    .bind(&enrollment.mailing_address)
    .bind(&enrollment.notes)
    .bind(&enrollment.airport1)
    .bind(&enrollment.airport2)
    .bind(&enrollment.funding)
    .bind(enrollment.created_at)
    .bind(enrollment.updated_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| match DatabaseError::from(&e) {
        DatabaseError::DuplicateEntry(_) => {
            DatabaseError::DuplicateEntry("person is already enrolled in this program".to_string())
        }
        other => other,
    })
}

async fn update_invitation(
    conn: &mut sqlx::PgConnection,
    invitation: &InvitationRow,
) -> Result<InvitationRow, DatabaseError> {
    sqlx::query_as::<_, InvitationRow>(&format!(
        r#"
        UPDATE program_invitations SET
            person_id = $2, status = $3, enrollment_id = $4, accepted_at = $5, declined_at = $6
        WHERE invitation_id = $1 AND status = 'pending'
        RETURNING {}
        "#,
        INVITATION_COLUMNS
    ))
    .bind(invitation.invitation_id)
    .bind(invitation.person_id)
    .bind(invitation.status)
    .bind(invitation.enrollment_id)
    .bind(invitation.accepted_at)
    .bind(invitation.declined_at)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| {
        DatabaseError::VersionConflict(format!(
            "invitation {} has already been answered",
            invitation.invitation_id
        ))
    })
}

/// Database enum for how an enrollment came about
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "enrollment_source", rename_all = "snake_case")]
pub enum EnrollmentSource {
    Invitation,
    Application,
    Staff,
}

/// Database enum for invitation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "invitation_status", rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

/// Row from the `enrollments` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EnrollmentRow {
    pub enrollment_id: Uuid,
    pub person_id: Uuid,
    pub program_id: Uuid,
    pub source: EnrollmentSource,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub email_snapshot: Option<String>,
    pub orcid_snapshot: Option<String>,
    pub institution: Option<String>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub declined_at: Option<DateTime<Utc>>,
    pub declined_reason: Option<String>,
    pub check_in_date: Option<NaiveDate>,
    pub check_out_date: Option<NaiveDate>,
    pub phone_number: Option<String>,
    pub mailing_address: Option<String>,
    pub notes: Option<String>,
    pub airport1: Option<String>,
    pub airport2: Option<String>,
    pub funding: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row from the `program_invitations` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InvitationRow {
    pub invitation_id: Uuid,
    pub program_id: Uuid,
    pub email: String,
    pub person_id: Option<Uuid>,
    pub token: String,
    pub status: InvitationStatus,
    pub invited_by: Option<Uuid>,
    pub enrollment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub declined_at: Option<DateTime<Utc>>,
}
