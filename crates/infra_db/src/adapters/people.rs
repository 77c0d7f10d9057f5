//! PostgreSQL People Adapter
//!
//! Implements `PeoplePort` on top of [`PeopleRepository`].

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument, warn};

use core_kernel::{
    DomainPort, HealthCheckResult, HealthCheckable, Permission, PersonId, PortError, UserId,
    UserProfileId,
};
use domain_people::{LoginLink, PeoplePort, Person, UserAccount, UserProfile};

use crate::repositories::people::{PeopleRepository, PersonRow, ProfileRow, UserRow};

/// PostgreSQL-backed implementation of the PeoplePort trait
#[derive(Debug, Clone)]
pub struct PostgresPeopleAdapter {
    repository: PeopleRepository,
    pool: PgPool,
}

impl PostgresPeopleAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: PeopleRepository::new(pool.clone()),
            pool,
        }
    }

    /// Returns a reference to the underlying repository
    pub fn repository(&self) -> &PeopleRepository {
        &self.repository
    }
}

impl DomainPort for PostgresPeopleAdapter {}

#[async_trait]
impl HealthCheckable for PostgresPeopleAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        super::check_pool(&self.pool, "postgres-people-adapter").await
    }
}

#[async_trait]
impl PeoplePort for PostgresPeopleAdapter {
    #[instrument(skip(self), fields(person_id = %id))]
    async fn get_person(&self, id: PersonId) -> Result<Person, PortError> {
        debug!("Fetching person");
        let row = self.repository.get_person(*id.as_uuid()).await?;
        Ok(row_to_person(row))
    }

    #[instrument(skip(self))]
    async fn find_person_by_email(&self, email: &str) -> Result<Option<Person>, PortError> {
        let row = self.repository.find_person_by_email(email).await?;
        Ok(row.map(row_to_person))
    }

    #[instrument(skip(self))]
    async fn find_person_by_orcid(&self, orcid_id: &str) -> Result<Option<Person>, PortError> {
        let row = self.repository.find_person_by_orcid(orcid_id).await?;
        Ok(row.map(row_to_person))
    }

    #[instrument(skip(self, person), fields(person_id = %person.id))]
    async fn create_person(&self, person: &Person) -> Result<Person, PortError> {
        debug!("Creating person");
        let row = self.repository.insert_person(&person_to_row(person)).await?;
        Ok(row_to_person(row))
    }

    #[instrument(skip(self, person), fields(person_id = %person.id))]
    async fn update_person(&self, person: &Person) -> Result<Person, PortError> {
        debug!("Updating person");
        let row = self.repository.update_person(&person_to_row(person)).await?;
        Ok(row_to_person(row))
    }

    #[instrument(skip(self), fields(user_id = %id))]
    async fn get_user(&self, id: UserId) -> Result<UserAccount, PortError> {
        let row = self.repository.get_user(*id.as_uuid()).await?;
        Ok(row_to_user(row))
    }

    #[instrument(skip(self))]
    async fn find_user_by_orcid(&self, orcid_id: &str) -> Result<Option<UserAccount>, PortError> {
        let row = self.repository.find_user_by_orcid(orcid_id).await?;
        Ok(row.map(row_to_user))
    }

    #[instrument(skip(self))]
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, PortError> {
        let row = self.repository.find_user_by_email(email).await?;
        Ok(row.map(row_to_user))
    }

    #[instrument(skip(self, user), fields(username = %user.username))]
    async fn create_user(&self, user: &UserAccount) -> Result<UserAccount, PortError> {
        debug!("Creating user account");
        let row = self.repository.insert_user(&user_to_row(user)).await?;
        Ok(row_to_user(row))
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn get_profile_for_user(&self, user_id: UserId) -> Result<Option<UserProfile>, PortError> {
        let row = self.repository.get_profile_for_user(*user_id.as_uuid()).await?;
        Ok(row.map(row_to_profile))
    }

    #[instrument(skip(self, link), fields(user_id = %link.user.id, person_id = %link.person.id))]
    async fn save_login(&self, link: &LoginLink) -> Result<(), PortError> {
        debug!(
            user_created = link.user_created,
            person_created = link.person_created,
            "Saving login"
        );
        self.repository
            .save_login(
                &user_to_row(&link.user),
                link.user_created,
                &person_to_row(&link.person),
                link.person_created,
                &profile_to_row(&link.profile),
            )
            .await?;
        Ok(())
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn row_to_person(row: PersonRow) -> Person {
    Person {
        id: PersonId::from_uuid(row.person_id),
        first_name: row.first_name,
        middle_name: row.middle_name,
        last_name: row.last_name,
        preferred_name: row.preferred_name,
        email: row.email,
        mailing_address: row.mailing_address,
        phone_number: row.phone_number,
        orcid_id: row.orcid_id,
        home_page: row.home_page,
        math_review_id: row.math_review_id,
        institution: row.institution,
        dietary_restrictions: row.dietary_restrictions,
        gender: row.gender,
        ethnicity: row.ethnicity,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn person_to_row(person: &Person) -> PersonRow {
    PersonRow {
        person_id: *person.id.as_uuid(),
        first_name: person.first_name.clone(),
        middle_name: person.middle_name.clone(),
        last_name: person.last_name.clone(),
        preferred_name: person.preferred_name.clone(),
        email: person.email.clone(),
        mailing_address: person.mailing_address.clone(),
        phone_number: person.phone_number.clone(),
        orcid_id: person.orcid_id.clone(),
        home_page: person.home_page.clone(),
        math_review_id: person.math_review_id.clone(),
        institution: person.institution.clone(),
        dietary_restrictions: person.dietary_restrictions.clone(),
        gender: person.gender.clone(),
        ethnicity: person.ethnicity.clone(),
        created_at: person.created_at,
        updated_at: person.updated_at,
    }
}

fn row_to_user(row: UserRow) -> UserAccount {
    let permissions = row
        .permissions
        .iter()
        .filter_map(|p| match p.parse::<Permission>() {
            Ok(permission) => Some(permission),
            Err(e) => {
                warn!(user_id = %row.user_id, "Ignoring stored permission: {}", e);
                None
            }
        })
        .collect();

    UserAccount {
        id: UserId::from_uuid(row.user_id),
        username: row.username,
        email: row.email,
        first_name: row.first_name,
        last_name: row.last_name,
        is_active: row.is_active,
        is_staff: row.is_staff,
        is_superuser: row.is_superuser,
        permissions,
        orcid_id: row.orcid_id,
        date_joined: row.date_joined,
        last_login: row.last_login,
    }
}

fn user_to_row(user: &UserAccount) -> UserRow {
    UserRow {
        user_id: *user.id.as_uuid(),
        username: user.username.clone(),
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        is_active: user.is_active,
        is_staff: user.is_staff,
        is_superuser: user.is_superuser,
        permissions: user.permissions.iter().map(|p| p.as_str().to_string()).collect(),
        orcid_id: user.orcid_id.clone(),
        date_joined: user.date_joined,
        last_login: user.last_login,
    }
}

fn row_to_profile(row: ProfileRow) -> UserProfile {
    UserProfile {
        id: UserProfileId::from_uuid(row.profile_id),
        user_id: UserId::from_uuid(row.user_id),
        person_id: PersonId::from_uuid(row.person_id),
        email_verified: row.email_verified,
        created_at: row.created_at,
        last_login_at: row.last_login_at,
    }
}

fn profile_to_row(profile: &UserProfile) -> ProfileRow {
    ProfileRow {
        profile_id: *profile.id.as_uuid(),
        user_id: *profile.user_id.as_uuid(),
        person_id: *profile.person_id.as_uuid(),
        email_verified: profile.email_verified,
        created_at: profile.created_at,
        last_login_at: profile.last_login_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions_round_trip_through_text() {
        let mut user = UserAccount::new("reviewer", Some("r@aimath.org".into()));
        user.is_staff = true;
        user.permissions.insert(Permission::ReviewReimbursements);
        user.permissions.insert(Permission::MarkReimbursementsPaid);

        let row = user_to_row(&user);
        assert_eq!(
            row.permissions,
            vec!["reimbursements:review".to_string(), "reimbursements:mark_paid".to_string()]
        );
        assert_eq!(row_to_user(row), user);
    }

    #[test]
    fn test_unknown_stored_permission_is_dropped() {
        let mut row = user_to_row(&UserAccount::new("u", None));
        row.permissions = vec!["newsletter:send".into(), "programs:manage".into()];
        let user = row_to_user(row);
        assert_eq!(user.permissions.len(), 1);
        assert!(user.permissions.contains(&Permission::ManagePrograms));
    }
}
