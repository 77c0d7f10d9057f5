//! People Domain Ports
//!
//! `PeoplePort` is the storage seam for persons, accounts and profiles.
//! `infra_db` implements it on PostgreSQL; the [`mock`] module provides an
//! in-memory adapter for tests.
//!
//! Email lookups are case-insensitive in every implementation.

use async_trait::async_trait;

use core_kernel::{DomainPort, HealthCheckable, PersonId, PortError, UserId};

use crate::account::{UserAccount, UserProfile};
use crate::person::Person;

/// Result of resolving an ORCID sign-in
///
/// Persisted as a unit by [`PeoplePort::save_login`] so a sign-in never
/// leaves an account without its person or profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginLink {
    pub user: UserAccount,
    pub person: Person,
    pub profile: UserProfile,
    /// The account was created by this sign-in
    pub user_created: bool,
    /// The person record was created by this sign-in
    pub person_created: bool,
}

/// The port trait for people domain storage
#[async_trait]
pub trait PeoplePort: DomainPort + HealthCheckable {
    // ========================================================================
    // Persons
    // ========================================================================

    /// Retrieves a person by ID, or `PortError::NotFound`
    async fn get_person(&self, id: PersonId) -> Result<Person, PortError>;

    /// Finds the person with this email (case-insensitive)
    async fn find_person_by_email(&self, email: &str) -> Result<Option<Person>, PortError>;

    /// Finds the person with this ORCID iD
    async fn find_person_by_orcid(&self, orcid_id: &str) -> Result<Option<Person>, PortError>;

    /// Inserts a new person
    ///
    /// # Returns
    ///
    /// The stored person, or `PortError::Conflict` if the email or ORCID iD
    /// is taken
    async fn create_person(&self, person: &Person) -> Result<Person, PortError>;

    /// Overwrites an existing person
    async fn update_person(&self, person: &Person) -> Result<Person, PortError>;

    // ========================================================================
    // Accounts and profiles
    // ========================================================================

    async fn get_user(&self, id: UserId) -> Result<UserAccount, PortError>;

    /// Finds the account whose social login carries this ORCID iD
    async fn find_user_by_orcid(&self, orcid_id: &str) -> Result<Option<UserAccount>, PortError>;

    /// Finds the account with this email (case-insensitive)
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, PortError>;

    /// Inserts a new account (used for provisioning staff)
    async fn create_user(&self, user: &UserAccount) -> Result<UserAccount, PortError>;

    /// Retrieves the profile of an account, if it has one
    async fn get_profile_for_user(&self, user_id: UserId) -> Result<Option<UserProfile>, PortError>;

    /// Persists an ORCID sign-in atomically
    ///
    /// Inserts or updates the account, the person and the profile in one
    /// unit of work.
    async fn save_login(&self, link: &LoginLink) -> Result<(), PortError>;
}

/// Mock implementation of PeoplePort for testing
///
/// Enforces the same uniqueness rules as the database: one profile per
/// account, unique person email (case-insensitive) and unique ORCID iD.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    use core_kernel::HealthCheckResult;
    use crate::validation::same_email;

    #[derive(Debug, Default)]
    struct Store {
        persons: HashMap<PersonId, Person>,
        users: HashMap<UserId, UserAccount>,
        profiles: HashMap<UserId, UserProfile>,
    }

    impl Store {
        fn person_conflict(&self, person: &Person) -> Option<PortError> {
            self.persons.values().filter(|p| p.id != person.id).find_map(|other| {
                if let (Some(a), Some(b)) = (&person.email, &other.email) {
                    if same_email(a, b) {
                        return Some(PortError::conflict(format!("email {} already in use", a)));
                    }
                }
                if person.orcid_id.is_some() && person.orcid_id == other.orcid_id {
                    return Some(PortError::conflict("ORCID iD already in use"));
                }
                None
            })
        }
    }

    /// In-memory mock implementation of PeoplePort
    #[derive(Debug, Default, Clone)]
    pub struct MockPeoplePort {
        store: Arc<RwLock<Store>>,
    }

    impl MockPeoplePort {
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of stored persons
        pub async fn person_count(&self) -> usize {
            self.store.read().await.persons.len()
        }

        /// Number of stored accounts
        pub async fn user_count(&self) -> usize {
            self.store.read().await.users.len()
        }

        /// Stores an account together with its profile
        pub async fn insert_profile(&self, profile: UserProfile) {
            self.store.write().await.profiles.insert(profile.user_id, profile);
        }
    }

    impl DomainPort for MockPeoplePort {}

    #[async_trait]
    impl HealthCheckable for MockPeoplePort {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("mock-people-port")
        }
    }

    #[async_trait]
    impl PeoplePort for MockPeoplePort {
        async fn get_person(&self, id: PersonId) -> Result<Person, PortError> {
            self.store
                .read()
                .await
                .persons
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Person", id))
        }

        async fn find_person_by_email(&self, email: &str) -> Result<Option<Person>, PortError> {
            Ok(self
                .store
                .read()
                .await
                .persons
                .values()
                .find(|p| p.email.as_deref().map_or(false, |e| same_email(e, email)))
                .cloned())
        }

        async fn find_person_by_orcid(&self, orcid_id: &str) -> Result<Option<Person>, PortError> {
            Ok(self
                .store
                .read()
                .await
                .persons
                .values()
                .find(|p| p.orcid_id.as_deref() == Some(orcid_id))
                .cloned())
        }

        async fn create_person(&self, person: &Person) -> Result<Person, PortError> {
            let mut store = self.store.write().await;
            if let Some(conflict) = store.person_conflict(person) {
                return Err(conflict);
            }
            store.persons.insert(person.id, person.clone());
            Ok(person.clone())
        }

        async fn update_person(&self, person: &Person) -> Result<Person, PortError> {
            let mut store = self.store.write().await;
            if !store.persons.contains_key(&person.id) {
                return Err(PortError::not_found("Person", person.id));
            }
            if let Some(conflict) = store.person_conflict(person) {
                return Err(conflict);
            }
            store.persons.insert(person.id, person.clone());
            Ok(person.clone())
        }

        async fn get_user(&self, id: UserId) -> Result<UserAccount, PortError> {
            self.store
                .read()
                .await
                .users
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("User", id))
        }

        async fn find_user_by_orcid(&self, orcid_id: &str) -> Result<Option<UserAccount>, PortError> {
            Ok(self
                .store
                .read()
                .await
                .users
                .values()
                .find(|u| u.orcid_id.as_deref() == Some(orcid_id))
                .cloned())
        }

        async fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, PortError> {
            Ok(self
                .store
                .read()
                .await
                .users
                .values()
                .find(|u| u.email.as_deref().map_or(false, |e| same_email(e, email)))
                .cloned())
        }

        async fn create_user(&self, user: &UserAccount) -> Result<UserAccount, PortError> {
            let mut store = self.store.write().await;
            if store.users.values().any(|u| u.username == user.username) {
                return Err(PortError::conflict(format!("username {} already in use", user.username)));
            }
            store.users.insert(user.id, user.clone());
            Ok(user.clone())
        }

        async fn get_profile_for_user(&self, user_id: UserId) -> Result<Option<UserProfile>, PortError> {
            Ok(self.store.read().await.profiles.get(&user_id).cloned())
        }

        async fn save_login(&self, link: &LoginLink) -> Result<(), PortError> {
            let mut store = self.store.write().await;
            if let Some(conflict) = store.person_conflict(&link.person) {
                return Err(conflict);
            }
            store.users.insert(link.user.id, link.user.clone());
            store.persons.insert(link.person.id, link.person.clone());
            store.profiles.insert(link.profile.user_id, link.profile.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::mock::MockPeoplePort;

    #[tokio::test]
    async fn test_mock_email_lookup_is_case_insensitive() {
        let port = MockPeoplePort::new();
        let person = Person::with_name("Sofia", "Kovalevskaya", Some("Sofia@Example.org".into()));
        port.create_person(&person).await.unwrap();

        let found = port.find_person_by_email("sofia@example.ORG").await.unwrap();
        assert_eq!(found.map(|p| p.id), Some(person.id));
    }

    #[tokio::test]
    async fn test_mock_rejects_duplicate_email() {
        let port = MockPeoplePort::new();
        port.create_person(&Person::with_name("A", "One", Some("dup@example.org".into())))
            .await
            .unwrap();
        let err = port
            .create_person(&Person::with_name("B", "Two", Some("DUP@example.org".into())))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_mock_not_found() {
        let port = MockPeoplePort::new();
        assert!(port.get_person(PersonId::new()).await.unwrap_err().is_not_found());
        assert!(port.get_user(UserId::new()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        let port = MockPeoplePort::new();
        assert!(port.health_check().await.is_healthy());
    }
}
