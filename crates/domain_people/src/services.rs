//! People domain services

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use core_kernel::{Actor, UserId};

use crate::account::{OrcidIdentity, UserAccount, UserProfile};
use crate::error::PeopleError;
use crate::person::{Person, PersonUpdate};
use crate::ports::{LoginLink, PeoplePort};
use crate::validation::{same_email, validate_email, validate_orcid};

/// Service for sign-in linking and profile maintenance
#[derive(Clone)]
pub struct PeopleService {
    port: Arc<dyn PeoplePort>,
}

impl PeopleService {
    pub fn new(port: Arc<dyn PeoplePort>) -> Self {
        Self { port }
    }

    /// Resolves a verified ORCID identity to an account, a person and a profile
    ///
    /// This method:
    /// 1. Finds the account already linked to the ORCID iD, else the account
    ///    with the same email (attaching the ORCID iD to it), else creates one
    /// 2. Finds the person by ORCID iD, else by email (filling in the ORCID iD
    ///    when the person has none), else creates one from the identity
    /// 3. Gets or creates the account's profile, repointing it at the
    ///    resolved person if it linked someone else
    /// 4. Records the login time and persists everything atomically
    ///
    /// # Errors
    ///
    /// Returns `PeopleError::InvalidOrcid` if the identity carries a
    /// malformed ORCID iD, or a port error if persisting fails
    pub async fn link_orcid_login(
        &self,
        identity: OrcidIdentity,
        now: DateTime<Utc>,
    ) -> Result<LoginLink, PeopleError> {
        let orcid = validate_orcid(&identity.orcid_id)?;
        let email = match identity.email.as_deref() {
            Some(raw) => match validate_email(raw) {
                Ok(email) => Some(email),
                Err(_) => {
                    warn!(orcid = %orcid, "Ignoring malformed email released by ORCID");
                    None
                }
            },
            None => None,
        };

        // Account
        let (mut user, user_created) = match self.port.find_user_by_orcid(&orcid).await? {
            Some(user) => (user, false),
            None => {
                let by_email = match email.as_deref() {
                    Some(e) => self.port.find_user_by_email(e).await?,
                    None => None,
                };
                match by_email {
                    Some(mut user) => {
                        user.orcid_id = Some(orcid.clone());
                        (user, false)
                    }
                    None => {
                        let mut user = UserAccount::new(orcid.clone(), email.clone());
                        user.orcid_id = Some(orcid.clone());
                        user.first_name = identity.given_name.clone();
                        user.last_name = identity.family_name.clone();
                        (user, true)
                    }
                }
            }
        };
        user.last_login = Some(now);

        // Person
        let (person, person_created) = match self.port.find_person_by_orcid(&orcid).await? {
            Some(person) => (person, false),
            None => {
                let by_email = match email.as_deref() {
                    Some(e) => self.port.find_person_by_email(e).await?,
                    None => None,
                };
                match by_email {
                    Some(mut person) => {
                        if person.orcid_id.is_none() {
                            person.orcid_id = Some(orcid.clone());
                            person.updated_at = now;
                        }
                        (person, false)
                    }
                    None => {
                        let mut person = Person::new();
                        person.first_name = identity.given_name.clone();
                        person.last_name = identity.family_name.clone();
                        person.email = email.clone();
                        person.orcid_id = Some(orcid.clone());
                        (person, true)
                    }
                }
            }
        };

        // Profile
        let mut profile = self
            .port
            .get_profile_for_user(user.id)
            .await?
            .unwrap_or_else(|| UserProfile::new(user.id, person.id));
        if profile.person_id != person.id {
            info!(user_id = %user.id, person_id = %person.id, "Repointing profile to resolved person");
            profile.person_id = person.id;
        }
        profile.email_verified = match (&user.email, &person.email) {
            (Some(a), Some(b)) => same_email(a, b),
            _ => false,
        };
        profile.last_login_at = now;

        let link = LoginLink {
            user,
            person,
            profile,
            user_created,
            person_created,
        };
        self.port.save_login(&link).await?;

        info!(
            user_id = %link.user.id,
            person_id = %link.person.id,
            user_created = link.user_created,
            person_created = link.person_created,
            "ORCID login linked"
        );
        Ok(link)
    }

    /// Returns the person linked to an account
    ///
    /// # Errors
    ///
    /// `PeopleError::ProfileNotLinked` when the account has no profile
    pub async fn person_for_user(&self, user_id: UserId) -> Result<Person, PeopleError> {
        let profile = self
            .port
            .get_profile_for_user(user_id)
            .await?
            .ok_or(PeopleError::ProfileNotLinked(user_id))?;
        Ok(self.port.get_person(profile.person_id).await?)
    }

    /// Returns the account
    pub async fn get_user(&self, user_id: UserId) -> Result<UserAccount, PeopleError> {
        self.port.get_user(user_id).await.map_err(|e| {
            if e.is_not_found() {
                PeopleError::user_not_found(user_id)
            } else {
                e.into()
            }
        })
    }

    /// Builds the actor for an account, including its linked person if any
    pub async fn actor_for(&self, user_id: UserId) -> Result<Actor, PeopleError> {
        let user = self.get_user(user_id).await?;
        let person_id = self
            .port
            .get_profile_for_user(user_id)
            .await?
            .map(|p| p.person_id);
        Ok(user.actor(person_id))
    }

    /// Applies a profile update to the person linked to an account
    ///
    /// # Errors
    ///
    /// - `ProfileNotLinked` if the account has no person
    /// - `InvalidEmail` / `InvalidOrcid` for malformed values
    /// - `DuplicateEmail` / `DuplicateOrcid` if another person holds the value
    pub async fn update_profile(
        &self,
        user_id: UserId,
        update: PersonUpdate,
    ) -> Result<Person, PeopleError> {
        let mut person = self.person_for_user(user_id).await?;
        let update = update.normalized()?;

        if let Some(email) = update.email.as_deref().filter(|e| !e.is_empty()) {
            if let Some(other) = self.port.find_person_by_email(email).await? {
                if other.id != person.id {
                    return Err(PeopleError::DuplicateEmail(email.to_string()));
                }
            }
        }
        if let Some(orcid) = update.orcid_id.as_deref().filter(|o| !o.is_empty()) {
            if let Some(other) = self.port.find_person_by_orcid(orcid).await? {
                if other.id != person.id {
                    return Err(PeopleError::DuplicateOrcid(orcid.to_string()));
                }
            }
        }

        update.apply_to(&mut person);
        let saved = self.port.update_person(&person).await?;
        info!(person_id = %saved.id, "Profile updated");
        Ok(saved)
    }
}
