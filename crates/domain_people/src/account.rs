//! User accounts and profiles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use core_kernel::{Actor, Permission, PersonId, UserId, UserProfileId};

/// A login account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    /// Staff permissions granted to this account
    pub permissions: BTreeSet<Permission>,
    /// ORCID iD of the linked social login, if any
    pub orcid_id: Option<String>,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl UserAccount {
    /// Creates an active, non-staff account
    pub fn new(username: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: UserId::new_v7(),
            username: username.into(),
            email,
            first_name: None,
            last_name: None,
            is_active: true,
            is_staff: false,
            is_superuser: false,
            permissions: BTreeSet::new(),
            orcid_id: None,
            date_joined: Utc::now(),
            last_login: None,
        }
    }

    /// Builds the actor for requests made with this account
    pub fn actor(&self, person_id: Option<PersonId>) -> Actor {
        Actor {
            user_id: self.id,
            person_id,
            is_staff: self.is_staff || self.is_superuser,
            is_superuser: self.is_superuser,
            permissions: self.permissions.clone(),
        }
    }
}

/// Links a user account to its person record (exactly one per account)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserProfileId,
    pub user_id: UserId,
    pub person_id: PersonId,
    /// Whether the account email was verified against the person record
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user_id: UserId, person_id: PersonId) -> Self {
        let now = Utc::now();
        Self {
            id: UserProfileId::new_v7(),
            user_id,
            person_id,
            email_verified: false,
            created_at: now,
            last_login_at: now,
        }
    }
}

/// A verified identity handed over by the ORCID OAuth flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrcidIdentity {
    /// The ORCID iD (social account uid)
    pub orcid_id: String,
    /// Email released by ORCID, if the user made one public
    pub email: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}
