//! Acting users and their permissions
//!
//! Every state-changing service call receives the [`Actor`] performing it.
//! The actor is used for authorization checks and is recorded in the audit
//! fields of the entity being changed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::identifiers::{PersonId, UserId};

/// Fine-grained staff permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Send submitted reimbursement requests back for changes
    ReviewReimbursements,
    /// Approve submitted reimbursement requests
    ApproveReimbursements,
    /// Record payment of approved reimbursement requests
    MarkReimbursementsPaid,
    /// Export reimbursement data
    ExportReimbursements,
    /// Invite participants and decide on applications
    ManagePrograms,
}

impl Permission {
    pub const ALL: [Permission; 5] = [
        Permission::ReviewReimbursements,
        Permission::ApproveReimbursements,
        Permission::MarkReimbursementsPaid,
        Permission::ExportReimbursements,
        Permission::ManagePrograms,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ReviewReimbursements => "reimbursements:review",
            Permission::ApproveReimbursements => "reimbursements:approve",
            Permission::MarkReimbursementsPaid => "reimbursements:mark_paid",
            Permission::ExportReimbursements => "reimbursements:export",
            Permission::ManagePrograms => "programs:manage",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("Unknown permission: {}", s))
    }
}

/// The authenticated user on whose behalf an operation runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    /// Person linked to the account, if any
    pub person_id: Option<PersonId>,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub permissions: BTreeSet<Permission>,
}

impl Actor {
    /// A regular participant account
    pub fn participant(user_id: UserId, person_id: Option<PersonId>) -> Self {
        Self {
            user_id,
            person_id,
            is_staff: false,
            is_superuser: false,
            permissions: BTreeSet::new(),
        }
    }

    /// A staff account holding the given permissions
    pub fn staff(user_id: UserId, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            user_id,
            person_id: None,
            is_staff: true,
            is_superuser: false,
            permissions: permissions.into_iter().collect(),
        }
    }

    /// A superuser implicitly holds every permission
    pub fn superuser(user_id: UserId) -> Self {
        Self {
            user_id,
            person_id: None,
            is_staff: true,
            is_superuser: true,
            permissions: BTreeSet::new(),
        }
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.is_superuser || self.permissions.contains(&permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superuser_has_everything() {
        let actor = Actor::superuser(UserId::new());
        assert!(Permission::ALL.iter().all(|p| actor.has(*p)));
    }

    #[test]
    fn test_staff_only_has_granted() {
        let actor = Actor::staff(UserId::new(), [Permission::ReviewReimbursements]);
        assert!(actor.has(Permission::ReviewReimbursements));
        assert!(!actor.has(Permission::ApproveReimbursements));
    }

    #[test]
    fn test_permission_round_trips_through_str() {
        for p in Permission::ALL {
            assert_eq!(p.as_str().parse::<Permission>().unwrap(), p);
        }
    }
}
