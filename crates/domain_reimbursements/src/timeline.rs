//! Status history of a request, rebuilt from its audit fields

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::UserId;
use crate::request::{ReimbursementRequest, RequestStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub label: String,
    pub at: DateTime<Utc>,
    pub by: Option<UserId>,
    pub notes: Option<String>,
}

impl TimelineEntry {
    fn new(label: &str, at: DateTime<Utc>) -> Self {
        Self {
            label: label.to_string(),
            at,
            by: None,
            notes: None,
        }
    }

    fn by(mut self, user: Option<UserId>) -> Self {
        self.by = user;
        self
    }

    fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }
}

impl ReimbursementRequest {
    /// Milestones reached so far, oldest first
    ///
    /// A change request only shows while the request is waiting on the
    /// submitter; once resubmitted the new submission supersedes it.
    pub fn timeline(&self) -> Vec<TimelineEntry> {
        let mut entries = vec![TimelineEntry::new("Created", self.created_at).by(Some(self.submitted_by))];

        if let Some(at) = self.submitted_at {
            entries.push(TimelineEntry::new("Submitted", at).by(Some(self.submitted_by)));
        }
        if self.status == RequestStatus::ChangesNeeded {
            if let Some(at) = self.reviewed_at {
                entries.push(
                    TimelineEntry::new("Changes Requested", at)
                        .by(self.reviewed_by)
                        .notes(self.change_request_notes.clone()),
                );
            }
        }
        if let Some(at) = self.approved_at {
            entries.push(TimelineEntry::new("Approved", at).by(self.approved_by));
        }
        if let Some(at) = self.paid_at {
            entries.push(
                TimelineEntry::new("Paid", at)
                    .by(self.paid_by)
                    .notes(self.payment_reference.as_ref().map(|r| format!("Reference: {}", r))),
            );
        }
        if let Some(at) = self.cancelled_at {
            entries.push(
                TimelineEntry::new("Cancelled", at)
                    .by(self.cancelled_by)
                    .notes(self.cancellation_reason.clone()),
            );
        }
        entries
    }
}
