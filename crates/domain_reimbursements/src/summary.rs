//! Aggregated views over sets of requests

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use core_kernel::{Currency, Money, ProgramId};

use crate::error::ReimbursementError;
use crate::request::{ReimbursementRequest, RequestStatus};

/// Per-status counts of one user's requests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total: usize,
    pub draft: usize,
    pub submitted: usize,
    pub changes_needed: usize,
    pub approved: usize,
    pub paid: usize,
    pub cancelled: usize,
}

impl StatusSummary {
    pub fn from_requests<'a>(requests: impl IntoIterator<Item = &'a ReimbursementRequest>) -> Self {
        let mut summary = Self::default();
        for request in requests {
            summary.total += 1;
            match request.status {
                RequestStatus::Draft => summary.draft += 1,
                RequestStatus::Submitted => summary.submitted += 1,
                RequestStatus::ChangesNeeded => summary.changes_needed += 1,
                RequestStatus::Approved => summary.approved += 1,
                RequestStatus::Paid => summary.paid += 1,
                RequestStatus::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }
}

/// Reimbursement totals for one program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramSummary {
    pub program_id: ProgramId,
    pub total_requests: usize,
    pub total_requested: Money,
    pub total_approved: Money,
    pub total_paid: Money,
    /// Request count per status; statuses with no requests are omitted
    pub by_status: BTreeMap<String, usize>,
}

impl ProgramSummary {
    pub fn empty(program_id: ProgramId) -> Self {
        Self {
            program_id,
            total_requests: 0,
            total_requested: Money::zero(Currency::USD),
            total_approved: Money::zero(Currency::USD),
            total_paid: Money::zero(Currency::USD),
            by_status: BTreeMap::new(),
        }
    }

    pub fn from_requests<'a>(
        program_id: ProgramId,
        requests: impl IntoIterator<Item = &'a ReimbursementRequest>,
    ) -> Result<Self, ReimbursementError> {
        let mut summary = Self::empty(program_id);
        for request in requests {
            summary.total_requests += 1;
            summary.total_requested = summary.total_requested.checked_add(&request.total_requested)?;
            if let Some(approved) = &request.total_approved {
                summary.total_approved = summary.total_approved.checked_add(approved)?;
            }
            if let Some(paid) = &request.total_paid {
                summary.total_paid = summary.total_paid.checked_add(paid)?;
            }
            *summary
                .by_status
                .entry(request.status.as_str().to_string())
                .or_insert(0) += 1;
        }
        Ok(summary)
    }
}
