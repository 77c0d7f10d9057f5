//! Reimbursements Domain Ports
//!
//! `ReimbursementPort` stores whole aggregates: a request together with its
//! line items and receipts is always written as one unit. Writes of an
//! existing request carry the version the caller loaded and fail with
//! `PortError::Conflict` when someone else saved in between.

use async_trait::async_trait;

use core_kernel::{DomainPort, HealthCheckable, PersonId, PortError, ProgramId, ReimbursementId, UserId};

use crate::request::{ReimbursementRequest, RequestStatus};
use crate::summary::ProgramSummary;

/// Query parameters for finding requests
///
/// Results are ordered newest first.
#[derive(Debug, Clone, Default)]
pub struct ReimbursementQuery {
    pub submitted_by: Option<UserId>,
    pub person_id: Option<PersonId>,
    pub program_id: Option<ProgramId>,
    /// Empty means any status
    pub statuses: Vec<RequestStatus>,
    pub limit: Option<u32>,
}

impl ReimbursementQuery {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            submitted_by: Some(user_id),
            ..Default::default()
        }
    }

    pub fn for_person(person_id: PersonId) -> Self {
        Self {
            person_id: Some(person_id),
            ..Default::default()
        }
    }

    pub fn with_status(statuses: impl IntoIterator<Item = RequestStatus>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn statuses(mut self, statuses: impl IntoIterator<Item = RequestStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a request satisfies the filters (ordering and limit aside)
    pub fn matches(&self, request: &ReimbursementRequest) -> bool {
        self.submitted_by.map_or(true, |u| request.submitted_by == u)
            && self.person_id.map_or(true, |p| request.person_id == p)
            && self.program_id.map_or(true, |p| request.program_id == Some(p))
            && (self.statuses.is_empty() || self.statuses.contains(&request.status))
    }
}

/// Port for reimbursement request storage
#[async_trait]
pub trait ReimbursementPort: DomainPort + HealthCheckable {
    /// Loads a request with its line items and receipts, or `PortError::NotFound`
    async fn get_request(&self, id: ReimbursementId) -> Result<ReimbursementRequest, PortError>;

    /// Inserts a new request
    async fn create_request(&self, request: &ReimbursementRequest) -> Result<ReimbursementRequest, PortError>;

    /// Replaces a stored request if its version still equals `expected_version`
    ///
    /// Returns the request as stored, with the version incremented.
    async fn save_request(
        &self,
        request: &ReimbursementRequest,
        expected_version: u32,
    ) -> Result<ReimbursementRequest, PortError>;

    async fn find_requests(&self, query: &ReimbursementQuery) -> Result<Vec<ReimbursementRequest>, PortError>;

    /// Totals across all requests linked to the program
    async fn program_summary(&self, program_id: ProgramId) -> Result<ProgramSummary, PortError>;
}

/// In-memory adapter for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    use core_kernel::HealthCheckResult;

    /// In-memory mock implementation of ReimbursementPort
    #[derive(Debug, Default, Clone)]
    pub struct MockReimbursementPort {
        requests: Arc<RwLock<HashMap<ReimbursementId, ReimbursementRequest>>>,
    }

    impl MockReimbursementPort {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn request_count(&self) -> usize {
            self.requests.read().await.len()
        }

        /// Overwrites a stored request without a version check
        pub async fn force_put(&self, request: ReimbursementRequest) {
            self.requests.write().await.insert(request.id, request);
        }
    }

    impl DomainPort for MockReimbursementPort {}

    #[async_trait]
    impl HealthCheckable for MockReimbursementPort {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("mock-reimbursement-port")
        }
    }

    #[async_trait]
    impl ReimbursementPort for MockReimbursementPort {
        async fn get_request(&self, id: ReimbursementId) -> Result<ReimbursementRequest, PortError> {
            self.requests
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("ReimbursementRequest", id))
        }

        async fn create_request(&self, request: &ReimbursementRequest) -> Result<ReimbursementRequest, PortError> {
            let mut requests = self.requests.write().await;
            if requests.contains_key(&request.id) {
                return Err(PortError::conflict(format!("request {} already exists", request.id)));
            }
            requests.insert(request.id, request.clone());
            Ok(request.clone())
        }

        async fn save_request(
            &self,
            request: &ReimbursementRequest,
            expected_version: u32,
        ) -> Result<ReimbursementRequest, PortError> {
            let mut requests = self.requests.write().await;
            let stored = requests
                .get_mut(&request.id)
                .ok_or_else(|| PortError::not_found("ReimbursementRequest", request.id))?;
            if stored.version != expected_version {
                return Err(PortError::conflict(format!(
                    "request {} is at version {}, expected {}",
                    request.id, stored.version, expected_version
                )));
            }
            let mut updated = request.clone();
            updated.version = expected_version + 1;
            *stored = updated.clone();
            Ok(updated)
        }

        async fn find_requests(&self, query: &ReimbursementQuery) -> Result<Vec<ReimbursementRequest>, PortError> {
            let mut results: Vec<ReimbursementRequest> = self
                .requests
                .read()
                .await
                .values()
                .filter(|r| query.matches(r))
                .cloned()
                .collect();
            results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            if let Some(limit) = query.limit {
                results.truncate(limit as usize);
            }
            Ok(results)
        }

        async fn program_summary(&self, program_id: ProgramId) -> Result<ProgramSummary, PortError> {
            let requests = self.requests.read().await;
            ProgramSummary::from_requests(
                program_id,
                requests.values().filter(|r| r.program_id == Some(program_id)),
            )
            .map_err(|e| PortError::internal(e.to_string()))
        }
    }
}
