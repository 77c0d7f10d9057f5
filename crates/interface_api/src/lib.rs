//! HTTP API Layer
//!
//! This crate provides the REST API for the AIM back office using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers per area (account, programs,
//!   enrollments, invitations, reimbursements, staff)
//! - **Middleware**: Authentication, tracing, audit logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: Consistent error responses
//!
//! Sign-in goes through an identity proxy that completes the ORCID OAuth
//! flow and posts the verified identity to `/api/v1/auth/orcid`; the API
//! answers with a bearer token used on every other route.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState, Ports};
//!
//! let state = AppState::new(config, Ports::postgres(pool))?;
//! let app = create_router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;
pub mod extract;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, delete},
    middleware as axum_middleware,
};
use tower_http::trace::TraceLayer;
use tower_http::cors::{CorsLayer, Any};

use core_kernel::{CoreError, HealthCheckResult, InstituteClock};
use domain_people::{PeoplePort, PeopleService};
use domain_programs::{EnrollmentPort, EnrollmentService, InvitationService, ProgramPort, ProgramService};
use domain_reimbursements::{ReimbursementPort, ReimbursementService};
use infra_db::{
    DatabasePool, PostgresEnrollmentAdapter, PostgresPeopleAdapter, PostgresProgramAdapter,
    PostgresReimbursementAdapter,
};

use crate::config::ApiConfig;
use crate::middleware::{auth_middleware, audit_middleware, optional_auth_middleware};
use crate::handlers::{
    auth as auth_handlers, enrollments, health, invitations, me, programs, reimbursements, staff,
};

/// Storage ports the services run on
#[derive(Clone)]
pub struct Ports {
    pub people: Arc<dyn PeoplePort>,
    pub programs: Arc<dyn ProgramPort>,
    pub enrollments: Arc<dyn EnrollmentPort>,
    pub reimbursements: Arc<dyn ReimbursementPort>,
}

impl Ports {
    /// PostgreSQL adapters sharing one pool
    pub fn postgres(pool: DatabasePool) -> Self {
        Self {
            people: Arc::new(PostgresPeopleAdapter::new(pool.clone())),
            programs: Arc::new(PostgresProgramAdapter::new(pool.clone())),
            enrollments: Arc::new(PostgresEnrollmentAdapter::new(pool.clone())),
            reimbursements: Arc::new(PostgresReimbursementAdapter::new(pool)),
        }
    }

    /// Runs every adapter's health check
    pub async fn health_checks(&self) -> Vec<HealthCheckResult> {
        vec![
            self.people.health_check().await,
            self.programs.health_check().await,
            self.enrollments.health_check().await,
            self.reimbursements.health_check().await,
        ]
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub clock: InstituteClock,
    pub ports: Ports,
    pub people: Arc<PeopleService>,
    pub programs: Arc<ProgramService>,
    pub enrollments: Arc<EnrollmentService>,
    pub invitations: Arc<InvitationService>,
    pub reimbursements: Arc<ReimbursementService>,
}

impl AppState {
    /// Wires the domain services over the given ports
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InsecureSecret` if a secret is unset or a
    /// placeholder, and `CoreError::Configuration` if the institute
    /// timezone is not a valid IANA name
    pub fn new(config: ApiConfig, ports: Ports) -> Result<Self, CoreError> {
        config.validate()?;
        let clock = InstituteClock::from_name(&config.institute_timezone)?;

        let people = PeopleService::new(ports.people.clone());
        let programs = ProgramService::new(ports.programs.clone(), ports.enrollments.clone(), clock);
        let enrollments = EnrollmentService::new(ports.programs.clone(), ports.enrollments.clone(), clock);
        let invitations = InvitationService::new(ports.programs.clone(), ports.enrollments.clone());
        let reimbursements = ReimbursementService::new(ports.reimbursements.clone())
            .with_max_document_bytes(config.max_receipt_bytes);

        Ok(Self {
            config,
            clock,
            ports,
            people: Arc::new(people),
            programs: Arc::new(programs),
            enrollments: Arc::new(enrollments),
            invitations: Arc::new(invitations),
            reimbursements: Arc::new(reimbursements),
        })
    }
}

/// Creates the main API router
///
/// # Arguments
///
/// * `state` - Services and configuration shared by the handlers
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    // Health probes
    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    // Public API routes; a valid token is picked up when present
    let public_api = Router::new()
        .route("/auth/orcid", post(auth_handlers::orcid_login))
        .route("/programs/upcoming", get(programs::upcoming))
        .route("/invitations/:token", get(invitations::lookup))
        .route("/invitations/:token/respond", post(invitations::respond))
        .route_layer(axum_middleware::from_fn(audit_middleware))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), optional_auth_middleware));

    // Account routes
    let me_routes = Router::new()
        .route("/", get(me::get_me))
        .route("/profile", axum::routing::put(me::update_profile))
        .route("/dashboard", get(me::dashboard));

    // Enrollment routes
    let enrollment_routes = Router::new()
        .route("/:id", get(enrollments::get_enrollment).put(enrollments::update_enrollment))
        .route("/:id/withdraw", post(enrollments::withdraw));

    // Reimbursement routes
    let reimbursement_routes = Router::new()
        .route("/", get(reimbursements::list_requests).post(reimbursements::create_request))
        .route("/status", get(reimbursements::status_summary))
        .route("/:id", get(reimbursements::get_request).put(reimbursements::update_request))
        .route("/:id/visa-documents", post(reimbursements::attach_visa_document))
        .route("/:id/expenses", post(reimbursements::add_expense))
        .route("/:id/expenses/:expense_id", delete(reimbursements::remove_expense))
        .route("/:id/expenses/:expense_id/receipts", post(reimbursements::add_receipt))
        .route(
            "/:id/expenses/:expense_id/receipts/:receipt_id",
            delete(reimbursements::remove_receipt),
        )
        .route("/:id/submit", post(reimbursements::submit))
        .route("/:id/cancel", post(reimbursements::cancel));

    // Staff routes
    let staff_routes = Router::new()
        .route("/programs", post(staff::create_program))
        .route("/programs/:id/invitations", post(staff::invite))
        .route("/programs/:id/reimbursement-summary", get(staff::program_reimbursement_summary))
        .route("/enrollments/:id/decision", post(staff::decide_application))
        .route("/reimbursements/pending-review", get(staff::pending_review))
        .route("/reimbursements/pending-payment", get(staff::pending_payment))
        .route("/reimbursements/:id/request-changes", post(staff::request_changes))
        .route("/reimbursements/:id/approve", post(staff::approve))
        .route("/reimbursements/:id/mark-paid", post(staff::mark_paid));

    // Protected API routes
    let protected_api = Router::new()
        .route("/programs/open", get(programs::open_programs))
        .route("/programs/:code/apply", post(programs::apply))
        .nest("/me", me_routes)
        .nest("/enrollments", enrollment_routes)
        .nest("/reimbursements", reimbursement_routes)
        .nest("/staff", staff_routes)
        .route_layer(axum_middleware::from_fn(audit_middleware))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Combine all routes
    Router::new()
        .merge(health_routes)
        .nest("/api/v1", public_api.merge(protected_api))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
