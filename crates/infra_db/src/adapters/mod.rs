//! Domain Adapters
//!
//! PostgreSQL implementations of the domain ports. Each adapter:
//! - Implements the domain's port trait
//! - Translates between domain models and repository row types
//! - Reports database reachability through `HealthCheckable`
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresProgramAdapter;
//! use domain_programs::ProgramPort;
//!
//! let adapter = PostgresProgramAdapter::new(pool);
//! let program = adapter.get_program_by_code(1042).await?;
//! ```

pub mod people;
pub mod programs;
pub mod enrollments;
pub mod reimbursements;

pub use people::PostgresPeopleAdapter;
pub use programs::PostgresProgramAdapter;
pub use enrollments::PostgresEnrollmentAdapter;
pub use reimbursements::PostgresReimbursementAdapter;

use chrono::Utc;
use sqlx::PgPool;

use core_kernel::{AdapterHealth, HealthCheckResult};

/// Runs `SELECT 1` against the pool and times it
pub(crate) async fn check_pool(pool: &PgPool, adapter_id: &str) -> HealthCheckResult {
    let start = std::time::Instant::now();

    let result = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await;

    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(_) => HealthCheckResult {
            adapter_id: adapter_id.to_string(),
            status: AdapterHealth::Healthy,
            latency_ms,
            message: None,
            checked_at: Utc::now(),
        },
        Err(e) => HealthCheckResult {
            adapter_id: adapter_id.to_string(),
            status: AdapterHealth::Unhealthy,
            latency_ms,
            message: Some(format!("Database error: {}", e)),
            checked_at: Utc::now(),
        },
    }
}
