//! Infrastructure Database Layer
//!
//! PostgreSQL storage for the AIM back office using SQLx.
//!
//! # Architecture
//!
//! Repositories own the SQL and work in row types; adapters implement the
//! domain ports on top of them and translate rows to domain models. The
//! domain crates never see SQLx.
//!
//! Writes that must land together (an ORCID login, an accepted invitation,
//! a reimbursement with its expenses and receipts) run in one transaction.
//! Reimbursement saves are guarded by a version column so concurrent
//! staff edits cannot overwrite each other.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{DatabaseConfig, create_pool, PostgresReimbursementAdapter};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/aim")).await?;
//! infra_db::run_migrations(&pool).await?;
//! let port = PostgresReimbursementAdapter::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{DatabasePool, create_pool, create_pool_from_url, run_migrations, DatabaseConfig};
pub use error::DatabaseError;
pub use adapters::{
    PostgresPeopleAdapter, PostgresProgramAdapter, PostgresEnrollmentAdapter,
    PostgresReimbursementAdapter,
};
