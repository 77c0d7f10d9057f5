//! Repository implementations
//!
//! Each repository owns the SQL for one aggregate and maps between
//! PostgreSQL rows and plain row structs. Multi-table writes run inside a
//! transaction; the reimbursement repository additionally enforces an
//! optimistic version check.
//!
//! Queries are built at runtime with `sqlx::query_as` so the crate builds
//! without a database connection.

pub mod people;
pub mod programs;
pub mod enrollments;
pub mod reimbursements;

pub use people::PeopleRepository;
pub use programs::ProgramRepository;
pub use enrollments::EnrollmentRepository;
pub use reimbursements::ReimbursementRepository;
