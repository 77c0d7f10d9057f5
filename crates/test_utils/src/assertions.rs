//! Custom Test Assertions
//!
//! Assertion helpers for domain types with more useful failure messages
//! than a bare `assert_eq!`.

use rust_decimal::Decimal;

use core_kernel::Money;
use domain_programs::{Enrollment, EnrollmentStatus};
use domain_reimbursements::{ReimbursementRequest, RequestStatus};

/// Asserts that a Money value has the given amount, ignoring scale
///
/// # Panics
///
/// Panics if the amounts differ
pub fn assert_money_eq(actual: &Money, expected: Decimal) {
    assert!(
        actual.amount() == expected,
        "Expected {} {}, got {} {}",
        actual.currency().symbol(),
        expected,
        actual.currency().symbol(),
        actual.amount()
    );
}

pub fn assert_money_zero(money: &Money) {
    assert!(
        money.is_zero(),
        "Expected zero money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

pub fn assert_request_status(request: &ReimbursementRequest, expected: RequestStatus) {
    assert_eq!(
        request.status, expected,
        "Request {} is {}, expected {}",
        request.id, request.status, expected
    );
}

/// Asserts the request can be submitted as is
pub fn assert_ready(request: &ReimbursementRequest) {
    let problems = request.readiness_problems();
    assert!(problems.is_empty(), "Request {} is not ready: {:?}", request.id, problems);
}

/// Asserts one of the readiness problems mentions `fragment`
pub fn assert_not_ready_because(request: &ReimbursementRequest, fragment: &str) {
    let problems = request.readiness_problems();
    assert!(
        problems.iter().any(|p| p.contains(fragment)),
        "Expected a readiness problem containing {:?}, got {:?}",
        fragment,
        problems
    );
}

/// Asserts the stored total equals the sum of the line items
pub fn assert_totals_consistent(request: &ReimbursementRequest) {
    let calculated = request
        .calculate_total_requested()
        .expect("Line item currencies should match the request");
    assert_eq!(
        request.total_requested.amount(),
        calculated.amount(),
        "Stored total {} does not match line items {}",
        request.total_requested,
        calculated
    );
}

/// Asserts the timeline is in chronological order
pub fn assert_timeline_ordered(request: &ReimbursementRequest) {
    let timeline = request.timeline();
    for pair in timeline.windows(2) {
        assert!(
            pair[0].at <= pair[1].at,
            "Timeline out of order: {} at {} before {} at {}",
            pair[0].label,
            pair[0].at,
            pair[1].label,
            pair[1].at
        );
    }
}

pub fn assert_enrollment_status(enrollment: &Enrollment, expected: EnrollmentStatus) {
    assert_eq!(
        enrollment.status(),
        expected,
        "Enrollment {} has status {:?}, expected {:?}",
        enrollment.id,
        enrollment.status(),
        expected
    );
}
