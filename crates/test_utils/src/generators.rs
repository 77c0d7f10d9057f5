//! Property-Based Test Generators
//!
//! Proptest strategies producing data that satisfies the domain's own
//! validation rules.

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

use core_kernel::Money;
use domain_people::orcid_check_digit;
use domain_reimbursements::{ExpenseCategory, NewLineItem, TaxStatus};

/// Positive USD amounts with cents, up to $99,999.99
pub fn usd_amount_strategy() -> impl Strategy<Value = Money> {
    (1i64..10_000_000i64).prop_map(|cents| Money::usd(Decimal::new(cents, 2)))
}

/// Non-negative USD amounts up to `max`, in cents
pub fn usd_amount_up_to(max: Money) -> impl Strategy<Value = Money> {
    let max_cents = (max.amount() * Decimal::ONE_HUNDRED)
        .trunc()
        .try_into()
        .unwrap_or(0i64);
    (0i64..=max_cents).prop_map(|cents| Money::usd(Decimal::new(cents, 2)))
}

pub fn expense_category_strategy() -> impl Strategy<Value = ExpenseCategory> {
    prop_oneof![
        Just(ExpenseCategory::Airfare),
        Just(ExpenseCategory::GroundTransport),
        Just(ExpenseCategory::Lodging),
        Just(ExpenseCategory::Meals),
        Just(ExpenseCategory::Baggage),
        Just(ExpenseCategory::Other),
    ]
}

pub fn tax_status_strategy() -> impl Strategy<Value = TaxStatus> {
    prop_oneof![
        Just(TaxStatus::UsCitizen),
        Just(TaxStatus::GreenCard),
        Just(TaxStatus::VisaResident),
        Just(TaxStatus::VisaNonresident),
    ]
}

/// Dates in 2020-2029
pub fn travel_date_strategy() -> impl Strategy<Value = NaiveDate> {
    (2020i32..2030, 1u32..=12, 1u32..=28).prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

pub fn line_item_strategy() -> impl Strategy<Value = NewLineItem> {
    (
        expense_category_strategy(),
        "[A-Za-z][A-Za-z ]{0,40}",
        travel_date_strategy(),
        usd_amount_strategy(),
    )
        .prop_map(|(category, description, date_incurred, amount_requested)| NewLineItem {
            category,
            description,
            date_incurred,
            amount_requested,
        })
}

/// Valid dashed ORCID iDs with a correct check character
pub fn orcid_strategy() -> impl Strategy<Value = String> {
    "[0-9]{15}".prop_map(|base| {
        let check = orcid_check_digit(&base).unwrap_or('0');
        format!("{}-{}-{}-{}{}", &base[0..4], &base[4..8], &base[8..12], &base[12..15], check)
    })
}

/// Strings that are not ORCID iDs in any accepted spelling
pub fn non_orcid_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,20}",
        "[0-9]{1,14}",
        "[0-9]{17,20}",
    ]
}
