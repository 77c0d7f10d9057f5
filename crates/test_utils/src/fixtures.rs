//! Pre-built Test Fixtures
//!
//! Ready-to-use test data for the common back office entities. Values are
//! fixed so assertions can compare against them directly.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use rust_decimal_macros::dec;

use core_kernel::{Actor, Currency, InstituteClock, Money, Permission, PersonId, UserId};
use domain_programs::{NewProgram, Organizer, Participant, ProgramType};
use domain_reimbursements::{BankAccountType, DocumentRef, PaymentDetails, TaxDetails, TaxStatus};

/// Institute clock on Pacific time
pub static TEST_CLOCK: Lazy<InstituteClock> = Lazy::new(|| InstituteClock::new(chrono_tz::America::Los_Angeles));

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// A typical economy airfare
    pub fn usd_airfare() -> Money {
        Money::usd(dec!(640.00))
    }

    /// One night of lodging
    pub fn usd_lodging() -> Money {
        Money::usd(dec!(189.50))
    }

    /// A meal
    pub fn usd_meal() -> Money {
        Money::usd(dec!(42.75))
    }

    pub fn usd_zero() -> Money {
        Money::zero(Currency::USD)
    }
}

/// Fixture for dates and timestamps
pub struct TimeFixtures;

impl TimeFixtures {
    /// Noon UTC on the day a request is drafted
    pub fn drafted_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 7, 19, 0, 0).unwrap()
    }

    /// Shortly after drafting
    pub fn submitted_at() -> DateTime<Utc> {
        Self::drafted_at() + Duration::hours(2)
    }

    pub fn reviewed_at() -> DateTime<Utc> {
        Self::drafted_at() + Duration::days(3)
    }

    pub fn paid_at() -> DateTime<Utc> {
        Self::drafted_at() + Duration::days(10)
    }

    /// Date the travel took place
    pub fn travel_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 28).unwrap()
    }
}

/// Fixture for ORCID iDs
pub struct OrcidFixtures;

impl OrcidFixtures {
    /// Valid iD from the ORCID documentation
    pub fn josiah() -> &'static str {
        "0000-0002-1825-0097"
    }

    /// Valid iD with an `X` check character
    pub fn with_x_check() -> &'static str {
        "0000-0002-1694-233X"
    }

    /// Correct shape, wrong check digit
    pub fn bad_checksum() -> &'static str {
        "0000-0002-1825-0098"
    }
}

/// Fixture for payee details
pub struct PayeeFixtures;

impl PayeeFixtures {
    pub fn us_citizen() -> TaxDetails {
        TaxDetails::new(TaxStatus::UsCitizen)
    }

    /// Visa holder with citizenship and visa type filled in
    pub fn visa_holder() -> TaxDetails {
        TaxDetails {
            citizenship_country: Some("France".to_string()),
            visa_type: Some("J-1".to_string()),
            passport_number: Some("19AB12345".to_string()),
            us_entry_date: Some(NaiveDate::from_ymd_opt(2025, 3, 27).unwrap()),
            ..TaxDetails::new(TaxStatus::VisaNonresident)
        }
    }

    pub fn ach() -> PaymentDetails {
        PaymentDetails::ach("First Bank", "021000021", "000123456789", BankAccountType::Checking)
    }

    pub fn check() -> PaymentDetails {
        PaymentDetails::check("600 E Brokaw Rd, San Jose, CA 95112")
    }
}

/// Fixture for uploaded documents
pub struct DocumentFixtures;

impl DocumentFixtures {
    pub fn receipt_pdf() -> DocumentRef {
        DocumentRef::new("receipts/boarding-pass.pdf", "boarding-pass.pdf", 48_213, TimeFixtures::drafted_at())
    }

    pub fn passport_scan() -> DocumentRef {
        DocumentRef::new("visa/passport.jpg", "passport.jpg", 812_004, TimeFixtures::drafted_at())
    }

    /// Larger than the default upload limit
    pub fn oversized() -> DocumentRef {
        DocumentRef::new("receipts/huge.pdf", "huge.pdf", 11 * 1024 * 1024, TimeFixtures::drafted_at())
    }

    /// Extension outside the allowed list
    pub fn executable() -> DocumentRef {
        DocumentRef::new("receipts/receipt.exe", "receipt.exe", 1_024, TimeFixtures::drafted_at())
    }
}

/// Fixture for programs
pub struct ProgramFixtures;

impl ProgramFixtures {
    /// A workshop taking applications until a month from `now`
    pub fn open_workshop(code: i32, now: DateTime<Utc>) -> NewProgram {
        let start = now.date_naive() + Duration::days(60);
        NewProgram {
            code,
            title: "Arithmetic Statistics".to_string(),
            abbreviation: Some("arithstat".to_string()),
            program_type: ProgramType::Workshop,
            organizers: vec![Organizer {
                name: "Emmy Noether".to_string(),
                email: Some("emmy@example.org".to_string()),
            }],
            location: Some("Pasadena".to_string()),
            application_deadline: Some(now + Duration::days(30)),
            start_date: Some(start),
            end_date: Some(start + Duration::days(4)),
            description: None,
            online: false,
        }
    }

    /// A workshop whose deadline passed yesterday
    pub fn closed_workshop(code: i32, now: DateTime<Utc>) -> NewProgram {
        NewProgram {
            title: "Tropical Geometry".to_string(),
            abbreviation: None,
            application_deadline: Some(now - Duration::days(1)),
            ..Self::open_workshop(code, now)
        }
    }

    /// A workshop already underway
    pub fn running_workshop(code: i32, now: DateTime<Utc>) -> NewProgram {
        let start = now.date_naive() - Duration::days(1);
        NewProgram {
            title: "Low-dimensional Topology".to_string(),
            application_deadline: Some(now - Duration::days(30)),
            start_date: Some(start),
            end_date: Some(start + Duration::days(4)),
            ..Self::open_workshop(code, now)
        }
    }
}

/// Fixture for actors
pub struct ActorFixtures;

impl ActorFixtures {
    /// A participant linked to `person_id`
    pub fn participant(person_id: PersonId) -> Actor {
        Actor::participant(UserId::new(), Some(person_id))
    }

    pub fn reviewer() -> Actor {
        Actor::staff(UserId::new(), [Permission::ReviewReimbursements])
    }

    pub fn approver() -> Actor {
        Actor::staff(UserId::new(), [Permission::ReviewReimbursements, Permission::ApproveReimbursements])
    }

    pub fn payer() -> Actor {
        Actor::staff(UserId::new(), [Permission::MarkReimbursementsPaid])
    }

    pub fn program_manager() -> Actor {
        Actor::staff(UserId::new(), [Permission::ManagePrograms])
    }
}

/// Participant snapshot with a known name and email
pub fn participant_fixture(person_id: PersonId) -> Participant {
    Participant {
        person_id,
        first_name: Some("Ada".to_string()),
        middle_name: None,
        last_name: Some("Lovelace".to_string()),
        email: Some("ada@example.org".to_string()),
        orcid_id: Some(OrcidFixtures::josiah().to_string()),
        institution: Some("University of London".to_string()),
    }
}
