//! Test Data Builders
//!
//! Builders for constructing test data with sensible defaults, so tests
//! only spell out the fields they care about. Names and emails are random
//! unless set explicitly.

use chrono::{DateTime, Utc};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;

use core_kernel::{EnrollmentId, Money, PersonId, ProgramId, UserId};
use domain_people::{OrcidIdentity, Person};
use domain_programs::{NewProgram, Program, ProgramType};
use domain_reimbursements::line_item::DEFAULT_MAX_DOCUMENT_BYTES;
use domain_reimbursements::{
    DocumentRef, ExpenseCategory, NewLineItem, NewReimbursement, PaymentDetails, ReimbursementRequest,
    TaxDetails, VisaDocumentKind,
};

use crate::fixtures::{DocumentFixtures, MoneyFixtures, OrcidFixtures, PayeeFixtures, ProgramFixtures, TimeFixtures};

/// Builder for the identity the ORCID proxy posts on sign-in
pub struct TestIdentityBuilder {
    orcid_id: String,
    email: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
}

impl Default for TestIdentityBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestIdentityBuilder {
    /// Random name and email on a valid ORCID iD
    pub fn new() -> Self {
        Self {
            orcid_id: OrcidFixtures::josiah().to_string(),
            email: Some(SafeEmail().fake()),
            given_name: Some(FirstName().fake()),
            family_name: Some(LastName().fake()),
        }
    }

    pub fn with_orcid(mut self, orcid_id: impl Into<String>) -> Self {
        self.orcid_id = orcid_id.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// ORCID released no email
    pub fn without_email(mut self) -> Self {
        self.email = None;
        self
    }

    pub fn with_name(mut self, given: impl Into<String>, family: impl Into<String>) -> Self {
        self.given_name = Some(given.into());
        self.family_name = Some(family.into());
        self
    }

    pub fn build(self) -> OrcidIdentity {
        OrcidIdentity {
            orcid_id: self.orcid_id,
            email: self.email,
            given_name: self.given_name,
            family_name: self.family_name,
        }
    }
}

/// Builder for person records
pub struct TestPersonBuilder {
    person: Person,
}

impl Default for TestPersonBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestPersonBuilder {
    pub fn new() -> Self {
        let mut person = Person::new();
        person.first_name = Some(FirstName().fake());
        person.last_name = Some(LastName().fake());
        person.email = Some(SafeEmail().fake());
        Self { person }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.person.email = Some(email.into());
        self
    }

    pub fn with_orcid(mut self, orcid_id: impl Into<String>) -> Self {
        self.person.orcid_id = Some(orcid_id.into());
        self
    }

    pub fn with_institution(mut self, institution: impl Into<String>) -> Self {
        self.person.institution = Some(institution.into());
        self
    }

    pub fn build(self) -> Person {
        self.person
    }
}

/// Builder for programs
pub struct TestProgramBuilder {
    new: NewProgram,
}

impl TestProgramBuilder {
    /// An open workshop with the given code
    pub fn new(code: i32) -> Self {
        Self {
            new: ProgramFixtures::open_workshop(code, Utc::now()),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.new.title = title.into();
        self
    }

    pub fn with_type(mut self, program_type: ProgramType) -> Self {
        self.new.program_type = program_type;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<DateTime<Utc>>) -> Self {
        self.new.application_deadline = deadline;
        self
    }

    /// Deadline passed yesterday
    pub fn closed(mut self) -> Self {
        self.new = ProgramFixtures::closed_workshop(self.new.code, Utc::now());
        self
    }

    /// Started yesterday
    pub fn running(mut self) -> Self {
        self.new = ProgramFixtures::running_workshop(self.new.code, Utc::now());
        self
    }

    pub fn build(self) -> Program {
        Program::create(self.new).expect("Failed to build test program")
    }
}

/// Builder for reimbursement requests
///
/// `build_*` methods drive the request through the real transitions, so a
/// built request always carries consistent audit fields.
pub struct TestReimbursementBuilder {
    person_id: PersonId,
    submitted_by: UserId,
    enrollment: Option<(EnrollmentId, ProgramId)>,
    tax: TaxDetails,
    payment: PaymentDetails,
    line_items: Vec<NewLineItem>,
    receipt: Option<DocumentRef>,
    passport: Option<DocumentRef>,
    now: DateTime<Utc>,
}

impl TestReimbursementBuilder {
    /// A US citizen paid by ACH, with one airfare line item
    pub fn new(person_id: PersonId, submitted_by: UserId) -> Self {
        Self {
            person_id,
            submitted_by,
            enrollment: None,
            tax: PayeeFixtures::us_citizen(),
            payment: PayeeFixtures::ach(),
            line_items: vec![Self::line_item(ExpenseCategory::Airfare, MoneyFixtures::usd_airfare())],
            receipt: Some(DocumentFixtures::receipt_pdf()),
            passport: None,
            now: TimeFixtures::drafted_at(),
        }
    }

    fn line_item(category: ExpenseCategory, amount: Money) -> NewLineItem {
        NewLineItem {
            category,
            description: format!("{} for the workshop", category.label()),
            date_incurred: TimeFixtures::travel_date(),
            amount_requested: amount,
        }
    }

    pub fn for_enrollment(mut self, enrollment_id: EnrollmentId, program_id: ProgramId) -> Self {
        self.enrollment = Some((enrollment_id, program_id));
        self
    }

    pub fn with_tax(mut self, tax: TaxDetails) -> Self {
        self.tax = tax;
        self
    }

    pub fn with_payment(mut self, payment: PaymentDetails) -> Self {
        self.payment = payment;
        self
    }

    /// Visa holder with a passport copy attached
    pub fn visa_holder(mut self) -> Self {
        self.tax = PayeeFixtures::visa_holder();
        self.passport = Some(DocumentFixtures::passport_scan());
        self
    }

    pub fn add_expense(mut self, category: ExpenseCategory, amount: Money) -> Self {
        self.line_items.push(Self::line_item(category, amount));
        self
    }

    pub fn without_expenses(mut self) -> Self {
        self.line_items.clear();
        self
    }

    pub fn without_receipts(mut self) -> Self {
        self.receipt = None;
        self
    }

    pub fn new_reimbursement(&self) -> NewReimbursement {
        NewReimbursement {
            person_id: self.person_id,
            enrollment_id: self.enrollment.map(|(e, _)| e),
            program_id: self.enrollment.map(|(_, p)| p),
            submitted_by: self.submitted_by,
            tax: self.tax.clone(),
            payment: self.payment.clone(),
            submitter_notes: None,
        }
    }

    pub fn build_draft(self) -> ReimbursementRequest {
        let mut request =
            ReimbursementRequest::create(self.new_reimbursement(), self.now).expect("Failed to create draft");
        for item in self.line_items {
            let id = request.add_line_item(item, self.now).expect("Failed to add line item");
            if let Some(receipt) = &self.receipt {
                request
                    .add_receipt(id, receipt.clone(), DEFAULT_MAX_DOCUMENT_BYTES, self.now)
                    .expect("Failed to add receipt");
            }
        }
        if let Some(passport) = self.passport {
            request
                .attach_visa_document(VisaDocumentKind::PassportCopy, passport, DEFAULT_MAX_DOCUMENT_BYTES, self.now)
                .expect("Failed to attach passport copy");
        }
        request
    }

    pub fn build_submitted(self) -> ReimbursementRequest {
        let mut request = self.build_draft();
        request
            .submit("Ada Lovelace", TimeFixtures::submitted_at())
            .expect("Failed to submit");
        request
    }

    /// Approved in full
    pub fn build_approved(self, approver: UserId) -> ReimbursementRequest {
        let mut request = self.build_submitted();
        request
            .approve(approver, &[], TimeFixtures::reviewed_at())
            .expect("Failed to approve");
        request
    }

    pub fn build_paid(self, approver: UserId, payer: UserId) -> ReimbursementRequest {
        let mut request = self.build_approved(approver);
        request
            .mark_paid(payer, Some("ACH-TEST-001"), None, TimeFixtures::paid_at())
            .expect("Failed to mark paid");
        request
    }
}
