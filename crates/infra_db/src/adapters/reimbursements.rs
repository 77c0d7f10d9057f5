//! PostgreSQL Reimbursement Adapter
//!
//! Implements `ReimbursementPort` on top of [`ReimbursementRepository`].
//! The request aggregate is flattened into the request, line item and
//! receipt tables; document references and submit-time snapshots are
//! kept as JSONB.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, instrument, warn};

use core_kernel::{
    Currency, DomainPort, EnrollmentId, HealthCheckResult, HealthCheckable, LineItemId, Money,
    PersonId, PortError, ProgramId, ReceiptId, ReimbursementId, UserId,
};
use domain_reimbursements::{
    BankAccountType, DocumentRef, ExpenseCategory, ExpenseLineItem, PaymentDetails,
    PaymentMethod, ProgramSummary, Receipt, ReimbursementPort, ReimbursementQuery,
    ReimbursementRequest, RequestStatus, TaxDetails, TaxStatus,
};

use crate::error::DatabaseError;
use crate::repositories::reimbursements::{
    BankAccountType as DbBankAccountType, ExpenseCategory as DbExpenseCategory, LineItemRow,
    PaymentMethod as DbPaymentMethod, ReceiptRow, ReimbursementRepository,
    ReimbursementStatus as DbStatus, RequestFilter, RequestRecord, RequestRow,
    TaxStatus as DbTaxStatus,
};

/// PostgreSQL-backed implementation of the ReimbursementPort trait
#[derive(Debug, Clone)]
pub struct PostgresReimbursementAdapter {
    repository: ReimbursementRepository,
    pool: PgPool,
}

impl PostgresReimbursementAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: ReimbursementRepository::new(pool.clone()),
            pool,
        }
    }

    /// Returns a reference to the underlying repository
    pub fn repository(&self) -> &ReimbursementRepository {
        &self.repository
    }
}

impl DomainPort for PostgresReimbursementAdapter {}

#[async_trait]
impl HealthCheckable for PostgresReimbursementAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        super::check_pool(&self.pool, "postgres-reimbursement-adapter").await
    }
}

#[async_trait]
impl ReimbursementPort for PostgresReimbursementAdapter {
    #[instrument(skip(self), fields(request_id = %id))]
    async fn get_request(&self, id: ReimbursementId) -> Result<ReimbursementRequest, PortError> {
        debug!("Fetching reimbursement request");
        let record = self.repository.get(*id.as_uuid()).await?;
        Ok(record_to_request(record)?)
    }

    #[instrument(skip(self, request), fields(request_id = %request.id))]
    async fn create_request(&self, request: &ReimbursementRequest) -> Result<ReimbursementRequest, PortError> {
        debug!("Creating reimbursement request");
        self.repository.insert(&request_to_record(request)?).await?;
        Ok(request.clone())
    }

    #[instrument(skip(self, request), fields(request_id = %request.id, status = %request.status))]
    async fn save_request(
        &self,
        request: &ReimbursementRequest,
        expected_version: u32,
    ) -> Result<ReimbursementRequest, PortError> {
        let expected = i32::try_from(expected_version)
            .map_err(|_| PortError::validation_field("version out of range", "version"))?;

        let new_version = match self.repository.save(&request_to_record(request)?, expected).await {
            Ok(v) => v,
            Err(e @ DatabaseError::VersionConflict(_)) => {
                warn!("Stale reimbursement save rejected: {}", e);
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        let mut saved = request.clone();
        saved.version = u32::try_from(new_version)
            .map_err(|_| PortError::internal("stored version is negative"))?;
        Ok(saved)
    }

    #[instrument(skip(self))]
    async fn find_requests(&self, query: &ReimbursementQuery) -> Result<Vec<ReimbursementRequest>, PortError> {
        let filter = RequestFilter {
            submitted_by: query.submitted_by.map(|id| *id.as_uuid()),
            person_id: query.person_id.map(|id| *id.as_uuid()),
            program_id: query.program_id.map(|id| *id.as_uuid()),
            statuses: query.statuses.iter().copied().map(status_to_db).collect(),
            limit: query.limit,
        };
        let records = self.repository.search(&filter).await?;
        debug!(count = records.len(), "Found reimbursement requests");
        records
            .into_iter()
            .map(|r| record_to_request(r).map_err(PortError::from))
            .collect()
    }

    #[instrument(skip(self), fields(program_id = %program_id))]
    async fn program_summary(&self, program_id: ProgramId) -> Result<ProgramSummary, PortError> {
        let row = self.repository.program_summary(*program_id.as_uuid()).await?;

        let by_status: BTreeMap<String, usize> = row
            .by_status
            .iter()
            .map(|s| (status_from_db(s.status).as_str().to_string(), s.count as usize))
            .collect();

        Ok(ProgramSummary {
            program_id,
            total_requests: row.totals.total_requests as usize,
            total_requested: Money::usd(row.totals.total_requested),
            total_approved: Money::usd(row.totals.total_approved),
            total_paid: Money::usd(row.totals.total_paid),
            by_status,
        })
    }
}

// ============================================================================
// Enum mappings
// ============================================================================

fn status_to_db(status: RequestStatus) -> DbStatus {
    match status {
        RequestStatus::Draft => DbStatus::Draft,
        RequestStatus::Submitted => DbStatus::Submitted,
        RequestStatus::ChangesNeeded => DbStatus::ChangesNeeded,
        RequestStatus::Approved => DbStatus::Approved,
        RequestStatus::Paid => DbStatus::Paid,
        RequestStatus::Cancelled => DbStatus::Cancelled,
    }
}

fn status_from_db(status: DbStatus) -> RequestStatus {
    match status {
        DbStatus::Draft => RequestStatus::Draft,
        DbStatus::Submitted => RequestStatus::Submitted,
        DbStatus::ChangesNeeded => RequestStatus::ChangesNeeded,
        DbStatus::Approved => RequestStatus::Approved,
        DbStatus::Paid => RequestStatus::Paid,
        DbStatus::Cancelled => RequestStatus::Cancelled,
    }
}

fn tax_status_to_db(status: TaxStatus) -> DbTaxStatus {
    match status {
        TaxStatus::UsCitizen => DbTaxStatus::UsCitizen,
        TaxStatus::GreenCard => DbTaxStatus::GreenCard,
        TaxStatus::VisaResident => DbTaxStatus::VisaResident,
        TaxStatus::VisaNonresident => DbTaxStatus::VisaNonresident,
    }
}

fn tax_status_from_db(status: DbTaxStatus) -> TaxStatus {
    match status {
        DbTaxStatus::UsCitizen => TaxStatus::UsCitizen,
        DbTaxStatus::GreenCard => TaxStatus::GreenCard,
        DbTaxStatus::VisaResident => TaxStatus::VisaResident,
        DbTaxStatus::VisaNonresident => TaxStatus::VisaNonresident,
    }
}

fn category_to_db(category: ExpenseCategory) -> DbExpenseCategory {
    match category {
        ExpenseCategory::Airfare => DbExpenseCategory::Airfare,
        ExpenseCategory::GroundTransport => DbExpenseCategory::Ground,
        ExpenseCategory::Lodging => DbExpenseCategory::Lodging,
        ExpenseCategory::Meals => DbExpenseCategory::Meals,
        ExpenseCategory::Baggage => DbExpenseCategory::Baggage,
        ExpenseCategory::Other => DbExpenseCategory::Other,
    }
}

fn category_from_db(category: DbExpenseCategory) -> ExpenseCategory {
    match category {
        DbExpenseCategory::Airfare => ExpenseCategory::Airfare,
        DbExpenseCategory::Ground => ExpenseCategory::GroundTransport,
        DbExpenseCategory::Lodging => ExpenseCategory::Lodging,
        DbExpenseCategory::Meals => ExpenseCategory::Meals,
        DbExpenseCategory::Baggage => ExpenseCategory::Baggage,
        DbExpenseCategory::Other => ExpenseCategory::Other,
    }
}

fn payment_method_to_db(method: PaymentMethod) -> DbPaymentMethod {
    match method {
        PaymentMethod::Check => DbPaymentMethod::Check,
        PaymentMethod::Ach => DbPaymentMethod::Ach,
    }
}

fn payment_method_from_db(method: DbPaymentMethod) -> PaymentMethod {
    match method {
        DbPaymentMethod::Check => PaymentMethod::Check,
        DbPaymentMethod::Ach => PaymentMethod::Ach,
    }
}

fn account_type_to_db(account_type: BankAccountType) -> DbBankAccountType {
    match account_type {
        BankAccountType::Checking => DbBankAccountType::Checking,
        BankAccountType::Savings => DbBankAccountType::Savings,
    }
}

fn account_type_from_db(account_type: DbBankAccountType) -> BankAccountType {
    match account_type {
        DbBankAccountType::Checking => BankAccountType::Checking,
        DbBankAccountType::Savings => BankAccountType::Savings,
    }
}

// ============================================================================
// Aggregate conversions
// ============================================================================

fn to_json<T: Serialize>(value: &Option<T>) -> Result<Option<serde_json::Value>, DatabaseError> {
    value.as_ref().map(serde_json::to_value).transpose().map_err(Into::into)
}

fn from_json<T: DeserializeOwned>(value: Option<serde_json::Value>) -> Result<Option<T>, DatabaseError> {
    value.map(serde_json::from_value).transpose().map_err(Into::into)
}

fn money(amount: Decimal, currency: Currency) -> Money {
    Money::new(amount, currency)
}

fn request_to_record(request: &ReimbursementRequest) -> Result<RequestRecord, DatabaseError> {
    let version = i32::try_from(request.version)
        .map_err(|_| DatabaseError::SerializationError("version out of range".into()))?;

    let row = RequestRow {
        request_id: *request.id.as_uuid(),
        person_id: *request.person_id.as_uuid(),
        enrollment_id: request.enrollment_id.map(|id| *id.as_uuid()),
        program_id: request.program_id.map(|id| *id.as_uuid()),
        submitted_by: *request.submitted_by.as_uuid(),
        status: status_to_db(request.status),
        currency: request.currency.code().to_string(),

        tax_status: tax_status_to_db(request.tax.tax_status),
        citizenship_country: request.tax.citizenship_country.clone(),
        visa_type: request.tax.visa_type.clone(),
        passport_number: request.tax.passport_number.clone(),
        us_entry_date: request.tax.us_entry_date,
        passport_copy: to_json(&request.passport_copy)?,
        i94_document: to_json(&request.i94_document)?,
        tax_info_snapshot: to_json(&request.tax_info_snapshot)?,

        payment_method: payment_method_to_db(request.payment.payment_method),
        payment_address: request.payment.payment_address.clone(),
        bank_name: request.payment.bank_name.clone(),
        bank_routing_number: request.payment.bank_routing_number.clone(),
        bank_account_number: request.payment.bank_account_number.clone(),
        bank_account_type: request.payment.bank_account_type.map(account_type_to_db),
        payment_info_snapshot: to_json(&request.payment_info_snapshot)?,

        total_requested: request.total_requested.amount(),
        total_approved: request.total_approved.map(|m| m.amount()),
        total_paid: request.total_paid.map(|m| m.amount()),

        submitted_at: request.submitted_at,
        reviewed_at: request.reviewed_at,
        reviewed_by: request.reviewed_by.map(|id| *id.as_uuid()),
        approved_at: request.approved_at,
        approved_by: request.approved_by.map(|id| *id.as_uuid()),
        paid_at: request.paid_at,
        paid_by: request.paid_by.map(|id| *id.as_uuid()),
        payment_reference: request.payment_reference.clone(),
        cancelled_at: request.cancelled_at,
        cancelled_by: request.cancelled_by.map(|id| *id.as_uuid()),
        cancellation_reason: request.cancellation_reason.clone(),

        submitter_notes: request.submitter_notes.clone(),
        reviewer_notes: request.reviewer_notes.clone(),
        change_request_notes: request.change_request_notes.clone(),
        signature: request.signature.clone(),
        signed_at: request.signed_at,

        version,
        created_at: request.created_at,
        updated_at: request.updated_at,
    };

    let mut line_items = Vec::with_capacity(request.line_items.len());
    let mut receipts = Vec::new();
    for (position, item) in request.line_items.iter().enumerate() {
        line_items.push(LineItemRow {
            line_item_id: *item.id.as_uuid(),
            request_id: row.request_id,
            position: position as i32,
            category: category_to_db(item.category),
            description: item.description.clone(),
            date_incurred: item.date_incurred,
            amount_requested: item.amount_requested.amount(),
            amount_approved: item.amount_approved.map(|m| m.amount()),
            reviewer_notes: item.reviewer_notes.clone(),
            created_at: item.created_at,
        });
        for receipt in &item.receipts {
            let file_size = i64::try_from(receipt.document.file_size)
                .map_err(|_| DatabaseError::SerializationError("file size out of range".into()))?;
            receipts.push(ReceiptRow {
                receipt_id: *receipt.id.as_uuid(),
                line_item_id: *item.id.as_uuid(),
                storage_key: receipt.document.storage_key.clone(),
                original_filename: receipt.document.original_filename.clone(),
                file_size,
                uploaded_at: receipt.document.uploaded_at,
                created_at: receipt.created_at,
            });
        }
    }

    Ok(RequestRecord {
        request: row,
        line_items,
        receipts,
    })
}

fn record_to_request(record: RequestRecord) -> Result<ReimbursementRequest, DatabaseError> {
    let RequestRecord {
        request: row,
        line_items,
        receipts,
    } = record;

    let currency: Currency = row
        .currency
        .parse()
        .map_err(|e: core_kernel::MoneyError| DatabaseError::SerializationError(e.to_string()))?;

    let mut receipts_by_item: HashMap<_, Vec<Receipt>> = HashMap::new();
    for r in receipts {
        let file_size = u64::try_from(r.file_size)
            .map_err(|_| DatabaseError::SerializationError("negative file size".into()))?;
        receipts_by_item.entry(r.line_item_id).or_default().push(Receipt {
            id: ReceiptId::from_uuid(r.receipt_id),
            document: DocumentRef {
                storage_key: r.storage_key,
                original_filename: r.original_filename,
                file_size,
                uploaded_at: r.uploaded_at,
            },
            created_at: r.created_at,
        });
    }

    let line_items = line_items
        .into_iter()
        .map(|item| ExpenseLineItem {
            id: LineItemId::from_uuid(item.line_item_id),
            category: category_from_db(item.category),
            description: item.description,
            date_incurred: item.date_incurred,
            amount_requested: money(item.amount_requested, currency),
            amount_approved: item.amount_approved.map(|a| money(a, currency)),
            reviewer_notes: item.reviewer_notes,
            receipts: receipts_by_item.remove(&item.line_item_id).unwrap_or_default(),
            created_at: item.created_at,
        })
        .collect();

    let version = u32::try_from(row.version)
        .map_err(|_| DatabaseError::SerializationError("negative version".into()))?;

    Ok(ReimbursementRequest {
        id: ReimbursementId::from_uuid(row.request_id),
        person_id: PersonId::from_uuid(row.person_id),
        enrollment_id: row.enrollment_id.map(EnrollmentId::from_uuid),
        program_id: row.program_id.map(ProgramId::from_uuid),
        submitted_by: UserId::from_uuid(row.submitted_by),
        status: status_from_db(row.status),
        currency,

        tax: TaxDetails {
            tax_status: tax_status_from_db(row.tax_status),
            citizenship_country: row.citizenship_country,
            visa_type: row.visa_type,
            passport_number: row.passport_number,
            us_entry_date: row.us_entry_date,
        },
        passport_copy: from_json(row.passport_copy)?,
        i94_document: from_json(row.i94_document)?,
        tax_info_snapshot: from_json(row.tax_info_snapshot)?,

        payment: PaymentDetails {
            payment_method: payment_method_from_db(row.payment_method),
            payment_address: row.payment_address,
            bank_name: row.bank_name,
            bank_routing_number: row.bank_routing_number,
            bank_account_number: row.bank_account_number,
            bank_account_type: row.bank_account_type.map(account_type_from_db),
        },
        payment_info_snapshot: from_json(row.payment_info_snapshot)?,

        line_items,
        total_requested: money(row.total_requested, currency),
        total_approved: row.total_approved.map(|a| money(a, currency)),
        total_paid: row.total_paid.map(|a| money(a, currency)),

        submitted_at: row.submitted_at,
        reviewed_at: row.reviewed_at,
        reviewed_by: row.reviewed_by.map(UserId::from_uuid),
        approved_at: row.approved_at,
        approved_by: row.approved_by.map(UserId::from_uuid),
        paid_at: row.paid_at,
        paid_by: row.paid_by.map(UserId::from_uuid),
        payment_reference: row.payment_reference,
        cancelled_at: row.cancelled_at,
        cancelled_by: row.cancelled_by.map(UserId::from_uuid),
        cancellation_reason: row.cancellation_reason,

        submitter_notes: row.submitter_notes,
        reviewer_notes: row.reviewer_notes,
        change_request_notes: row.change_request_notes,
        signature: row.signature,
        signed_at: row.signed_at,

        version,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    use domain_reimbursements::{NewLineItem, NewReimbursement, VisaDocumentKind};

    fn submitted_request() -> ReimbursementRequest {
        let now = Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap();
        let mut tax = TaxDetails::new(TaxStatus::VisaNonresident);
        tax.citizenship_country = Some("Brazil".into());
        tax.visa_type = Some("J-1".into());
        let mut request = ReimbursementRequest::create(
            NewReimbursement {
                person_id: PersonId::new(),
                enrollment_id: Some(EnrollmentId::new()),
                program_id: Some(ProgramId::new()),
                submitted_by: UserId::new(),
                tax,
                payment: PaymentDetails::ach("Credit Union", "121000358", "000123456789", BankAccountType::Checking),
                submitter_notes: None,
            },
            now,
        )
        .unwrap();

        let passport = DocumentRef::new("visa/passport.pdf", "passport.pdf", 52_000, now);
        request
            .attach_visa_document(VisaDocumentKind::PassportCopy, passport, 10 * 1024 * 1024, now)
            .unwrap();
        let item = request
            .add_line_item(
                NewLineItem {
                    category: ExpenseCategory::GroundTransport,
                    description: "Airport shuttle".into(),
                    date_incurred: NaiveDate::from_ymd_opt(2025, 4, 28).unwrap(),
                    amount_requested: Money::usd(dec!(48.50)),
                },
                now,
            )
            .unwrap();
        let receipt = DocumentRef::new("r/shuttle.jpg", "shuttle.jpg", 9_000, now);
        request.add_receipt(item, receipt, 10 * 1024 * 1024, now).unwrap();
        request.submit("Ana Silva", now).unwrap();
        request
    }

    #[test]
    fn test_request_record_round_trip() {
        let request = submitted_request();
        let record = request_to_record(&request).unwrap();

        assert_eq!(record.request.status, DbStatus::Submitted);
        assert_eq!(record.request.currency, "USD");
        assert_eq!(record.line_items.len(), 1);
        assert_eq!(record.line_items[0].category, DbExpenseCategory::Ground);
        assert_eq!(record.receipts.len(), 1);
        assert!(record.request.payment_info_snapshot.is_some());

        assert_eq!(record_to_request(record).unwrap(), request);
    }

    #[test]
    fn test_line_item_positions_follow_order() {
        let mut request = submitted_request();
        request.status = RequestStatus::Draft;
        let second = NewLineItem {
            category: ExpenseCategory::Meals,
            description: "Dinner".into(),
            date_incurred: NaiveDate::from_ymd_opt(2025, 4, 29).unwrap(),
            amount_requested: Money::usd(dec!(22)),
        };
        request.add_line_item(second, Utc::now()).unwrap();

        let record = request_to_record(&request).unwrap();
        let positions: Vec<i32> = record.line_items.iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![0, 1]);
    }

    #[test]
    fn test_unknown_currency_is_rejected() {
        let mut record = request_to_record(&submitted_request()).unwrap();
        record.request.currency = "XXX".into();
        assert!(matches!(
            record_to_request(record),
            Err(DatabaseError::SerializationError(_))
        ));
    }
}
