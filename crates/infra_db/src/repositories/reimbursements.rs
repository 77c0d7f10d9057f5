//! Reimbursement request repository
//!
//! A request is stored across three tables: the request itself, its
//! expense line items and their receipts. Reads assemble a
//! [`RequestRecord`]; writes replace the children wholesale inside the
//! same transaction as the parent row.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::DatabaseError;

const REQUEST_COLUMNS: &str = r#"
    request_id, person_id, enrollment_id, program_id, submitted_by, status, currency,
    tax_status, citizenship_country, visa_type, passport_number, us_entry_date,
    passport_copy, i94_document, tax_info_snapshot,
    payment_method, payment_address, bank_name, bank_routing_number, bank_account_number,
    bank_account_type, payment_info_snapshot,
    total_requested, total_approved, total_paid,
    submitted_at, reviewed_at, reviewed_by, approved_at, approved_by, paid_at, paid_by,
    payment_reference, cancelled_at, cancelled_by, cancellation_reason,
    submitter_notes, reviewer_notes, change_request_notes, signature, signed_at,
    version, created_at, updated_at
"#;

/// Repository for reimbursement requests and their expenses
#[derive(Debug, Clone)]
pub struct ReimbursementRepository {
    pool: PgPool,
}

impl ReimbursementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads a request with its line items and receipts
    pub async fn get(&self, request_id: Uuid) -> Result<RequestRecord, DatabaseError> {
        let request = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {} FROM reimbursement_requests WHERE request_id = $1",
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("ReimbursementRequest", request_id))?;

        let mut records = self.attach_children(vec![request]).await?;
        records
            .pop()
            .ok_or_else(|| DatabaseError::not_found("ReimbursementRequest", request_id))
    }

    /// Inserts a new request with its children
    pub async fn insert(&self, record: &RequestRecord) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        insert_request(&mut tx, &record.request).await.map_err(|e| match e {
            DatabaseError::DuplicateEntry(_) => DatabaseError::duplicate(
                "ReimbursementRequest",
                "id",
                record.request.request_id,
            ),
            other => other,
        })?;
        insert_children(&mut tx, record).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Saves a request if it is still at `expected_version`
    ///
    /// The stored version is bumped by one and returned. If another writer
    /// got there first nothing is written and `VersionConflict` is returned.
    pub async fn save(&self, record: &RequestRecord, expected_version: i32) -> Result<i32, DatabaseError> {
        let r = &record.request;
        let mut tx = self.pool.begin().await?;

        let new_version: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE reimbursement_requests SET
                enrollment_id = $3, program_id = $4, status = $5, currency = $6,
                tax_status = $7, citizenship_country = $8, visa_type = $9, passport_number = $10,
                us_entry_date = $11, passport_copy = $12, i94_document = $13, tax_info_snapshot = $14,
                payment_method = $15, payment_address = $16, bank_name = $17,
                bank_routing_number = $18, bank_account_number = $19, bank_account_type = $20,
                payment_info_snapshot = $21,
                total_requested = $22, total_approved = $23, total_paid = $24,
                submitted_at = $25, reviewed_at = $26, reviewed_by = $27, approved_at = $28,
                approved_by = $29, paid_at = $30, paid_by = $31, payment_reference = $32,
                cancelled_at = $33, cancelled_by = $34, cancellation_reason = $35,
                submitter_notes = $36, reviewer_notes = $37, change_request_notes = $38,
                signature = $39, signed_at = $40, updated_at = $41,
                version = version + 1
            WHERE request_id = $1 AND version = $2
            RETURNING version
            "#,
        )
        .bind(r.request_id)
        .bind(expected_version)
        .bind(r.enrollment_id)
        .bind(r.program_id)
        .bind(r.status)
        .bind(&r.currency)
        .bind(r.tax_status)
        .bind(&r.citizenship_country)
        .bind(&r.visa_type)
        .bind(&r.passport_number)
        .bind(r.us_entry_date)
        .bind(&r.passport_copy)
        .bind(&r.i94_document)
        .bind(&r.tax_info_snapshot)
        .bind(r.payment_method)
        .bind(&r.payment_address)
        .bind(&r.bank_name)
        .bind(&r.bank_routing_number)
        .bind(&r.bank_account_number)
        .bind(r.bank_account_type)
        .bind(&r.payment_info_snapshot)
        .bind(r.total_requested)
        .bind(r.total_approved)
        .bind(r.total_paid)
        .bind(r.submitted_at)
        .bind(r.reviewed_at)
        .bind(r.reviewed_by)
        .bind(r.approved_at)
        .bind(r.approved_by)
        .bind(r.paid_at)
        .bind(r.paid_by)
        .bind(&r.payment_reference)
        .bind(r.cancelled_at)
        .bind(r.cancelled_by)
        .bind(&r.cancellation_reason)
        .bind(&r.submitter_notes)
        .bind(&r.reviewer_notes)
        .bind(&r.change_request_notes)
        .bind(&r.signature)
        .bind(r.signed_at)
        .bind(r.updated_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(new_version) = new_version else {
            let current: Option<i32> = sqlx::query_scalar(
                "SELECT version FROM reimbursement_requests WHERE request_id = $1",
            )
            .bind(r.request_id)
            .fetch_optional(&mut *tx)
            .await?;
            return Err(match current {
                None => DatabaseError::not_found("ReimbursementRequest", r.request_id),
                Some(current) => DatabaseError::VersionConflict(format!(
                    "request {} is at version {}, expected {}",
                    r.request_id, current, expected_version
                )),
            });
        };

        // Receipts go with their line items through ON DELETE CASCADE
        sqlx::query("DELETE FROM expense_line_items WHERE request_id = $1")
            .bind(r.request_id)
            .execute(&mut *tx)
            .await?;
        insert_children(&mut tx, record).await?;

        tx.commit().await?;
        Ok(new_version)
    }

    /// Requests matching the filter, newest first
    pub async fn search(&self, filter: &RequestFilter) -> Result<Vec<RequestRecord>, DatabaseError> {
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM reimbursement_requests WHERE TRUE",
            REQUEST_COLUMNS
        ));

        if let Some(user_id) = filter.submitted_by {
            builder.push(" AND submitted_by = ").push_bind(user_id);
        }
        if let Some(person_id) = filter.person_id {
            builder.push(" AND person_id = ").push_bind(person_id);
        }
        if let Some(program_id) = filter.program_id {
            builder.push(" AND program_id = ").push_bind(program_id);
        }
        if !filter.statuses.is_empty() {
            builder.push(" AND status IN (");
            let mut separated = builder.separated(", ");
            for status in &filter.statuses {
                separated.push_bind(*status);
            }
            separated.push_unseparated(")");
        }
        builder.push(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let requests = builder
            .build_query_as::<RequestRow>()
            .fetch_all(&self.pool)
            .await?;
        self.attach_children(requests).await
    }

    /// Totals and per-status counts for the requests of one program
    pub async fn program_summary(&self, program_id: Uuid) -> Result<ProgramSummaryRow, DatabaseError> {
        let totals = sqlx::query_as::<_, ProgramTotalsRow>(
            r#"
            SELECT
                COUNT(*) AS total_requests,
                COALESCE(SUM(total_requested), 0) AS total_requested,
                COALESCE(SUM(total_approved), 0) AS total_approved,
                COALESCE(SUM(total_paid), 0) AS total_paid
            FROM reimbursement_requests
            WHERE program_id = $1
            "#,
        )
        .bind(program_id)
        .fetch_one(&self.pool)
        .await?;

        let by_status = sqlx::query_as::<_, StatusCountRow>(
            r#"
            SELECT status, COUNT(*) AS count
            FROM reimbursement_requests
            WHERE program_id = $1
            GROUP BY status
            "#,
        )
        .bind(program_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ProgramSummaryRow { totals, by_status })
    }

    /// Loads line items and receipts for the given requests in two queries
    async fn attach_children(&self, requests: Vec<RequestRow>) -> Result<Vec<RequestRecord>, DatabaseError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let request_ids: Vec<Uuid> = requests.iter().map(|r| r.request_id).collect();

        let items = sqlx::query_as::<_, LineItemRow>(
            r#"
            SELECT line_item_id, request_id, position, category, description, date_incurred,
                   amount_requested, amount_approved, reviewer_notes, created_at
            FROM expense_line_items
            WHERE request_id = ANY($1)
            ORDER BY request_id, position
            "#,
        )
        .bind(&request_ids)
        .fetch_all(&self.pool)
        .await?;

        let item_ids: Vec<Uuid> = items.iter().map(|i| i.line_item_id).collect();
        let receipts = if item_ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query_as::<_, ReceiptRow>(
                r#"
                SELECT receipt_id, line_item_id, storage_key, original_filename, file_size,
                       uploaded_at, created_at
                FROM receipts
                WHERE line_item_id = ANY($1)
                ORDER BY created_at, receipt_id
                "#,
            )
            .bind(&item_ids)
            .fetch_all(&self.pool)
            .await?
        };

        let mut items_by_request: HashMap<Uuid, Vec<LineItemRow>> = HashMap::new();
        for item in items {
            items_by_request.entry(item.request_id).or_default().push(item);
        }
        let mut receipts_by_item: HashMap<Uuid, Vec<ReceiptRow>> = HashMap::new();
        for receipt in receipts {
            receipts_by_item.entry(receipt.line_item_id).or_default().push(receipt);
        }

        Ok(requests
            .into_iter()
            .map(|request| {
                let line_items = items_by_request.remove(&request.request_id).unwrap_or_default();
                let receipts = line_items
                    .iter()
                    .flat_map(|i| receipts_by_item.remove(&i.line_item_id).unwrap_or_default())
                    .collect();
                RequestRecord {
                    request,
                    line_items,
                    receipts,
                }
            })
            .collect())
    }
}

async fn insert_request(conn: &mut sqlx::PgConnection, r: &RequestRow) -> Result<(), DatabaseError> {
    sqlx::query(&format!(
        r#"
        INSERT INTO reimbursement_requests ({})
        VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
            $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32, $33, $34,
            $35, $36, $37, $38, $39, $40, $41, $42, $43, $44
        )
        "#,
        REQUEST_COLUMNS
    ))
    .bind(r.request_id)
    .bind(r.person_id)
    .bind(r.enrollment_id)
    .bind(r.program_id)
    .bind(r.submitted_by)
    .bind(r.status)
    .bind(&r.currency)
    .bind(r.tax_status)
    .bind(&r.citizenship_country)
    .bind(&r.visa_type)
    .bind(&r.passport_number)
    .bind(r.us_entry_date)
    .bind(&r.passport_copy)
    .bind(&r.i94_document)
    .bind(&r.tax_info_snapshot)
    .bind(r.payment_method)
    .bind(&r.payment_address)
    .bind(&r.bank_name)
    .bind(&r.bank_routing_number)
    .bind(&r.bank_account_number)
    .bind(r.bank_account_type)
    .bind(&r.payment_info_snapshot)
    .bind(r.total_requested)
    .bind(r.total_approved)
    .bind(r.total_paid)
    .bind(r.submitted_at)
    .bind(r.reviewed_at)
    .bind(r.reviewed_by)
    .bind(r.approved_at)
    .bind(r.approved_by)
    .bind(r.paid_at)
    .bind(r.paid_by)
    .bind(&r.payment_reference)
    .bind(r.cancelled_at)
    .bind(r.cancelled_by)
    .bind(&r.cancellation_reason)
    .bind(&r.submitter_notes)
    .bind(&r.reviewer_notes)
    .bind(&r.change_request_notes)
    .bind(&r.signature)
    .bind(r.signed_at)
    .bind(r.version)
    .bind(r.created_at)
    .bind(r.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_children(conn: &mut sqlx::PgConnection, record: &RequestRecord) -> Result<(), DatabaseError> {
    for item in &record.line_items {
        sqlx::query(
            r#"
            INSERT INTO expense_line_items (
                line_item_id, request_id, position, category, description, date_incurred,
                amount_requested, amount_approved, reviewer_notes, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(item.line_item_id)
        .bind(record.request.request_id)
        .bind(item.position)
        .bind(item.category)
        .bind(&item.description)
        .bind(item.date_incurred)
        .bind(item.amount_requested)
        .bind(item.amount_approved)
        .bind(&item.reviewer_notes)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;
    }

    for receipt in &record.receipts {
        sqlx::query(
            r#"
            INSERT INTO receipts (
                receipt_id, line_item_id, storage_key, original_filename, file_size,
                uploaded_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(receipt.receipt_id)
        .bind(receipt.line_item_id)
        .bind(&receipt.storage_key)
        .bind(&receipt.original_filename)
        .bind(receipt.file_size)
        .bind(receipt.uploaded_at)
        .bind(receipt.created_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Filters for [`ReimbursementRepository::search`]
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub submitted_by: Option<Uuid>,
    pub person_id: Option<Uuid>,
    pub program_id: Option<Uuid>,
    pub statuses: Vec<ReimbursementStatus>,
    pub limit: Option<u32>,
}

/// A request row with its children
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub request: RequestRow,
    /// Ordered by position
    pub line_items: Vec<LineItemRow>,
    pub receipts: Vec<ReceiptRow>,
}

/// Database enum for request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "reimbursement_status", rename_all = "snake_case")]
pub enum ReimbursementStatus {
    Draft,
    Submitted,
    ChangesNeeded,
    Approved,
    Paid,
    Cancelled,
}

/// Database enum for tax status
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "tax_status", rename_all = "snake_case")]
pub enum TaxStatus {
    UsCitizen,
    GreenCard,
    VisaResident,
    VisaNonresident,
}

/// Database enum for payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
pub enum PaymentMethod {
    Check,
    Ach,
}

/// Database enum for bank account type
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "bank_account_type", rename_all = "snake_case")]
pub enum BankAccountType {
    Checking,
    Savings,
}

/// Database enum for expense category
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "expense_category", rename_all = "snake_case")]
pub enum ExpenseCategory {
    Airfare,
    Ground,
    Lodging,
    Meals,
    Baggage,
    Other,
}

/// Row from the `reimbursement_requests` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RequestRow {
    pub request_id: Uuid,
    pub person_id: Uuid,
    pub enrollment_id: Option<Uuid>,
    pub program_id: Option<Uuid>,
    pub submitted_by: Uuid,
    pub status: ReimbursementStatus,
    pub currency: String,

    pub tax_status: TaxStatus,
    pub citizenship_country: Option<String>,
    pub visa_type: Option<String>,
    pub passport_number: Option<String>,
    pub us_entry_date: Option<NaiveDate>,
    pub passport_copy: Option<serde_json::Value>,
    pub i94_document: Option<serde_json::Value>,
    pub tax_info_snapshot: Option<serde_json::Value>,

    pub payment_method: PaymentMethod,
    pub payment_address: Option<String>,
    pub bank_name: Option<String>,
    pub bank_routing_number: Option<String>,
    pub bank_account_number: Option<String>,
    pub bank_account_type: Option<BankAccountType>,
    pub payment_info_snapshot: Option<serde_json::Value>,

    pub total_requested: Decimal,
    pub total_approved: Option<Decimal>,
    pub total_paid: Option<Decimal>,

    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub paid_at: Option<DateTime<Utc>>,
    pub paid_by: Option<Uuid>,
    pub payment_reference: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,

    pub submitter_notes: Option<String>,
    pub reviewer_notes: Option<String>,
    pub change_request_notes: Option<String>,
    pub signature: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,

    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row from the `expense_line_items` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LineItemRow {
    pub line_item_id: Uuid,
    pub request_id: Uuid,
    pub position: i32,
    pub category: ExpenseCategory,
    pub description: String,
    pub date_incurred: NaiveDate,
    pub amount_requested: Decimal,
    pub amount_approved: Option<Decimal>,
    pub reviewer_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row from the `receipts` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReceiptRow {
    pub receipt_id: Uuid,
    pub line_item_id: Uuid,
    pub storage_key: String,
    pub original_filename: String,
    pub file_size: i64,
    pub uploaded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProgramTotalsRow {
    pub total_requests: i64,
    pub total_requested: Decimal,
    pub total_approved: Decimal,
    pub total_paid: Decimal,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatusCountRow {
    pub status: ReimbursementStatus,
    pub count: i64,
}

#[derive(Debug, Clone)]
pub struct ProgramSummaryRow {
    pub totals: ProgramTotalsRow,
    pub by_status: Vec<StatusCountRow>,
}
