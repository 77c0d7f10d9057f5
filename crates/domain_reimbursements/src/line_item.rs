//! Expense line items, receipts and stored documents

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{LineItemId, Money, ReceiptId};
use crate::error::ReimbursementError;

/// Maximum length of an expense description
pub const MAX_DESCRIPTION_LEN: usize = 255;

/// File extensions accepted for receipts and visa documents
pub const ALLOWED_DOCUMENT_EXTENSIONS: [&str; 4] = ["pdf", "jpg", "jpeg", "png"];

/// Default upload limit for receipts and visa documents (10 MiB)
pub const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 10 * 1024 * 1024;

/// Expense categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Airfare,
    #[serde(rename = "ground")]
    GroundTransport,
    Lodging,
    Meals,
    Baggage,
    Other,
}

impl ExpenseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Airfare => "airfare",
            ExpenseCategory::GroundTransport => "ground",
            ExpenseCategory::Lodging => "lodging",
            ExpenseCategory::Meals => "meals",
            ExpenseCategory::Baggage => "baggage",
            ExpenseCategory::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExpenseCategory::Airfare => "Airfare",
            ExpenseCategory::GroundTransport => "Ground Transportation",
            ExpenseCategory::Lodging => "Lodging",
            ExpenseCategory::Meals => "Meals / Per Diem",
            ExpenseCategory::Baggage => "Baggage Fees",
            ExpenseCategory::Other => "Other",
        }
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpenseCategory {
    type Err = ReimbursementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "airfare" => Ok(ExpenseCategory::Airfare),
            "ground" => Ok(ExpenseCategory::GroundTransport),
            "lodging" => Ok(ExpenseCategory::Lodging),
            "meals" => Ok(ExpenseCategory::Meals),
            "baggage" => Ok(ExpenseCategory::Baggage),
            "other" => Ok(ExpenseCategory::Other),
            other => Err(ReimbursementError::validation(
                "category",
                format!("Unknown expense category: {}", other),
            )),
        }
    }
}

/// Metadata of an uploaded file held by the document store
///
/// The bytes themselves live elsewhere; `storage_key` locates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub storage_key: String,
    pub original_filename: String,
    pub file_size: u64,
    pub uploaded_at: DateTime<Utc>,
}

impl DocumentRef {
    pub fn new(
        storage_key: impl Into<String>,
        original_filename: impl Into<String>,
        file_size: u64,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            storage_key: storage_key.into(),
            original_filename: original_filename.into(),
            file_size,
            uploaded_at,
        }
    }

    /// Lower-cased extension of the original filename
    pub fn extension(&self) -> Option<String> {
        self.original_filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }

    /// Checks the file type and size against the upload rules
    pub fn validate(&self, max_bytes: u64) -> Result<(), ReimbursementError> {
        let allowed = self
            .extension()
            .map_or(false, |ext| ALLOWED_DOCUMENT_EXTENSIONS.contains(&ext.as_str()));
        if !allowed {
            return Err(ReimbursementError::validation(
                "file",
                "Invalid file type. Allowed types: PDF, JPG, PNG.",
            ));
        }
        if self.file_size > max_bytes {
            return Err(ReimbursementError::validation(
                "file",
                format!("File too large. Max size: {} MB.", max_bytes / (1024 * 1024)),
            ));
        }
        Ok(())
    }
}

/// A receipt supporting one expense
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    pub document: DocumentRef,
    pub created_at: DateTime<Utc>,
}

impl Receipt {
    pub fn new(document: DocumentRef) -> Self {
        Self {
            id: ReceiptId::new_v7(),
            created_at: document.uploaded_at,
            document,
        }
    }
}

/// Input for a new expense
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLineItem {
    pub category: ExpenseCategory,
    pub description: String,
    pub date_incurred: NaiveDate,
    pub amount_requested: Money,
}

/// An individual expense within a reimbursement request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseLineItem {
    pub id: LineItemId,
    pub category: ExpenseCategory,
    pub description: String,
    pub date_incurred: NaiveDate,
    pub amount_requested: Money,
    /// Set by the approver; `None` until the request is approved
    pub amount_approved: Option<Money>,
    pub reviewer_notes: Option<String>,
    pub receipts: Vec<Receipt>,
    pub created_at: DateTime<Utc>,
}

impl ExpenseLineItem {
    /// Validates the input and builds a line item
    pub fn create(new: NewLineItem, now: DateTime<Utc>) -> Result<Self, ReimbursementError> {
        let description = new.description.trim();
        if description.is_empty() {
            return Err(ReimbursementError::validation("description", "Description is required."));
        }
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(ReimbursementError::validation(
                "description",
                format!("Description must be at most {} characters.", MAX_DESCRIPTION_LEN),
            ));
        }
        validate_requested_amount(&new.amount_requested)?;

        Ok(Self {
            id: LineItemId::new_v7(),
            category: new.category,
            description: description.to_string(),
            date_incurred: new.date_incurred,
            amount_requested: new.amount_requested,
            amount_approved: None,
            reviewer_notes: None,
            receipts: Vec::new(),
            created_at: now,
        })
    }

    pub fn has_receipts(&self) -> bool {
        !self.receipts.is_empty()
    }

    /// Approved amount, or zero before approval
    pub fn approved_or_zero(&self) -> Money {
        self.amount_approved
            .unwrap_or_else(|| Money::zero(self.amount_requested.currency()))
    }
}

fn validate_requested_amount(amount: &Money) -> Result<(), ReimbursementError> {
    if !amount.is_positive() {
        return Err(ReimbursementError::validation(
            "amount_requested",
            "Amount must be greater than zero.",
        ));
    }
    amount
        .validate_storage()
        .map_err(|e| ReimbursementError::validation("amount_requested", e.to_string()))
}
