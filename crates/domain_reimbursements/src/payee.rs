//! Tax and payment information of the payee
//!
//! Both are editable while the request is a draft and are frozen into
//! snapshots when it is submitted, so later profile edits never change
//! what was reviewed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ReimbursementError;

/// Maximum number of digits in a bank account number
pub const MAX_ACCOUNT_NUMBER_DIGITS: usize = 17;

/// US tax status for payment processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxStatus {
    UsCitizen,
    GreenCard,
    VisaResident,
    VisaNonresident,
}

impl TaxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxStatus::UsCitizen => "us_citizen",
            TaxStatus::GreenCard => "green_card",
            TaxStatus::VisaResident => "visa_resident",
            TaxStatus::VisaNonresident => "visa_nonresident",
        }
    }

    pub fn is_visa_holder(&self) -> bool {
        matches!(self, TaxStatus::VisaResident | TaxStatus::VisaNonresident)
    }
}

impl FromStr for TaxStatus {
    type Err = ReimbursementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "us_citizen" => Ok(TaxStatus::UsCitizen),
            "green_card" => Ok(TaxStatus::GreenCard),
            "visa_resident" => Ok(TaxStatus::VisaResident),
            "visa_nonresident" => Ok(TaxStatus::VisaNonresident),
            other => Err(ReimbursementError::validation(
                "tax_status",
                format!("Unknown tax status: {}", other),
            )),
        }
    }
}

impl fmt::Display for TaxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the reimbursement will be paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Mailed check
    Check,
    /// Direct deposit
    Ach,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Check => "check",
            PaymentMethod::Ach => "ach",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ReimbursementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "check" => Ok(PaymentMethod::Check),
            "ach" => Ok(PaymentMethod::Ach),
            other => Err(ReimbursementError::validation(
                "payment_method",
                format!("Unknown payment method: {}", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankAccountType {
    Checking,
    Savings,
}

impl BankAccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BankAccountType::Checking => "checking",
            BankAccountType::Savings => "savings",
        }
    }
}

impl FromStr for BankAccountType {
    type Err = ReimbursementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checking" => Ok(BankAccountType::Checking),
            "savings" => Ok(BankAccountType::Savings),
            other => Err(ReimbursementError::validation(
                "bank_account_type",
                format!("Unknown account type: {}", other),
            )),
        }
    }
}

/// Tax information entered by the submitter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxDetails {
    pub tax_status: TaxStatus,
    pub citizenship_country: Option<String>,
    pub visa_type: Option<String>,
    pub passport_number: Option<String>,
    pub us_entry_date: Option<NaiveDate>,
}

impl TaxDetails {
    pub fn new(tax_status: TaxStatus) -> Self {
        Self {
            tax_status,
            citizenship_country: None,
            visa_type: None,
            passport_number: None,
            us_entry_date: None,
        }
    }

    /// Freezes the current values
    pub fn snapshot(&self) -> TaxInfoSnapshot {
        TaxInfoSnapshot {
            tax_status: self.tax_status,
            citizenship_country: self.citizenship_country.clone(),
            visa_type: self.visa_type.clone(),
            passport_number: self.passport_number.clone(),
            us_entry_date: self.us_entry_date,
        }
    }
}

/// Payment information entered by the submitter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub payment_method: PaymentMethod,
    /// Mailing address for checks
    pub payment_address: Option<String>,
    pub bank_name: Option<String>,
    pub bank_routing_number: Option<String>,
    pub bank_account_number: Option<String>,
    pub bank_account_type: Option<BankAccountType>,
}

impl PaymentDetails {
    pub fn check(address: impl Into<String>) -> Self {
        Self {
            payment_method: PaymentMethod::Check,
            payment_address: Some(address.into()),
            bank_name: None,
            bank_routing_number: None,
            bank_account_number: None,
            bank_account_type: None,
        }
    }

    pub fn ach(
        bank_name: impl Into<String>,
        routing_number: impl Into<String>,
        account_number: impl Into<String>,
        account_type: BankAccountType,
    ) -> Self {
        Self {
            payment_method: PaymentMethod::Ach,
            payment_address: None,
            bank_name: Some(bank_name.into()),
            bank_routing_number: Some(routing_number.into()),
            bank_account_number: Some(account_number.into()),
            bank_account_type: Some(account_type),
        }
    }

    /// Checks the shape of whatever bank fields are filled in
    pub fn validate_format(&self) -> Result<(), ReimbursementError> {
        if let Some(routing) = filled(&self.bank_routing_number) {
            if routing.len() != 9 || !routing.chars().all(|c| c.is_ascii_digit()) {
                return Err(ReimbursementError::validation(
                    "bank_routing_number",
                    "Routing number must be exactly 9 digits.",
                ));
            }
        }
        if let Some(account) = filled(&self.bank_account_number) {
            if account.len() > MAX_ACCOUNT_NUMBER_DIGITS || !account.chars().all(|c| c.is_ascii_digit()) {
                return Err(ReimbursementError::validation(
                    "bank_account_number",
                    format!("Account number must be at most {} digits.", MAX_ACCOUNT_NUMBER_DIGITS),
                ));
            }
        }
        Ok(())
    }

    /// Every field the chosen payment method still needs, with its message
    pub fn missing_fields(&self) -> Vec<(&'static str, &'static str)> {
        let mut missing = Vec::new();
        match self.payment_method {
            PaymentMethod::Check => {
                if filled(&self.payment_address).is_none() {
                    missing.push(("payment_address", "Mailing address is required for check payments."));
                }
            }
            PaymentMethod::Ach => {
                if filled(&self.bank_name).is_none() {
                    missing.push(("bank_name", "Bank name is required for direct deposit."));
                }
                if filled(&self.bank_routing_number).is_none() {
                    missing.push(("bank_routing_number", "Routing number is required for direct deposit."));
                }
                if filled(&self.bank_account_number).is_none() {
                    missing.push(("bank_account_number", "Account number is required for direct deposit."));
                }
                if self.bank_account_type.is_none() {
                    missing.push(("bank_account_type", "Account type is required for direct deposit."));
                }
            }
        }
        missing
    }

    /// Freezes the current values, keeping only the last four account digits
    pub fn snapshot(&self) -> PaymentInfoSnapshot {
        let bank_account_last4 = filled(&self.bank_account_number).map(|number| {
            let skip = number.chars().count().saturating_sub(4);
            number.chars().skip(skip).collect()
        });
        PaymentInfoSnapshot {
            payment_method: self.payment_method,
            payment_address: self.payment_address.clone(),
            bank_name: self.bank_name.clone(),
            bank_account_type: self.bank_account_type,
            bank_account_last4,
        }
    }
}

/// Tax information as it was at submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxInfoSnapshot {
    pub tax_status: TaxStatus,
    pub citizenship_country: Option<String>,
    pub visa_type: Option<String>,
    pub passport_number: Option<String>,
    pub us_entry_date: Option<NaiveDate>,
}

/// Payment information as it was at submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInfoSnapshot {
    pub payment_method: PaymentMethod,
    pub payment_address: Option<String>,
    pub bank_name: Option<String>,
    pub bank_account_type: Option<BankAccountType>,
    pub bank_account_last4: Option<String>,
}

/// A trimmed, non-empty value
pub(crate) fn filled(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ach_missing_fields() {
        let mut payment = PaymentDetails::ach("First Bank", "123456789", "000123456789", BankAccountType::Checking);
        assert!(payment.missing_fields().is_empty());

        payment.bank_name = Some("  ".into());
        payment.bank_account_type = None;
        let fields: Vec<_> = payment.missing_fields().into_iter().map(|(f, _)| f).collect();
        assert_eq!(fields, vec!["bank_name", "bank_account_type"]);
    }

    #[test]
    fn test_check_requires_address() {
        let mut payment = PaymentDetails::check("1 Main St");
        assert!(payment.missing_fields().is_empty());
        payment.payment_address = None;
        assert_eq!(payment.missing_fields().len(), 1);
    }

    #[test]
    fn test_bank_number_format() {
        assert!(PaymentDetails::ach("B", "12345678", "1", BankAccountType::Savings).validate_format().is_err());
        assert!(PaymentDetails::ach("B", "12345678a", "1", BankAccountType::Savings).validate_format().is_err());
        assert!(PaymentDetails::ach("B", "123456789", "123456789012345678", BankAccountType::Savings)
            .validate_format()
            .is_err());
        assert!(PaymentDetails::ach("B", "123456789", "12345678901234567", BankAccountType::Savings)
            .validate_format()
            .is_ok());
    }

    #[test]
    fn test_payment_snapshot_masks_account() {
        let payment = PaymentDetails::ach("First Bank", "123456789", "000123456789", BankAccountType::Checking);
        let snapshot = payment.snapshot();
        assert_eq!(snapshot.bank_account_last4.as_deref(), Some("6789"));

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("000123456789"));
        assert!(!json.contains("123456789\""));
    }

    #[test]
    fn test_visa_holder() {
        assert!(TaxStatus::VisaResident.is_visa_holder());
        assert!(TaxStatus::VisaNonresident.is_visa_holder());
        assert!(!TaxStatus::GreenCard.is_visa_holder());
    }
}
