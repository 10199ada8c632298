use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Money;

/// Gateway-reported status of a payment transaction.
///
/// This is a closed set; anything else the gateway sends is treated as
/// unrecognized by the caller and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Complete,
    FullRefund,
    PartialRefund,
    Ambiguous,
    NotFound,
    Canceled,
    Failed,
}

impl TransactionStatus {
    /// All statuses, in display order.
    pub const ALL: [TransactionStatus; 8] = [
        TransactionStatus::Pending,
        TransactionStatus::Complete,
        TransactionStatus::FullRefund,
        TransactionStatus::PartialRefund,
        TransactionStatus::Ambiguous,
        TransactionStatus::NotFound,
        TransactionStatus::Canceled,
        TransactionStatus::Failed,
    ];

    /// Returns the wire name used by the gateway and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Complete => "COMPLETE",
            TransactionStatus::FullRefund => "FULL_REFUND",
            TransactionStatus::PartialRefund => "PARTIAL_REFUND",
            TransactionStatus::Ambiguous => "AMBIGUOUS",
            TransactionStatus::NotFound => "NOT_FOUND",
            TransactionStatus::Canceled => "CANCELED",
            TransactionStatus::Failed => "FAILED",
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, TransactionStatus::Complete)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unrecognized transaction status '{s}'"))
    }
}

/// One row of the payment ledger.
///
/// Records are immutable audit facts: inserted once per gateway round trip
/// and never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Globally unique transaction identifier (ledger key).
    pub transaction_id: String,

    /// Merchant product code echoed by the gateway.
    pub product_code: String,

    /// Total amount charged.
    pub total_amount: Money,

    /// Status reported by the gateway.
    pub status: TransactionStatus,

    /// Gateway reference identifier, when the gateway supplied one.
    pub ref_id: Option<String>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Creates a new record builder.
    pub fn builder() -> TransactionRecordBuilder {
        TransactionRecordBuilder::default()
    }
}

/// Builder for constructing ledger records.
#[derive(Debug, Default)]
pub struct TransactionRecordBuilder {
    transaction_id: Option<String>,
    product_code: Option<String>,
    total_amount: Option<Money>,
    status: Option<TransactionStatus>,
    ref_id: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl TransactionRecordBuilder {
    pub fn transaction_id(mut self, id: impl Into<String>) -> Self {
        self.transaction_id = Some(id.into());
        self
    }

    pub fn product_code(mut self, code: impl Into<String>) -> Self {
        self.product_code = Some(code.into());
        self
    }

    pub fn total_amount(mut self, amount: Money) -> Self {
        self.total_amount = Some(amount);
        self
    }

    pub fn status(mut self, status: TransactionStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the gateway reference. Empty strings are treated as absent.
    pub fn ref_id(mut self, ref_id: Option<String>) -> Self {
        self.ref_id = ref_id.filter(|r| !r.is_empty());
        self
    }

    /// Sets the creation time. If not set, the current time will be used.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Builds the record.
    ///
    /// # Panics
    ///
    /// Panics if transaction_id, product_code, total_amount or status is not set.
    pub fn build(self) -> TransactionRecord {
        TransactionRecord {
            transaction_id: self.transaction_id.expect("transaction_id is required"),
            product_code: self.product_code.expect("product_code is required"),
            total_amount: self.total_amount.expect("total_amount is required"),
            status: self.status.expect("status is required"),
            ref_id: self.ref_id,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}
