use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{TransactionRecord, TransactionStatus};

/// Builder for constructing ledger queries.
///
/// Results are always ordered newest first.
#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    /// Filter by status.
    pub status: Option<TransactionStatus>,

    /// Case-insensitive substring match on transaction id, product code or ref id.
    pub search: Option<String>,

    /// Filter by records created at or after this timestamp.
    pub from_timestamp: Option<DateTime<Utc>>,

    /// Filter by records created at or before this timestamp.
    pub to_timestamp: Option<DateTime<Utc>>,

    /// Maximum number of records to return.
    pub limit: Option<usize>,

    /// Number of records to skip.
    pub offset: Option<usize>,
}

impl TransactionQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: TransactionStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Adds a search term. Blank terms are ignored.
    pub fn search(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        let term = term.trim();
        self.search = (!term.is_empty()).then(|| term.to_string());
        self
    }

    pub fn from_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    pub fn to_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the record passes every filter (ignores limit/offset).
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        if let Some(status) = self.status
            && record.status != status
        {
            return false;
        }
        if let Some(from) = self.from_timestamp
            && record.created_at < from
        {
            return false;
        }
        if let Some(to) = self.to_timestamp
            && record.created_at > to
        {
            return false;
        }
        if let Some(ref term) = self.search {
            let term = term.to_lowercase();
            let hit = record.transaction_id.to_lowercase().contains(&term)
                || record.product_code.to_lowercase().contains(&term)
                || record
                    .ref_id
                    .as_deref()
                    .is_some_and(|r| r.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Ledger counts shown on the back-office overview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransactionSummary {
    pub total: u64,
    pub pending: u64,
    pub complete: u64,
}
