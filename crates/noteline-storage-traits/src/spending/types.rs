//! Types for the spending module

use serde::{Deserialize, Serialize};

/// One debit against the spending ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendRecord {
    /// Participant the money was spent sending to
    pub participant: String,
    /// Amount in ledger base units (fees plus any transferred value)
    pub amount: u64,
    /// Unix seconds
    pub recorded_at: u64,
}
