//! Spending module
//!
//! Every successful send debits the spending ledger. The governor in the
//! core keeps the authoritative running total in memory; these records make
//! the total survive restarts.

pub mod error;
pub mod types;

use self::error::SpendingError;
use self::types::SpendRecord;

/// Storage traits for the spending module
pub trait SpendingStorage {
    /// Append a debit
    fn record_spend(&self, record: SpendRecord) -> Result<(), SpendingError>;

    /// Sum of all debits recorded at or after `since` (unix seconds)
    fn total_spent_since(&self, since: u64) -> Result<u64, SpendingError>;
}
