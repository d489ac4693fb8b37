//! Implementation of SpendingStorage trait for SQLite storage.

use noteline_storage_traits::spending::SpendingStorage;
use noteline_storage_traits::spending::error::SpendingError;
use noteline_storage_traits::spending::types::SpendRecord;
use rusqlite::params;

use crate::NotelineSqliteStorage;

#[inline]
fn into_spending_err<T>(e: T) -> SpendingError
where
    T: std::error::Error,
{
    SpendingError::DatabaseError(e.to_string())
}

impl SpendingStorage for NotelineSqliteStorage {
    fn record_spend(&self, record: SpendRecord) -> Result<(), SpendingError> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO spend_records (participant, amount, recorded_at) VALUES (?, ?, ?)",
                params![record.participant, record.amount, record.recorded_at],
            )
            .map_err(into_spending_err)?;
            Ok(())
        })
    }

    fn total_spent_since(&self, since: u64) -> Result<u64, SpendingError> {
        self.with_connection(|conn| {
            let total: i64 = conn
                .query_row(
                    "SELECT COALESCE(SUM(amount), 0) FROM spend_records WHERE recorded_at >= ?",
                    [since],
                    |row| row.get(0),
                )
                .map_err(into_spending_err)?;

            u64::try_from(total).map_err(into_spending_err)
        })
    }
}
