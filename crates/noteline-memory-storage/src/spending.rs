//! Memory-based storage implementation of the SpendingStorage trait

use noteline_storage_traits::spending::SpendingStorage;
use noteline_storage_traits::spending::error::SpendingError;
use noteline_storage_traits::spending::types::SpendRecord;

use crate::NotelineMemoryStorage;

impl SpendingStorage for NotelineMemoryStorage {
    fn record_spend(&self, record: SpendRecord) -> Result<(), SpendingError> {
        let mut inner = self.inner.write();
        inner.spend_records.push(record);
        Ok(())
    }

    fn total_spent_since(&self, since: u64) -> Result<u64, SpendingError> {
        let inner = self.inner.read();
        Ok(inner
            .spend_records
            .iter()
            .filter(|r| r.recorded_at >= since)
            .fold(0u64, |acc, r| acc.saturating_add(r.amount)))
    }
}
