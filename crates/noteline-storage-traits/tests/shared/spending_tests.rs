//! Spending storage test functions

use noteline_storage_traits::spending::SpendingStorage;
use noteline_storage_traits::spending::types::SpendRecord;

/// Totals only include records inside the window
pub fn test_total_spent_since<S>(storage: S)
where
    S: SpendingStorage,
{
    assert_eq!(storage.total_spent_since(0).unwrap(), 0);

    for (amount, recorded_at) in [(700u64, 100u64), (200, 200), (50, 300)] {
        storage
            .record_spend(SpendRecord {
                participant: "ADDR-1".to_string(),
                amount,
                recorded_at,
            })
            .unwrap();
    }

    assert_eq!(storage.total_spent_since(0).unwrap(), 950);
    assert_eq!(storage.total_spent_since(200).unwrap(), 250);
    assert_eq!(storage.total_spent_since(301).unwrap(), 0);
}
