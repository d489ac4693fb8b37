//! Cursor storage test functions

use noteline_storage_traits::cursors::CursorStorage;

/// Cursors are independent per name and never move backwards
pub fn test_cursor_only_moves_forward<S>(storage: S)
where
    S: CursorStorage,
{
    assert_eq!(storage.cursor("inbound").unwrap(), None);

    storage.save_cursor("inbound", 120).unwrap();
    storage.save_cursor("discovery", 40).unwrap();
    assert_eq!(storage.cursor("inbound").unwrap(), Some(120));
    assert_eq!(storage.cursor("discovery").unwrap(), Some(40));

    storage.save_cursor("inbound", 80).unwrap();
    assert_eq!(storage.cursor("inbound").unwrap(), Some(120));

    storage.save_cursor("inbound", 121).unwrap();
    assert_eq!(storage.cursor("inbound").unwrap(), Some(121));
}
