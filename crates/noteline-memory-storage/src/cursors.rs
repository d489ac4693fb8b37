//! Memory-based storage implementation of the CursorStorage trait

use noteline_storage_traits::cursors::CursorStorage;
use noteline_storage_traits::cursors::error::CursorError;

use crate::NotelineMemoryStorage;

impl CursorStorage for NotelineMemoryStorage {
    fn cursor(&self, name: &str) -> Result<Option<u64>, CursorError> {
        let inner = self.inner.read();
        Ok(inner.cursors.get(name).copied())
    }

    fn save_cursor(&self, name: &str, height: u64) -> Result<(), CursorError> {
        let mut inner = self.inner.write();
        let stored = inner.cursors.entry(name.to_string()).or_insert(height);
        *stored = (*stored).max(height);
        Ok(())
    }
}
