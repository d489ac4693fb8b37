//! Implementation of CursorStorage trait for SQLite storage.

use noteline_storage_traits::cursors::CursorStorage;
use noteline_storage_traits::cursors::error::CursorError;
use rusqlite::{OptionalExtension, params};

use crate::NotelineSqliteStorage;

#[inline]
fn into_cursor_err<T>(e: T) -> CursorError
where
    T: std::error::Error,
{
    CursorError::DatabaseError(e.to_string())
}

impl CursorStorage for NotelineSqliteStorage {
    fn cursor(&self, name: &str) -> Result<Option<u64>, CursorError> {
        self.with_connection(|conn| {
            conn.query_row("SELECT height FROM cursors WHERE name = ?", [name], |row| {
                row.get::<_, u64>(0)
            })
            .optional()
            .map_err(into_cursor_err)
        })
    }

    fn save_cursor(&self, name: &str, height: u64) -> Result<(), CursorError> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO cursors (name, height) VALUES (?, ?)
                 ON CONFLICT(name) DO UPDATE SET height = MAX(height, excluded.height)",
                params![name, height],
            )
            .map_err(into_cursor_err)?;
            Ok(())
        })
    }
}
