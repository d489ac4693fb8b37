//! Cursors module
//!
//! Named block heights that background scans resume from, so a restart does
//! not scan (and deliver) the same transactions again.

pub mod error;

use self::error::CursorError;

/// Storage traits for the cursors module
pub trait CursorStorage {
    /// Stored height for `name`, if any
    fn cursor(&self, name: &str) -> Result<Option<u64>, CursorError>;

    /// Store `height` for `name`.
    ///
    /// Cursors only move forward: a height below the stored one is ignored.
    fn save_cursor(&self, name: &str, height: u64) -> Result<(), CursorError>;
}
