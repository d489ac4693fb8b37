//! SQLite-based storage implementation for noteline.
//!
//! Implements [`NotelineStorageProvider`] on top of a single SQLite
//! connection. State survives restarts; this is the backend used by the
//! `noteline` CLI and by long-running deployments.
//!
//! The schema is managed by embedded [`refinery`] migrations that run every
//! time a storage is opened.
//!
//! ```no_run
//! use noteline_sqlite_storage::NotelineSqliteStorage;
//!
//! let storage = NotelineSqliteStorage::new("/path/to/noteline.db")?;
//! # Ok::<(), noteline_sqlite_storage::error::Error>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use noteline_storage_traits::{Backend, NotelineStorageProvider};
use rusqlite::Connection;

mod contacts;
mod conversations;
mod cursors;
mod db;
pub mod error;
mod events;
mod migrations;
mod permissions;
mod spending;

use self::error::Error;
pub use self::permissions::verify_permissions;

/// A SQLite-based storage implementation for noteline.
///
/// All operations are serialized through one connection, which is what
/// makes multi-statement operations such as counter allocation and contact
/// promotion atomic.
pub struct NotelineSqliteStorage {
    connection: Arc<Mutex<Connection>>,
}

impl fmt::Debug for NotelineSqliteStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotelineSqliteStorage").finish_non_exhaustive()
    }
}

impl NotelineSqliteStorage {
    /// Opens (or creates) the database at `file_path` and applies migrations.
    ///
    /// The file and any missing parent directories are created with
    /// owner-only permissions on Unix.
    pub fn new<P>(file_path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let file_path = file_path.as_ref();
        permissions::precreate_secure_database_file(file_path)?;

        let mut connection = Self::open_connection(file_path)?;
        migrations::run_migrations(&mut connection)?;

        tracing::debug!(path = %file_path.display(), "Opened SQLite storage");

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Creates a new in-memory [`NotelineSqliteStorage`].
    ///
    /// Useful for tests; nothing is persisted.
    pub fn new_in_memory() -> Result<Self, Error> {
        let mut connection = Connection::open_in_memory()?;
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::run_migrations(&mut connection)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn open_connection(file_path: &Path) -> Result<Connection, Error> {
        let conn = Connection::open(file_path)?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(conn)
    }

    /// Runs `f` with exclusive access to the connection.
    ///
    /// A poisoned lock is recovered: every operation leaves the database in a
    /// consistent state at statement granularity, so the connection remains
    /// usable after a panic elsewhere.
    pub(crate) fn with_connection<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&Connection) -> T,
    {
        let conn = self
            .connection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&conn)
    }
}

impl NotelineStorageProvider for NotelineSqliteStorage {
    fn backend(&self) -> Backend {
        Backend::SQLite
    }
}
