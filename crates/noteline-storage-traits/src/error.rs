//! Error types shared by noteline storage backends

use thiserror::Error;

/// Backend-level storage error.
///
/// The per-domain traits return their own error enums; backends convert
/// their native errors into this type first when an operation spans
/// several domains (e.g. opening a database or running migrations).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotelineStorageError {
    /// Database operation failed
    #[error("database error: {0}")]
    Database(String),

    /// Serialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Requested item was not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("error: {0}")]
    Other(String),
}
