//! Error types for the cursors module

use std::fmt;

/// Error types for the cursors module
#[derive(Debug, PartialEq, Eq)]
pub enum CursorError {
    /// Database error
    DatabaseError(String),
}

impl std::error::Error for CursorError {}

impl fmt::Display for CursorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DatabaseError(message) => write!(f, "Database error: {}", message),
        }
    }
}
