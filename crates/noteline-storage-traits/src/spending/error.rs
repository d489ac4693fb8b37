//! Error types for the spending module

use std::fmt;

/// Error types for the spending module
#[derive(Debug, PartialEq, Eq)]
pub enum SpendingError {
    /// Database error
    DatabaseError(String),
}

impl std::error::Error for SpendingError {}

impl fmt::Display for SpendingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DatabaseError(message) => write!(f, "Database error: {}", message),
        }
    }
}
