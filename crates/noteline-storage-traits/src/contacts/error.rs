//! Error types for the contacts module

use std::fmt;

/// Error types for the contacts module
#[derive(Debug, PartialEq, Eq)]
pub enum ContactError {
    /// Invalid parameters
    InvalidParameters(String),
    /// Database error
    DatabaseError(String),
    /// No contact with this id
    NotFound(String),
    /// The address is already owned by another contact
    AddressConflict {
        /// The contested address
        address: String,
        /// Contact that already owns it
        owner_id: String,
    },
    /// The contact is matched to a different address
    AlreadyMatched {
        /// Contact id
        id: String,
        /// Address the contact already holds
        address: String,
    },
}

impl std::error::Error for ContactError {}

impl fmt::Display for ContactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameters(message) => write!(f, "Invalid parameters: {}", message),
            Self::DatabaseError(message) => write!(f, "Database error: {}", message),
            Self::NotFound(id) => write!(f, "Contact not found: {id}"),
            Self::AddressConflict { address, owner_id } => {
                write!(f, "Address {address} already belongs to contact {owner_id}")
            }
            Self::AlreadyMatched { id, address } => {
                write!(f, "Contact {id} is already matched to {address}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_error_display() {
        let err = ContactError::NotFound("c1".to_string());
        assert_eq!(err.to_string(), "Contact not found: c1");

        let err = ContactError::AddressConflict {
            address: "ADDR".to_string(),
            owner_id: "c2".to_string(),
        };
        assert_eq!(err.to_string(), "Address ADDR already belongs to contact c2");
    }
}
