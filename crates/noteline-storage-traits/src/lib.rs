//! Noteline storage - storage provider traits and data model for on-ledger messaging.
//!
//! The core crate never talks to a database directly. Everything it persists
//! (contacts, conversations, the append-only message event log, spend
//! records and scan cursors) goes through the traits defined here, so
//! backends can be swapped without touching the messaging logic.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod contacts;
pub mod conversations;
pub mod cursors;
pub mod error;
pub mod events;
/// Secret wrapper for zeroization
pub mod secret;
pub mod spending;
#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use error::NotelineStorageError;
pub use secret::{Secret, Zeroize};

use self::contacts::ContactStorage;
use self::conversations::ConversationStorage;
use self::cursors::CursorStorage;
use self::events::EventStorage;
use self::spending::SpendingStorage;

/// Backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Memory
    Memory,
    /// SQLite
    SQLite,
}

impl Backend {
    /// Check if it's a persistent backend
    ///
    /// All values different from [`Backend::Memory`] are considered persistent
    pub fn is_persistent(&self) -> bool {
        !matches!(self, Self::Memory)
    }
}

/// Storage provider for noteline.
///
/// Combines every storage concern the messaging core needs:
/// - Contact storage (PSK contacts, promotion, outbound counters)
/// - Conversation storage (participant to agent/session mapping)
/// - Event storage (append-only message event audit log)
/// - Spending storage (debits recorded by the spending governor)
/// - Cursor storage (resume heights of inbound scans)
pub trait NotelineStorageProvider:
    ContactStorage
    + ConversationStorage
    + CursorStorage
    + EventStorage
    + SpendingStorage
    + Send
    + Sync
{
    /// Returns the backend type.
    fn backend(&self) -> Backend;
}

/// Current unix time in seconds.
///
/// Returns 0 if the system clock is set before the unix epoch.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
