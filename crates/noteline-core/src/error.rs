//! Noteline errors

use noteline_storage_traits::contacts::error::ContactError;
use noteline_storage_traits::conversations::error::ConversationError;
use noteline_storage_traits::cursors::error::CursorError;
use noteline_storage_traits::events::error::EventError;
use noteline_storage_traits::spending::error::SpendingError;

use crate::chunker::ChunkError;
use crate::envelope::DecodeError;
use crate::ledger::LedgerError;
use crate::spending::SpendingExceeded;

/// Noteline error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Ledger client error
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// Envelope could not be parsed
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// AEAD tag check failed
    #[error("Envelope authentication failed")]
    Authentication,
    /// Encryption failed
    #[error("Encryption failed: {0}")]
    Encryption(String),
    /// Key derivation failed
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
    /// The envelope was sealed for a different path
    #[error("Unexpected envelope version: expected {expected:#04x}, got {actual:#04x}")]
    WrongEnvelopeVersion {
        /// Version this operation handles
        expected: u8,
        /// Version found on the envelope
        actual: u8,
    },
    /// The peer public key is a low-order point
    #[error("Key exchange produced a non-contributory shared secret")]
    WeakKeyExchange,
    /// Chunking failed
    #[error(transparent)]
    Chunk(#[from] ChunkError),
    /// The spending ceiling would be exceeded
    #[error(transparent)]
    SpendingLimit(#[from] SpendingExceeded),
    /// Contact storage error
    #[error(transparent)]
    Contact(#[from] ContactError),
    /// Conversation storage error
    #[error(transparent)]
    Conversation(#[from] ConversationError),
    /// Cursor storage error
    #[error(transparent)]
    Cursor(#[from] CursorError),
    /// Event storage error
    #[error(transparent)]
    Event(#[from] EventError),
    /// Spending storage error
    #[error(transparent)]
    Spending(#[from] SpendingError),
    /// Neither a PSK contact nor a sending identity could be resolved
    #[error("No route to participant {0}")]
    NoRoute(String),
    /// Some chunks of a PSK message were submitted before a failure
    #[error("Partial delivery: {sent} of {total} chunks sent before failure: {source}")]
    PartialDelivery {
        /// Chunks submitted
        sent: usize,
        /// Chunks in the message
        total: usize,
        /// Failure that stopped the sequence
        source: LedgerError,
    },
    /// Grouped transmission failed and so did the single fallback
    #[error("Fallback transmission failed after group failure ({group}): {fallback}")]
    FallbackFailed {
        /// Group submission error
        group: LedgerError,
        /// Single submission error
        fallback: LedgerError,
    },
    /// No identity is registered for the default sender
    #[error("No default identity configured")]
    MissingDefaultIdentity,
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// Background task failure
    #[error("Background task failed: {0}")]
    Task(String),
}
