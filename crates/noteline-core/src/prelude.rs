//! Noteline public prelude
//!
//! The types most callers need. Storage backends are imported from their own
//! crates.
//!
//! ```rust
//! use noteline_core::prelude::*;
//!
//! let config = NotelineConfig::default();
//! assert_eq!(config.psk_chunk_bytes, 800);
//! ```

// === Core types ===
pub use crate::callback::{EventListener, FirstMessage, FirstMessageListener, ListenerId};
pub use crate::config::NotelineConfig;
pub use crate::dead_letter::DeadLetter;
pub use crate::error::Error;
pub use crate::identity::Identity;
pub use crate::inbound::InboundOutcome;
pub use crate::ledger::{
    GroupReceipt, InboundTransaction, LedgerClient, LedgerError, Transaction, TransactionPage,
    TxReceipt,
};
pub use crate::poller::{PollerHandle, TickOutcome};
pub use crate::router::{Router, SendStrategy};
pub use crate::spending::SpendingSnapshot;
pub use crate::transmitter::SendOutcome;
pub use crate::{Noteline, NotelineBuilder};

// === Storage types ===
pub use noteline_storage_traits::contacts::types::Contact;
pub use noteline_storage_traits::conversations::types::Conversation;
pub use noteline_storage_traits::events::Pagination;
pub use noteline_storage_traits::events::types::{Direction, MessageEvent, StoredEvent};
pub use noteline_storage_traits::{NotelineStorageProvider, Secret};
