//! Types for the contacts module

use crate::Secret;

/// A messaging counterpart keyed by a pre-shared secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// Opaque identifier
    pub id: String,
    /// Operator-chosen display name
    pub nickname: String,
    /// Raw pre-shared secret seeding the key ratchet
    pub initial_secret: Secret<Vec<u8>>,
    /// Ledger address, `None` until discovered
    pub mobile_address: Option<String>,
    /// Inactive contacts are ignored by discovery and routing
    pub active: bool,
    /// Logical ledger namespace (e.g. `testnet`)
    pub network: String,
    /// Next ratchet counter to use for outbound messages
    pub outbound_counter: u64,
    /// Highest ratchet counter accepted from the contact, if any
    pub inbound_counter: Option<u64>,
    /// Unix seconds when the contact was created
    pub created_at: u64,
}

impl Contact {
    /// Create a new unmatched, active contact
    pub fn new<I, N, W>(id: I, nickname: N, initial_secret: &[u8], network: W) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        W: Into<String>,
    {
        Self {
            id: id.into(),
            nickname: nickname.into(),
            initial_secret: Secret::from_slice(initial_secret),
            mobile_address: None,
            active: true,
            network: network.into(),
            outbound_counter: 0,
            inbound_counter: None,
            created_at: crate::unix_now(),
        }
    }

    /// Whether the contact's ledger address has been discovered
    pub fn is_matched(&self) -> bool {
        self.mobile_address.is_some()
    }
}

/// Result of a promotion attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    /// The contact moved from unmatched to matched
    Promoted,
    /// The contact already held this address; nothing changed
    AlreadyMatched,
}
