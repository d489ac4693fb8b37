//! Contacts module
//!
//! A contact is a messaging counterpart identified by a pre-shared secret.
//! Contacts start *unmatched* (no ledger address known) and are promoted to
//! *matched* exactly once, when the discovery poller decrypts a message from
//! them. The address is immutable after promotion and unique across contacts.

pub mod error;
pub mod types;

use self::error::ContactError;
use self::types::*;

/// Storage traits for the contacts module
pub trait ContactStorage {
    /// Insert or update a contact.
    ///
    /// Updating keeps the stored `mobile_address` once it is set, and never
    /// moves either ratchet counter backwards.
    ///
    /// Returns [`ContactError::AddressConflict`] if the contact carries a
    /// `mobile_address` already claimed by a different contact.
    fn save_contact(&self, contact: Contact) -> Result<(), ContactError>;

    /// Find a contact by its id
    fn find_contact(&self, id: &str) -> Result<Option<Contact>, ContactError>;

    /// Find the contact that owns a discovered ledger address
    fn find_contact_by_address(&self, address: &str) -> Result<Option<Contact>, ContactError>;

    /// All contacts, active or not, ordered by creation time
    fn all_contacts(&self) -> Result<Vec<Contact>, ContactError>;

    /// Active contacts in `network` that have no address yet
    fn unmatched_contacts(&self, network: &str) -> Result<Vec<Contact>, ContactError>;

    /// Record the discovered address for an unmatched contact.
    ///
    /// Promoting to the address the contact already holds is a no-op and
    /// returns [`Promotion::AlreadyMatched`]. Promoting to a different address
    /// returns [`ContactError::AlreadyMatched`]; promoting to an address owned
    /// by another contact returns [`ContactError::AddressConflict`].
    fn promote_contact(&self, id: &str, address: &str) -> Result<Promotion, ContactError>;

    /// Mark a contact inactive. Contacts are never deleted.
    fn deactivate_contact(&self, id: &str) -> Result<(), ContactError>;

    /// Return the contact's current outbound counter and advance it by one.
    ///
    /// The read and the increment happen atomically so a counter value is
    /// handed out at most once.
    fn next_outbound_counter(&self, id: &str) -> Result<u64, ContactError>;

    /// Raise the highest accepted inbound counter to `counter`.
    ///
    /// A counter at or below the stored one leaves it unchanged.
    fn record_inbound_counter(&self, id: &str, counter: u64) -> Result<(), ContactError>;
}
