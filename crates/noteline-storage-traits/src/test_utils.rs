//! Fixtures shared by backend tests

use crate::contacts::types::Contact;
use crate::conversations::types::Conversation;
use crate::events::types::{Direction, MessageEvent};

/// An unmatched contact whose secret is derived from `id`
pub fn create_test_contact(id: &str) -> Contact {
    let secret = format!("psk-{id}-0123456789abcdef");
    Contact::new(id, format!("nick-{id}"), secret.as_bytes(), "testnet")
}

/// An owner conversation with `participant`
pub fn create_test_conversation(id: &str, participant: &str) -> Conversation {
    Conversation::owner(id, participant)
}

/// An event with a fixed timestamp so ordering assertions are deterministic
pub fn create_test_event(participant: &str, content: &str, timestamp: u64) -> MessageEvent {
    MessageEvent {
        participant: participant.to_string(),
        content: content.to_string(),
        direction: Direction::Outbound,
        fee: Some(1000),
        timestamp,
    }
}
