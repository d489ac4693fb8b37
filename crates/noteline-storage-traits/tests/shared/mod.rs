//! Shared test functions run against every storage backend

use noteline_storage_traits::contacts::types::Contact;
use noteline_storage_traits::events::types::{Direction, MessageEvent};

pub mod contact_tests;
pub mod conversation_tests;
pub mod cursor_tests;
pub mod event_tests;
pub mod spending_tests;

/// Create an unmatched test contact
pub fn create_test_contact(id: &str) -> Contact {
    let secret = format!("psk-{id}-fedcba9876543210");
    Contact::new(id, format!("nick-{id}"), secret.as_bytes(), "testnet")
}

/// Create an event with a fixed timestamp
pub fn create_test_event(
    participant: &str,
    content: &str,
    direction: Direction,
    timestamp: u64,
) -> MessageEvent {
    MessageEvent {
        participant: participant.to_string(),
        content: content.to_string(),
        direction,
        fee: match direction {
            Direction::Outbound => Some(1000),
            _ => None,
        },
        timestamp,
    }
}
