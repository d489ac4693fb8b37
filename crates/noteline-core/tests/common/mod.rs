//! Fixtures shared by the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use noteline_core::prelude::*;
use noteline_memory_storage::NotelineMemoryStorage;
use noteline_storage_traits::contacts::ContactStorage;
use noteline_test_utils::MockLedger;
use parking_lot::Mutex;

pub const OWNER: &str = "OWNER-ADDRESS";
pub const OWNER_SEED: [u8; 32] = [1u8; 32];

pub struct Harness {
    pub noteline: Arc<Noteline>,
    pub ledger: Arc<MockLedger>,
    pub storage: Arc<NotelineMemoryStorage>,
}

pub fn harness(config: NotelineConfig) -> Harness {
    harness_with_ledger(config, MockLedger::new())
}

pub fn harness_with_ledger(config: NotelineConfig, ledger: MockLedger) -> Harness {
    let ledger = Arc::new(ledger);
    let storage = Arc::new(NotelineMemoryStorage::default());
    let noteline = Noteline::builder(storage.clone(), ledger.clone())
        .with_config(config)
        .with_default_identity(Identity::from_bytes(OWNER, OWNER_SEED))
        .build()
        .unwrap();
    Harness {
        noteline: Arc::new(noteline),
        ledger,
        storage,
    }
}

/// A peer with its own identity that can open direct envelopes sent to it
pub fn peer(address: &str, seed: [u8; 32], ledger: &Arc<MockLedger>) -> Noteline {
    let identity = Identity::from_bytes(address, seed);
    ledger.set_public_key(address, identity.public_key());
    Noteline::builder(Arc::new(NotelineMemoryStorage::default()), ledger.clone())
        .with_default_identity(identity)
        .build()
        .unwrap()
}

/// Save a contact already matched to `address`
pub fn matched_contact(
    storage: &NotelineMemoryStorage,
    id: &str,
    address: &str,
    secret: &[u8],
) -> Contact {
    storage
        .save_contact(Contact::new(id, format!("nick-{id}"), secret, "testnet"))
        .unwrap();
    storage.promote_contact(id, address).unwrap();
    storage.find_contact(id).unwrap().unwrap()
}

#[derive(Debug, Default)]
pub struct RecordingEvents(pub Mutex<Vec<MessageEvent>>);

impl RecordingEvents {
    pub fn events(&self) -> Vec<MessageEvent> {
        self.0.lock().clone()
    }
}

impl EventListener for RecordingEvents {
    fn on_event(&self, event: &MessageEvent) {
        self.0.lock().push(event.clone());
    }
}

#[derive(Debug, Default)]
pub struct RecordingFirstMessages(pub Mutex<Vec<FirstMessage>>);

impl RecordingFirstMessages {
    pub fn messages(&self) -> Vec<FirstMessage> {
        self.0.lock().clone()
    }
}

impl FirstMessageListener for RecordingFirstMessages {
    fn on_first_message(&self, message: &FirstMessage) {
        self.0.lock().push(message.clone());
    }
}
