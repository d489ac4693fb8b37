//! Outbound delivery over the PSK and direct paths

mod common;

use std::sync::Arc;
use std::time::Duration;

use noteline_core::constant::TRUNCATION_MARKER;
use noteline_core::envelope::{self, Envelope};
use noteline_core::prelude::*;
use noteline_storage_traits::contacts::ContactStorage;
use noteline_storage_traits::spending::SpendingStorage;
use noteline_test_utils::MockLedger;

use self::common::*;

const ALICE: &str = "ALICE-ADDRESS";
const ALICE_SECRET: &[u8] = b"alice and owner share this";
const BOB: &str = "BOB-ADDRESS";

fn open_submissions(ledger: &MockLedger, secret: &[u8]) -> Vec<(u64, String)> {
    ledger
        .submissions()
        .iter()
        .map(|submission| {
            let envelope = Envelope::decode(&submission.transaction.note).unwrap();
            let plaintext =
                envelope::open_psk(secret, &submission.transaction.sender, &envelope).unwrap();
            (envelope.counter, String::from_utf8(plaintext).unwrap())
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_long_psk_message_is_chunked_and_paced() {
    let h = harness(NotelineConfig::default());
    matched_contact(&h.storage, "alice", ALICE, ALICE_SECRET);
    let message = "x".repeat(2000);

    let outcome = h.noteline.send(ALICE, &message).await;
    assert_eq!(
        outcome,
        SendOutcome::Delivered {
            transactions: 3,
            fee: 3000
        }
    );

    let submissions = h.ledger.submissions();
    assert_eq!(submissions.len(), 3);
    for pair in submissions.windows(2) {
        assert!(pair[1].at - pair[0].at >= Duration::from_millis(4000));
        assert_eq!(pair[0].transaction.sender, OWNER);
        assert_eq!(pair[0].transaction.receiver, ALICE);
    }

    let opened = open_submissions(&h.ledger, ALICE_SECRET);
    assert_eq!(
        opened.iter().map(|(counter, _)| *counter).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    let lengths: Vec<usize> = opened.iter().map(|(_, part)| part.len()).collect();
    assert_eq!(lengths, vec![800, 800, 400]);
    let reassembled: String = opened.into_iter().map(|(_, part)| part).collect();
    assert_eq!(reassembled, message);

    let contact = h.storage.find_contact("alice").unwrap().unwrap();
    assert_eq!(contact.outbound_counter, 3);

    let events = h.noteline.events(ALICE, Pagination::default()).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.direction, Direction::Outbound);
    assert_eq!(events[0].event.content, message);
    assert_eq!(events[0].event.fee, Some(3000));
    assert_eq!(h.noteline.spending().spent, 3000);
}

#[tokio::test(start_paused = true)]
async fn test_chunks_prefer_line_breaks() {
    let h = harness(NotelineConfig::default());
    matched_contact(&h.storage, "alice", ALICE, ALICE_SECRET);
    let paragraph = format!("{}\n", "word ".repeat(140));
    let message = paragraph.repeat(3);

    let outcome = h.noteline.send(ALICE, &message).await;
    assert!(outcome.is_delivered());

    let opened = open_submissions(&h.ledger, ALICE_SECRET);
    assert!(opened.len() > 1);
    for (_, part) in &opened[..opened.len() - 1] {
        assert!(part.ends_with('\n'));
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_sends_to_one_contact_do_not_interleave() {
    let h = harness(NotelineConfig::default());
    matched_contact(&h.storage, "alice", ALICE, ALICE_SECRET);
    let first = "a".repeat(1200);
    let second = "b".repeat(1200);

    let (one, two) = tokio::join!(h.noteline.send(ALICE, &first), h.noteline.send(ALICE, &second));
    assert!(one.is_delivered());
    assert!(two.is_delivered());

    let opened = open_submissions(&h.ledger, ALICE_SECRET);
    let counters: Vec<u64> = opened.iter().map(|(counter, _)| *counter).collect();
    assert_eq!(counters, vec![0, 1, 2, 3]);
    let letters: Vec<char> = opened
        .iter()
        .map(|(_, part)| part.chars().next().unwrap())
        .collect();
    assert!(letters == vec!['a', 'a', 'b', 'b'] || letters == vec!['b', 'b', 'a', 'a']);
}

#[tokio::test(start_paused = true)]
async fn test_partial_psk_failure_dead_letters_remainder() {
    let h = harness(NotelineConfig::default());
    matched_contact(&h.storage, "alice", ALICE, ALICE_SECRET);
    h.ledger.fail_submissions_after(1, LedgerError::Timeout);
    let message = "y".repeat(2000);

    let outcome = h.noteline.send(ALICE, &message).await;
    let SendOutcome::DeadLettered { reason } = outcome else {
        panic!("expected dead letter, got {outcome:?}");
    };
    assert!(reason.contains("1 of 3"), "{reason}");

    assert_eq!(h.ledger.submissions().len(), 1);
    let letters = h.noteline.dead_letters();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].participant, ALICE);
    assert_eq!(letters[0].content_length, 1200);
    assert_eq!(letters[0].preview.chars().count(), 100);

    let events = h.noteline.events(ALICE, Pagination::default()).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.content.len(), 800);
    assert_eq!(h.noteline.spending().spent, 1000);
    assert_eq!(h.noteline.spending().reserved, 0);
}

#[tokio::test]
async fn test_direct_message_is_grouped_and_reassembled() {
    let h = harness(NotelineConfig::default());
    let bob = peer(BOB, [9u8; 32], &h.ledger);
    let message = format!("{}\n{}", "first ".repeat(120), "second ".repeat(100));

    let outcome = h.noteline.send(BOB, &message).await;
    assert_eq!(
        outcome,
        SendOutcome::Delivered {
            transactions: 2,
            fee: 2000
        }
    );
    assert_eq!(h.ledger.groups().len(), 1);

    let inbound: Vec<InboundTransaction> = h
        .ledger
        .submissions()
        .iter()
        .map(|submission| submission.to_inbound())
        .collect();
    let outcomes = bob.process_inbound(&inbound);
    assert_eq!(
        outcomes,
        vec![InboundOutcome::Delivered {
            participant: OWNER.to_string(),
            content: message,
        }]
    );
}

#[tokio::test]
async fn test_group_failure_falls_back_to_truncated_single() {
    let ledger = MockLedger::new().with_fee(None);
    let h = harness_with_ledger(NotelineConfig::default(), ledger);
    let bob = peer(BOB, [9u8; 32], &h.ledger);
    h.ledger
        .fail_groups(LedgerError::Rejected("group too large".to_string()));
    let message = "z".repeat(1500);

    let outcome = h.noteline.send(BOB, &message).await;
    assert_eq!(outcome, SendOutcome::Truncated { fee: 1000 });

    let events = h.noteline.events(BOB, Pagination::default()).unwrap();
    assert_eq!(events.len(), 1);
    let event = &events[0].event;
    assert_eq!(event.direction, Direction::Outbound);
    assert_eq!(event.fee, Some(1000));
    assert!(event.content.len() <= 800);
    assert!(event.content.ends_with(TRUNCATION_MARKER));

    let submissions = h.ledger.submissions();
    assert_eq!(submissions.len(), 1);
    let outcomes = bob.process_inbound(&[submissions[0].to_inbound()]);
    assert_eq!(
        outcomes,
        vec![InboundOutcome::Delivered {
            participant: OWNER.to_string(),
            content: event.content.clone(),
        }]
    );
}

#[tokio::test]
async fn test_oversized_direct_message_skips_group() {
    let config = NotelineConfig {
        max_group_size: 2,
        ..Default::default()
    };
    let h = harness(config);
    peer(BOB, [9u8; 32], &h.ledger);

    let outcome = h.noteline.send(BOB, &"q".repeat(3000)).await;
    assert_eq!(outcome, SendOutcome::Truncated { fee: 1000 });
    assert!(h.ledger.groups().is_empty());
}

#[tokio::test]
async fn test_fallback_failure_is_dead_lettered() {
    let h = harness(NotelineConfig::default());
    peer(BOB, [9u8; 32], &h.ledger);
    h.ledger.fail_groups(LedgerError::Unsupported("groups".to_string()));
    h.ledger.fail_submissions_after(0, LedgerError::RateLimited);

    let outcome = h.noteline.send(BOB, &"r".repeat(1500)).await;
    let SendOutcome::DeadLettered { reason } = outcome else {
        panic!("expected dead letter, got {outcome:?}");
    };
    assert!(reason.contains("Fallback transmission failed"), "{reason}");
    assert!(h.noteline.recent_events(10).unwrap().is_empty());
    assert_eq!(h.noteline.spending().spent, 0);
}

#[tokio::test]
async fn test_spending_ceiling_dead_letters_second_send() {
    let config = NotelineConfig {
        spending_ceiling: 1000,
        fee_per_transaction: 700,
        ..Default::default()
    };
    let h = harness_with_ledger(config, MockLedger::new().with_fee(Some(700)));
    peer(BOB, [9u8; 32], &h.ledger);

    let first = h.noteline.send(BOB, "first").await;
    assert_eq!(
        first,
        SendOutcome::Delivered {
            transactions: 1,
            fee: 700
        }
    );

    let second = h.noteline.send(BOB, "second").await;
    let SendOutcome::DeadLettered { reason } = second else {
        panic!("expected dead letter, got {second:?}");
    };
    assert!(reason.contains("Spending limit exceeded"), "{reason}");

    assert_eq!(h.ledger.submissions().len(), 1);
    assert_eq!(h.noteline.spending().spent, 700);
    assert_eq!(h.storage.total_spent_since(0).unwrap(), 700);
    assert_eq!(h.noteline.dead_letters().len(), 1);
    assert_eq!(h.noteline.recent_events(10).unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sends_never_overshoot_ceiling() {
    let config = NotelineConfig {
        spending_ceiling: 5000,
        ..Default::default()
    };
    let h = harness(config);
    peer(BOB, [9u8; 32], &h.ledger);

    let tasks: Vec<_> = (0..12)
        .map(|i| {
            let noteline = Arc::clone(&h.noteline);
            tokio::spawn(async move { noteline.send(BOB, &format!("message {i}")).await })
        })
        .collect();

    let mut delivered = 0;
    for task in tasks {
        if task.await.unwrap().is_delivered() {
            delivered += 1;
        }
    }

    assert_eq!(delivered, 5);
    assert_eq!(h.ledger.submissions().len(), 5);
    assert_eq!(h.noteline.spending().spent, 5000);
    assert_eq!(h.noteline.dead_letters().len(), 7);
}

#[derive(Debug)]
struct PanickingListener;

impl EventListener for PanickingListener {
    fn on_event(&self, _event: &MessageEvent) {
        panic!("listener failure");
    }
}

#[tokio::test]
async fn test_panicking_listener_does_not_block_delivery() {
    let h = harness(NotelineConfig::default());
    peer(BOB, [9u8; 32], &h.ledger);
    let recording = Arc::new(RecordingEvents::default());
    h.noteline.on_event(Arc::new(PanickingListener));
    h.noteline.on_event(recording.clone());

    let outcome = h.noteline.send(BOB, "still delivered").await;
    assert!(outcome.is_delivered());

    let events = recording.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].content, "still delivered");
    assert_eq!(events[0].fee, Some(1000));
}

#[tokio::test]
async fn test_unknown_participant_without_key_is_dead_lettered() {
    let h = harness(NotelineConfig::default());

    let outcome = h.noteline.send("NOBODY", "hello").await;
    assert!(!outcome.is_delivered());
    assert_eq!(h.ledger.discovery_calls("NOBODY"), 1);

    // Failed lookups are not cached
    h.noteline.send("NOBODY", "hello again").await;
    assert_eq!(h.ledger.discovery_calls("NOBODY"), 2);
}
