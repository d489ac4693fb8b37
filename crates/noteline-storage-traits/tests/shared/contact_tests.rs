//! Contact storage test functions

use noteline_storage_traits::contacts::ContactStorage;
use noteline_storage_traits::contacts::error::ContactError;
use noteline_storage_traits::contacts::types::Promotion;

use super::create_test_contact;

/// Save and find a contact by id
pub fn test_save_and_find_contact<S>(storage: S)
where
    S: ContactStorage,
{
    let contact = create_test_contact("alice");
    storage.save_contact(contact.clone()).unwrap();

    let found = storage.find_contact("alice").unwrap().unwrap();
    assert_eq!(found.id, contact.id);
    assert_eq!(found.nickname, contact.nickname);
    assert_eq!(found.initial_secret, contact.initial_secret);
    assert_eq!(found.network, "testnet");
    assert!(found.active);
    assert!(found.mobile_address.is_none());

    assert!(storage.find_contact("nobody").unwrap().is_none());
}

/// Unmatched contacts exclude matched, inactive and other-network contacts
pub fn test_unmatched_contacts<S>(storage: S)
where
    S: ContactStorage,
{
    storage.save_contact(create_test_contact("a")).unwrap();
    storage.save_contact(create_test_contact("b")).unwrap();

    let mut inactive = create_test_contact("c");
    inactive.active = false;
    storage.save_contact(inactive).unwrap();

    let mut mainnet = create_test_contact("d");
    mainnet.network = "mainnet".to_string();
    storage.save_contact(mainnet).unwrap();

    storage.promote_contact("b", "ADDR-B").unwrap();

    let unmatched = storage.unmatched_contacts("testnet").unwrap();
    let ids: Vec<&str> = unmatched.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["a"]);

    let all = storage.all_contacts().unwrap();
    assert_eq!(all.len(), 4);
}

/// Promotion happens once and repeating it with the same address is a no-op
pub fn test_promote_contact_is_idempotent<S>(storage: S)
where
    S: ContactStorage,
{
    storage.save_contact(create_test_contact("alice")).unwrap();

    assert_eq!(
        storage.promote_contact("alice", "ADDR-A").unwrap(),
        Promotion::Promoted
    );
    assert_eq!(
        storage.promote_contact("alice", "ADDR-A").unwrap(),
        Promotion::AlreadyMatched
    );

    let found = storage.find_contact_by_address("ADDR-A").unwrap().unwrap();
    assert_eq!(found.id, "alice");

    // The address is immutable once set
    let err = storage.promote_contact("alice", "ADDR-OTHER").unwrap_err();
    assert!(matches!(err, ContactError::AlreadyMatched { .. }));
    let found = storage.find_contact("alice").unwrap().unwrap();
    assert_eq!(found.mobile_address.as_deref(), Some("ADDR-A"));
}

/// Two contacts can never claim the same address
pub fn test_address_uniqueness<S>(storage: S)
where
    S: ContactStorage,
{
    storage.save_contact(create_test_contact("alice")).unwrap();
    storage.save_contact(create_test_contact("bob")).unwrap();
    storage.promote_contact("alice", "SHARED").unwrap();

    let err = storage.promote_contact("bob", "SHARED").unwrap_err();
    assert_eq!(
        err,
        ContactError::AddressConflict {
            address: "SHARED".to_string(),
            owner_id: "alice".to_string(),
        }
    );

    let mut bob = storage.find_contact("bob").unwrap().unwrap();
    bob.mobile_address = Some("SHARED".to_string());
    let err = storage.save_contact(bob).unwrap_err();
    assert!(matches!(err, ContactError::AddressConflict { .. }));

    let bob = storage.find_contact("bob").unwrap().unwrap();
    assert!(bob.mobile_address.is_none());
}

/// Promoting or deactivating an unknown contact fails
pub fn test_unknown_contact_errors<S>(storage: S)
where
    S: ContactStorage,
{
    assert!(matches!(
        storage.promote_contact("ghost", "ADDR"),
        Err(ContactError::NotFound(_))
    ));
    assert!(matches!(
        storage.deactivate_contact("ghost"),
        Err(ContactError::NotFound(_))
    ));
    assert!(matches!(
        storage.next_outbound_counter("ghost"),
        Err(ContactError::NotFound(_))
    ));
}

/// Deactivation keeps the contact but hides it from discovery
pub fn test_deactivate_contact<S>(storage: S)
where
    S: ContactStorage,
{
    storage.save_contact(create_test_contact("alice")).unwrap();
    storage.deactivate_contact("alice").unwrap();

    let found = storage.find_contact("alice").unwrap().unwrap();
    assert!(!found.active);
    assert!(storage.unmatched_contacts("testnet").unwrap().is_empty());
}

/// Outbound counters are handed out once each, in order
pub fn test_next_outbound_counter<S>(storage: S)
where
    S: ContactStorage,
{
    storage.save_contact(create_test_contact("alice")).unwrap();

    assert_eq!(storage.next_outbound_counter("alice").unwrap(), 0);
    assert_eq!(storage.next_outbound_counter("alice").unwrap(), 1);
    assert_eq!(storage.next_outbound_counter("alice").unwrap(), 2);

    let found = storage.find_contact("alice").unwrap().unwrap();
    assert_eq!(found.outbound_counter, 3);
}

/// Re-saving a contact never clears its address or rewinds its counters
pub fn test_resave_keeps_address_and_counters<S>(storage: S)
where
    S: ContactStorage,
{
    storage.save_contact(create_test_contact("alice")).unwrap();
    storage.promote_contact("alice", "ADDR-A").unwrap();
    for _ in 0..3 {
        storage.next_outbound_counter("alice").unwrap();
    }
    storage.record_inbound_counter("alice", 9).unwrap();

    let mut fresh = create_test_contact("alice");
    fresh.nickname = "renamed".to_string();
    storage.save_contact(fresh).unwrap();

    let found = storage.find_contact("alice").unwrap().unwrap();
    assert_eq!(found.nickname, "renamed");
    assert_eq!(found.mobile_address.as_deref(), Some("ADDR-A"));
    assert_eq!(found.outbound_counter, 3);
    assert_eq!(found.inbound_counter, Some(9));
    assert_eq!(storage.next_outbound_counter("alice").unwrap(), 3);

    // A different address on re-save is ignored, not re-indexed
    let mut moved = found.clone();
    moved.mobile_address = Some("ADDR-B".to_string());
    storage.save_contact(moved).unwrap();
    assert!(storage.find_contact_by_address("ADDR-B").unwrap().is_none());
    assert_eq!(
        storage.find_contact_by_address("ADDR-A").unwrap().unwrap().id,
        "alice"
    );
}

/// The inbound counter only moves forward
pub fn test_record_inbound_counter<S>(storage: S)
where
    S: ContactStorage,
{
    storage.save_contact(create_test_contact("alice")).unwrap();

    storage.record_inbound_counter("alice", 5).unwrap();
    storage.record_inbound_counter("alice", 2).unwrap();
    assert_eq!(
        storage.find_contact("alice").unwrap().unwrap().inbound_counter,
        Some(5)
    );

    storage.record_inbound_counter("alice", 6).unwrap();
    assert_eq!(
        storage.find_contact("alice").unwrap().unwrap().inbound_counter,
        Some(6)
    );

    assert!(matches!(
        storage.record_inbound_counter("ghost", 1),
        Err(ContactError::NotFound(_))
    ));
}
