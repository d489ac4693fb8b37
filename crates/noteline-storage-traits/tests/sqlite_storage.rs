//! SQLite storage implementation tests using shared test functions

use noteline_sqlite_storage::NotelineSqliteStorage;

mod shared;

/// Macro to generate tests that run against SQLite storage using shared test functions
macro_rules! test_sqlite_storage {
    ($test_name:ident, $test_fn:path) => {
        #[test]
        fn $test_name() {
            let storage = NotelineSqliteStorage::new_in_memory().unwrap();
            $test_fn(storage);
        }
    };
}

test_sqlite_storage!(
    test_save_and_find_contact_sqlite,
    shared::contact_tests::test_save_and_find_contact
);

test_sqlite_storage!(
    test_unmatched_contacts_sqlite,
    shared::contact_tests::test_unmatched_contacts
);

test_sqlite_storage!(
    test_promote_contact_is_idempotent_sqlite,
    shared::contact_tests::test_promote_contact_is_idempotent
);

test_sqlite_storage!(
    test_address_uniqueness_sqlite,
    shared::contact_tests::test_address_uniqueness
);

test_sqlite_storage!(
    test_unknown_contact_errors_sqlite,
    shared::contact_tests::test_unknown_contact_errors
);

test_sqlite_storage!(
    test_deactivate_contact_sqlite,
    shared::contact_tests::test_deactivate_contact
);

test_sqlite_storage!(
    test_next_outbound_counter_sqlite,
    shared::contact_tests::test_next_outbound_counter
);

test_sqlite_storage!(
    test_save_and_find_conversation_sqlite,
    shared::conversation_tests::test_save_and_find_conversation
);

test_sqlite_storage!(
    test_append_and_list_events_sqlite,
    shared::event_tests::test_append_and_list_events
);

test_sqlite_storage!(
    test_event_pagination_sqlite,
    shared::event_tests::test_event_pagination
);

test_sqlite_storage!(
    test_total_spent_since_sqlite,
    shared::spending_tests::test_total_spent_since
);

test_sqlite_storage!(
    test_resave_keeps_address_and_counters_sqlite,
    shared::contact_tests::test_resave_keeps_address_and_counters
);

test_sqlite_storage!(
    test_record_inbound_counter_sqlite,
    shared::contact_tests::test_record_inbound_counter
);

test_sqlite_storage!(
    test_cursor_only_moves_forward_sqlite,
    shared::cursor_tests::test_cursor_only_moves_forward
);
