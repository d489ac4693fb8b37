//! Event storage test functions

use noteline_storage_traits::events::types::Direction;
use noteline_storage_traits::events::{EventStorage, Pagination};

use super::create_test_event;

/// Appended events come back newest first with increasing sequence numbers
pub fn test_append_and_list_events<S>(storage: S)
where
    S: EventStorage,
{
    let first = storage
        .append_event(create_test_event("ADDR-1", "one", Direction::Outbound, 10))
        .unwrap();
    let second = storage
        .append_event(create_test_event("ADDR-1", "two", Direction::Inbound, 20))
        .unwrap();
    let _other = storage
        .append_event(create_test_event("ADDR-2", "elsewhere", Direction::Status, 15))
        .unwrap();
    assert!(second > first);

    let events = storage
        .events_for_participant("ADDR-1", Pagination::default())
        .unwrap();
    let contents: Vec<&str> = events.iter().map(|e| e.event.content.as_str()).collect();
    assert_eq!(contents, vec!["two", "one"]);
    assert_eq!(events[0].event.direction, Direction::Inbound);
    assert_eq!(events[0].event.fee, None);
    assert_eq!(events[1].event.fee, Some(1000));

    let recent = storage.recent_events(2).unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].event.content, "elsewhere");
}

/// Pagination applies limit and offset
pub fn test_event_pagination<S>(storage: S)
where
    S: EventStorage,
{
    for i in 0..5u64 {
        storage
            .append_event(create_test_event(
                "ADDR-1",
                &format!("m{i}"),
                Direction::Outbound,
                i,
            ))
            .unwrap();
    }

    let page = storage
        .events_for_participant("ADDR-1", Pagination::new(Some(2), Some(1)))
        .unwrap();
    let contents: Vec<&str> = page.iter().map(|e| e.event.content.as_str()).collect();
    assert_eq!(contents, vec!["m3", "m2"]);

    let empty = storage
        .events_for_participant("ADDR-404", Pagination::default())
        .unwrap();
    assert!(empty.is_empty());
}
