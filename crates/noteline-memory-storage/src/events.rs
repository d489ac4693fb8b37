//! Memory-based storage implementation of the EventStorage trait

use std::collections::VecDeque;

use noteline_storage_traits::events::error::EventError;
use noteline_storage_traits::events::types::{MessageEvent, StoredEvent};
use noteline_storage_traits::events::{EventStorage, Pagination};

use crate::NotelineMemoryStorage;

impl EventStorage for NotelineMemoryStorage {
    fn append_event(&self, event: MessageEvent) -> Result<u64, EventError> {
        if event.participant.is_empty() {
            return Err(EventError::InvalidParameters(
                "Event participant must not be empty".to_string(),
            ));
        }

        let mut inner = self.inner.write();
        let seq = inner.next_event_seq;
        inner.next_event_seq += 1;

        let stored = StoredEvent { seq, event };

        // Per-participant history, oldest evicted first
        let max_per_participant = self.limits.max_events_per_participant;
        let participant = stored.event.participant.clone();
        match inner.events_by_participant.get_mut(&participant) {
            Some(history) => {
                if history.len() >= max_per_participant {
                    history.pop_front();
                }
                history.push_back(stored.clone());
            }
            None => {
                let mut history = VecDeque::new();
                history.push_back(stored.clone());
                inner.events_by_participant.put(participant, history);
            }
        }

        if inner.recent_events.len() >= self.limits.max_recent_events {
            inner.recent_events.pop_front();
        }
        inner.recent_events.push_back(stored);

        Ok(seq)
    }

    fn events_for_participant(
        &self,
        participant: &str,
        pagination: Pagination,
    ) -> Result<Vec<StoredEvent>, EventError> {
        // `peek` so reads do not need the write lock
        let inner = self.inner.read();
        let events = match inner.events_by_participant.peek(participant) {
            Some(history) => history
                .iter()
                .rev()
                .skip(pagination.offset())
                .take(pagination.limit())
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Ok(events)
    }

    fn recent_events(&self, limit: usize) -> Result<Vec<StoredEvent>, EventError> {
        let inner = self.inner.read();
        Ok(inner.recent_events.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use noteline_storage_traits::test_utils::create_test_event;

    use super::*;
    use crate::MemoryLimits;

    #[test]
    fn test_per_participant_limit_evicts_oldest() {
        let storage = NotelineMemoryStorage::with_limits(
            MemoryLimits::default().with_max_events_per_participant(2),
        );
        for i in 0..3u64 {
            storage
                .append_event(create_test_event("ADDR", &format!("m{i}"), i))
                .unwrap();
        }

        let events = storage
            .events_for_participant("ADDR", Pagination::default())
            .unwrap();
        let contents: Vec<&str> = events.iter().map(|e| e.event.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m1"]);
    }

    #[test]
    fn test_recent_limit_evicts_oldest() {
        let storage =
            NotelineMemoryStorage::with_limits(MemoryLimits::default().with_max_recent_events(2));
        for i in 0..3u64 {
            storage
                .append_event(create_test_event(&format!("ADDR-{i}"), "x", i))
                .unwrap();
        }

        let recent = storage.recent_events(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].event.participant, "ADDR-2");
        assert_eq!(recent[1].event.participant, "ADDR-1");
    }

    #[test]
    fn test_empty_participant_rejected() {
        let storage = NotelineMemoryStorage::default();
        assert!(matches!(
            storage.append_event(create_test_event("", "x", 1)),
            Err(EventError::InvalidParameters(_))
        ));
    }
}
