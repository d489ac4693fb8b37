//! Implementation of EventStorage trait for SQLite storage.

use noteline_storage_traits::events::error::EventError;
use noteline_storage_traits::events::types::{MessageEvent, StoredEvent};
use noteline_storage_traits::events::{EventStorage, Pagination};
use rusqlite::params;

use crate::{NotelineSqliteStorage, db};

#[inline]
fn into_event_err<T>(e: T) -> EventError
where
    T: std::error::Error,
{
    EventError::DatabaseError(e.to_string())
}

impl EventStorage for NotelineSqliteStorage {
    fn append_event(&self, event: MessageEvent) -> Result<u64, EventError> {
        if event.participant.is_empty() {
            return Err(EventError::InvalidParameters(
                "Event participant must not be empty".to_string(),
            ));
        }

        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO message_events (participant, content, direction, fee, timestamp)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    event.participant,
                    event.content,
                    event.direction.as_str(),
                    event.fee,
                    event.timestamp,
                ],
            )
            .map_err(into_event_err)?;

            u64::try_from(conn.last_insert_rowid()).map_err(into_event_err)
        })
    }

    fn events_for_participant(
        &self,
        participant: &str,
        pagination: Pagination,
    ) -> Result<Vec<StoredEvent>, EventError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM message_events WHERE participant = ?
                     ORDER BY seq DESC LIMIT ? OFFSET ?",
                )
                .map_err(into_event_err)?;

            let events_iter = stmt
                .query_map(
                    params![participant, pagination.limit(), pagination.offset()],
                    db::row_to_stored_event,
                )
                .map_err(into_event_err)?;

            events_iter
                .collect::<Result<Vec<_>, _>>()
                .map_err(into_event_err)
        })
    }

    fn recent_events(&self, limit: usize) -> Result<Vec<StoredEvent>, EventError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM message_events ORDER BY seq DESC LIMIT ?")
                .map_err(into_event_err)?;

            let events_iter = stmt
                .query_map([limit], db::row_to_stored_event)
                .map_err(into_event_err)?;

            events_iter
                .collect::<Result<Vec<_>, _>>()
                .map_err(into_event_err)
        })
    }
}
