//! Events module
//!
//! The message event log is an append-only audit trail of everything sent,
//! received or reported about a participant. Records are never mutated.

pub mod error;
pub mod types;

use self::error::EventError;
use self::types::*;

/// Default number of events returned when [`Pagination::limit`] is unset
pub const DEFAULT_EVENT_LIMIT: usize = 100;

/// Pagination parameters for querying events
#[derive(Debug, Clone, Copy, Default)]
pub struct Pagination {
    /// Maximum number of events to return
    pub limit: Option<usize>,
    /// Number of events to skip
    pub offset: Option<usize>,
}

impl Pagination {
    /// Create a new Pagination with specified limit and offset
    pub fn new(limit: Option<usize>, offset: Option<usize>) -> Self {
        Self { limit, offset }
    }

    /// Get the limit value, using default if not specified
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_EVENT_LIMIT)
    }

    /// Get the offset value, using 0 if not specified
    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}

/// Storage traits for the events module
pub trait EventStorage {
    /// Append an event to the log, returning its sequence number.
    ///
    /// Sequence numbers are strictly increasing per backend.
    fn append_event(&self, event: MessageEvent) -> Result<u64, EventError>;

    /// Events for one participant, newest first
    fn events_for_participant(
        &self,
        participant: &str,
        pagination: Pagination,
    ) -> Result<Vec<StoredEvent>, EventError>;

    /// Most recent events across all participants, newest first
    fn recent_events(&self, limit: usize) -> Result<Vec<StoredEvent>, EventError>;
}
