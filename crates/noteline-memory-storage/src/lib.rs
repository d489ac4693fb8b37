//! Memory-based storage implementation for noteline.
//!
//! Implements [`NotelineStorageProvider`] entirely in memory. Nothing survives
//! a restart, which makes it the backend of choice for tests and for
//! short-lived tools.
//!
//! ## Memory Exhaustion Protection
//!
//! The event log is bounded. The following limits are enforced (with
//! configurable defaults via [`MemoryLimits`]):
//!
//! - [`DEFAULT_CACHE_SIZE`]: Number of participants whose event history is kept
//! - [`DEFAULT_MAX_EVENTS_PER_PARTICIPANT`]: Events kept per participant
//! - [`DEFAULT_MAX_RECENT_EVENTS`]: Events kept in the global recent list
//!
//! ```rust
//! use noteline_memory_storage::{MemoryLimits, NotelineMemoryStorage};
//!
//! let limits = MemoryLimits::default()
//!     .with_cache_size(64)
//!     .with_max_events_per_participant(500);
//!
//! let storage = NotelineMemoryStorage::with_limits(limits);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::num::NonZeroUsize;

use lru::LruCache;
use noteline_storage_traits::contacts::types::Contact;
use noteline_storage_traits::conversations::types::Conversation;
use noteline_storage_traits::events::types::StoredEvent;
use noteline_storage_traits::spending::types::SpendRecord;
use noteline_storage_traits::{Backend, NotelineStorageProvider};
use parking_lot::RwLock;

mod contacts;
mod conversations;
mod cursors;
mod events;
mod spending;

/// Default number of participants with cached event history
pub const DEFAULT_CACHE_SIZE: usize = 1000;

/// Default maximum number of events kept per participant.
/// When the limit is reached the oldest events for that participant are dropped.
pub const DEFAULT_MAX_EVENTS_PER_PARTICIPANT: usize = 10_000;

/// Default maximum number of events kept in the global recent list
pub const DEFAULT_MAX_RECENT_EVENTS: usize = 10_000;

/// Configurable limits for memory storage.
#[derive(Debug, Clone, Copy)]
pub struct MemoryLimits {
    /// Maximum number of participants in the event LRU cache
    pub cache_size: usize,
    /// Maximum number of events stored per participant
    pub max_events_per_participant: usize,
    /// Maximum number of events in the global recent list
    pub max_recent_events: usize,
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            max_events_per_participant: DEFAULT_MAX_EVENTS_PER_PARTICIPANT,
            max_recent_events: DEFAULT_MAX_RECENT_EVENTS,
        }
    }
}

impl MemoryLimits {
    /// Creates a new `MemoryLimits` with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of participants in the event cache.
    ///
    /// # Panics
    ///
    /// Panics if `size` is 0.
    pub fn with_cache_size(mut self, size: usize) -> Self {
        assert!(size > 0, "cache_size must be greater than 0");
        self.cache_size = size;
        self
    }

    /// Sets the maximum number of events stored per participant.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is 0.
    pub fn with_max_events_per_participant(mut self, limit: usize) -> Self {
        assert!(limit > 0, "max_events_per_participant must be greater than 0");
        self.max_events_per_participant = limit;
        self
    }

    /// Sets the maximum number of events in the global recent list.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is 0.
    pub fn with_max_recent_events(mut self, limit: usize) -> Self {
        assert!(limit > 0, "max_recent_events must be greater than 0");
        self.max_recent_events = limit;
        self
    }
}

/// All in-memory state, guarded by a single lock
struct Inner {
    contacts: HashMap<String, Contact>,
    /// Discovered address -> contact id
    address_index: HashMap<String, String>,
    conversations: Vec<Conversation>,
    events_by_participant: LruCache<String, VecDeque<StoredEvent>>,
    recent_events: VecDeque<StoredEvent>,
    next_event_seq: u64,
    spend_records: Vec<SpendRecord>,
    cursors: HashMap<String, u64>,
}

impl Inner {
    fn new(limits: &MemoryLimits) -> Self {
        let cache_size = NonZeroUsize::new(limits.cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            contacts: HashMap::new(),
            address_index: HashMap::new(),
            conversations: Vec::new(),
            events_by_participant: LruCache::new(cache_size),
            recent_events: VecDeque::new(),
            next_event_seq: 1,
            spend_records: Vec::new(),
            cursors: HashMap::new(),
        }
    }
}

/// A memory-based storage implementation for noteline.
pub struct NotelineMemoryStorage {
    inner: RwLock<Inner>,
    limits: MemoryLimits,
}

impl fmt::Debug for NotelineMemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("NotelineMemoryStorage")
            .field("contacts", &inner.contacts.len())
            .field("conversations", &inner.conversations.len())
            .field("recent_events", &inner.recent_events.len())
            .field("limits", &self.limits)
            .finish()
    }
}

impl Default for NotelineMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl NotelineMemoryStorage {
    /// Creates a new [`NotelineMemoryStorage`] with default limits.
    pub fn new() -> Self {
        Self::with_limits(MemoryLimits::default())
    }

    /// Creates a new [`NotelineMemoryStorage`] with custom limits.
    pub fn with_limits(limits: MemoryLimits) -> Self {
        Self {
            inner: RwLock::new(Inner::new(&limits)),
            limits,
        }
    }

    /// Returns the limits in effect
    pub fn limits(&self) -> &MemoryLimits {
        &self.limits
    }
}

impl NotelineStorageProvider for NotelineMemoryStorage {
    fn backend(&self) -> Backend {
        Backend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type() {
        let storage = NotelineMemoryStorage::default();
        assert_eq!(storage.backend(), Backend::Memory);
        assert!(!storage.backend().is_persistent());
    }

    #[test]
    fn test_custom_limits() {
        let limits = MemoryLimits::new()
            .with_cache_size(2)
            .with_max_events_per_participant(3)
            .with_max_recent_events(4);
        let storage = NotelineMemoryStorage::with_limits(limits);
        assert_eq!(storage.limits().cache_size, 2);
        assert_eq!(storage.limits().max_events_per_participant, 3);
        assert_eq!(storage.limits().max_recent_events, 4);
    }

    #[test]
    #[should_panic(expected = "cache_size must be greater than 0")]
    fn test_zero_cache_size_panics() {
        let _ = MemoryLimits::new().with_cache_size(0);
    }
}
