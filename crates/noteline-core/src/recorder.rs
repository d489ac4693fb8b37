//! Event recorder
//!
//! Every sent, received and status event is appended to the log and then
//! fanned out to listeners. Listeners are notified even when persistence
//! fails, so live consumers do not miss messages because of a storage fault.

use std::fmt;
use std::sync::Arc;

use noteline_storage_traits::NotelineStorageProvider;
use noteline_storage_traits::events::error::EventError;
use noteline_storage_traits::events::types::MessageEvent;

use crate::callback::{EventListener, ListenerSet};

/// Persists message events and notifies listeners
pub struct EventRecorder {
    storage: Arc<dyn NotelineStorageProvider>,
    listeners: ListenerSet<dyn EventListener>,
}

impl fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRecorder")
            .field("backend", &self.storage.backend())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl EventRecorder {
    /// Create a recorder with no listeners
    pub fn new(storage: Arc<dyn NotelineStorageProvider>) -> Self {
        Self {
            storage,
            listeners: ListenerSet::default(),
        }
    }

    /// Listener registry
    pub fn listeners(&self) -> &ListenerSet<dyn EventListener> {
        &self.listeners
    }

    /// Append `event` and notify listeners, returning the sequence number
    pub fn record(&self, event: MessageEvent) -> Result<u64, EventError> {
        let result = self.storage.append_event(event.clone());
        match &result {
            Ok(seq) => tracing::debug!(
                seq,
                participant = %event.participant,
                direction = %event.direction,
                "Recorded message event"
            ),
            Err(e) => tracing::error!(
                error = %e,
                participant = %event.participant,
                direction = %event.direction,
                "Failed to persist message event"
            ),
        }

        self.listeners.notify(|listener| listener.on_event(&event));
        result
    }
}
