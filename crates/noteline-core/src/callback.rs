//! Listener registration
//!
//! Listeners are invoked synchronously, in registration order, on the task
//! that produced the notification. A panicking listener is logged and does
//! not prevent the remaining listeners from running.

use std::fmt::Debug;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use noteline_storage_traits::events::types::MessageEvent;
use parking_lot::RwLock;

/// Receives every message event after it has been written to the log
pub trait EventListener: Send + Sync + Debug {
    /// Called once per recorded event
    fn on_event(&self, event: &MessageEvent);
}

/// A contact's first message, as decrypted by discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstMessage {
    /// Contact that was promoted
    pub contact_id: String,
    /// Newly learned ledger address
    pub sender: String,
    /// Decrypted content
    pub plaintext: String,
    /// Block height of the carrying transaction
    pub height: u64,
    /// Value transferred with the message, if any
    pub value: Option<u64>,
}

/// Receives first messages from newly promoted contacts
pub trait FirstMessageListener: Send + Sync + Debug {
    /// Called once per promotion
    fn on_first_message(&self, message: &FirstMessage);
}

/// Handle returned when registering a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug)]
struct Registry<L: ?Sized> {
    next_id: u64,
    entries: Vec<(ListenerId, Arc<L>)>,
}

/// Ordered set of listeners
#[derive(Debug)]
pub struct ListenerSet<L: ?Sized> {
    registry: RwLock<Registry<L>>,
}

impl<L: ?Sized> Default for ListenerSet<L> {
    fn default() -> Self {
        Self {
            registry: RwLock::new(Registry {
                next_id: 0,
                entries: Vec::new(),
            }),
        }
    }
}

impl<L: ?Sized> ListenerSet<L> {
    /// Register a listener
    pub fn add(&self, listener: Arc<L>) -> ListenerId {
        let mut registry = self.registry.write();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.entries.push((id, listener));
        id
    }

    /// Unregister a listener, returning whether it was present
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.write();
        let before = registry.entries.len();
        registry.entries.retain(|(entry_id, _)| *entry_id != id);
        registry.entries.len() != before
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.registry.read().entries.len()
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.registry.read().entries.is_empty()
    }

    /// Invoke `f` on each listener.
    ///
    /// Runs over a snapshot, so listeners may register or unregister from
    /// inside the callback.
    pub fn notify<F>(&self, f: F)
    where
        F: Fn(&L),
    {
        let snapshot: Vec<Arc<L>> = self
            .registry
            .read()
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| f(listener.as_ref()))).is_err() {
                tracing::error!("Listener panicked; continuing with remaining listeners");
            }
        }
    }
}
