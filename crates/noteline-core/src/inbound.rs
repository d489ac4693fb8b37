//! Inbound routing
//!
//! Opens envelopes from matched contacts and direct envelopes addressed to a
//! local identity, enforces the per-contact replay window and records the
//! resulting inbound events. Unmatched contacts are the discovery poller's
//! business and are ignored here.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use noteline_storage_traits::NotelineStorageProvider;
use noteline_storage_traits::contacts::types::Contact;
use noteline_storage_traits::events::types::{Direction, MessageEvent};
use parking_lot::Mutex;

use crate::constant::INBOUND_CURSOR;
use crate::envelope::{self, Envelope, EnvelopeKind};
use crate::error::Error;
use crate::identity::IdentityRegistry;
use crate::ledger::{self, InboundTransaction, LedgerClient};
use crate::ratchet::CounterWindow;
use crate::recorder::EventRecorder;

/// Per-contact replay windows shared by discovery and inbound routing.
///
/// The highest accepted counter of each contact is persisted, so a restart
/// rebuilds each window from storage instead of starting empty.
pub struct ReplayGuard {
    storage: Arc<dyn NotelineStorageProvider>,
    windows: Mutex<HashMap<String, CounterWindow>>,
}

impl fmt::Debug for ReplayGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayGuard")
            .field("contacts", &self.windows.lock().len())
            .finish_non_exhaustive()
    }
}

impl ReplayGuard {
    /// Create a guard persisting into `storage`
    pub fn new(storage: Arc<dyn NotelineStorageProvider>) -> Self {
        Self {
            storage,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Accept `counter` from `contact` unless it was seen or is too old
    pub fn accept(&self, contact: &Contact, counter: u64) -> Result<bool, Error> {
        let mut windows = self.windows.lock();
        let window = windows.entry(contact.id.clone()).or_insert_with(|| {
            contact
                .inbound_counter
                .map_or_else(CounterWindow::new, CounterWindow::resume)
        });
        if !window.accept(counter) {
            return Ok(false);
        }
        self.storage.record_inbound_counter(&contact.id, counter)?;
        Ok(true)
    }
}

/// Result of routing one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Decrypted and recorded
    Delivered {
        /// Sender address
        participant: String,
        /// Plaintext
        content: String,
    },
    /// Authentic but already delivered, or older than the replay window
    Replayed {
        /// Sender address
        participant: String,
        /// Ratchet counter of the rejected envelope
        counter: u64,
    },
    /// Not an envelope for us
    Ignored,
}

enum Opened {
    Psk {
        sender: String,
        plaintext: Vec<u8>,
    },
    Direct {
        sender: String,
        group: Option<(String, String)>,
        counter: u64,
        plaintext: Vec<u8>,
    },
    Replayed {
        sender: String,
        counter: u64,
    },
    Ignored,
}

/// Inbound message router for matched contacts and local identities
pub struct InboundRouter {
    ledger: Arc<dyn LedgerClient>,
    storage: Arc<dyn NotelineStorageProvider>,
    identities: Arc<IdentityRegistry>,
    recorder: Arc<EventRecorder>,
    replay: Arc<ReplayGuard>,
    lookback_blocks: u64,
    query_timeout: Duration,
    cursor: tokio::sync::Mutex<Option<u64>>,
}

impl fmt::Debug for InboundRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundRouter")
            .field("identities", &self.identities)
            .field("lookback_blocks", &self.lookback_blocks)
            .finish_non_exhaustive()
    }
}

impl InboundRouter {
    pub(crate) fn new(
        ledger: Arc<dyn LedgerClient>,
        storage: Arc<dyn NotelineStorageProvider>,
        identities: Arc<IdentityRegistry>,
        recorder: Arc<EventRecorder>,
        replay: Arc<ReplayGuard>,
        lookback_blocks: u64,
        query_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            storage,
            identities,
            recorder,
            replay,
            lookback_blocks,
            query_timeout,
            cursor: tokio::sync::Mutex::new(None),
        }
    }

    /// Route a single transaction.
    ///
    /// A direct envelope is delivered on its own; use
    /// [`InboundRouter::process_batch`] to join grouped parts.
    pub fn process(&self, transaction: &InboundTransaction) -> InboundOutcome {
        self.process_batch(std::slice::from_ref(transaction))
            .pop()
            .unwrap_or(InboundOutcome::Ignored)
    }

    /// Route a batch of transactions.
    ///
    /// Direct parts of one ledger group from the same sender to the same
    /// identity are joined in counter order into one message, provided their
    /// counters run 0..n without gaps or repeats. Anything else is delivered
    /// part by part.
    pub fn process_batch(&self, transactions: &[InboundTransaction]) -> Vec<InboundOutcome> {
        let mut outcomes = Vec::new();
        let mut groups: BTreeMap<(String, String, String), Vec<(u64, Vec<u8>)>> = BTreeMap::new();

        for transaction in transactions {
            match self.open(transaction) {
                Ok(Opened::Psk { sender, plaintext }) => {
                    outcomes.push(self.deliver(sender, &plaintext));
                }
                Ok(Opened::Direct {
                    sender,
                    group: Some((receiver, group_id)),
                    counter,
                    plaintext,
                }) => groups
                    .entry((sender, receiver, group_id))
                    .or_default()
                    .push((counter, plaintext)),
                Ok(Opened::Direct {
                    sender,
                    group: None,
                    plaintext,
                    ..
                }) => outcomes.push(self.deliver(sender, &plaintext)),
                Ok(Opened::Replayed { sender, counter }) => {
                    tracing::warn!(participant = %sender, counter, "Rejected replayed envelope");
                    outcomes.push(InboundOutcome::Replayed {
                        participant: sender,
                        counter,
                    });
                }
                Ok(Opened::Ignored) => outcomes.push(InboundOutcome::Ignored),
                Err(e) => {
                    tracing::warn!(tx_id = %transaction.tx_id, error = %e, "Failed to route inbound transaction");
                    outcomes.push(InboundOutcome::Ignored);
                }
            }
        }

        for ((sender, _, group_id), mut parts) in groups {
            parts.sort_by_key(|(counter, _)| *counter);
            let contiguous = parts
                .iter()
                .enumerate()
                .all(|(index, (counter, _))| *counter == index as u64);
            if contiguous {
                let plaintext: Vec<u8> = parts.into_iter().flat_map(|(_, part)| part).collect();
                outcomes.push(self.deliver(sender, &plaintext));
            } else {
                tracing::warn!(
                    participant = %sender,
                    group_id = %group_id,
                    parts = parts.len(),
                    "Group part indices are not contiguous, delivering parts separately"
                );
                for (_, part) in parts {
                    outcomes.push(self.deliver(sender.clone(), &part));
                }
            }
        }
        outcomes
    }

    /// Fetch and route everything addressed to local identities since the
    /// last sync. The first sync resumes from the stored cursor, or looks
    /// back a bounded number of blocks when there is none.
    pub async fn sync(&self) -> Result<Vec<InboundOutcome>, Error> {
        let mut cursor = self.cursor.lock().await;
        let current =
            ledger::with_timeout(self.query_timeout, self.ledger.current_height()).await?;
        let stored = match *cursor {
            Some(height) => Some(height),
            None => self.storage.cursor(INBOUND_CURSOR)?,
        };
        let since = stored.unwrap_or_else(|| current.saturating_sub(self.lookback_blocks));

        let transactions = ledger::fetch_inbound(
            self.ledger.as_ref(),
            &self.identities.addresses(),
            since,
            self.query_timeout,
        )
        .await?;

        let max_seen = transactions.iter().map(|tx| tx.height).max();
        let outcomes = self.process_batch(&transactions);

        let next = (max_seen.map_or(current, |height| height.max(current)) + 1).max(since);
        self.storage.save_cursor(INBOUND_CURSOR, next)?;
        *cursor = Some(next);
        Ok(outcomes)
    }

    fn open(&self, transaction: &InboundTransaction) -> Result<Opened, Error> {
        let envelope = match Envelope::decode(&transaction.note) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(tx_id = %transaction.tx_id, error = %e, "Note is not an envelope");
                return Ok(Opened::Ignored);
            }
        };

        match envelope.kind {
            EnvelopeKind::Psk => self.open_psk(transaction, &envelope),
            EnvelopeKind::Direct => Ok(self.open_direct(transaction, &envelope)),
        }
    }

    fn open_psk(
        &self,
        transaction: &InboundTransaction,
        envelope: &Envelope,
    ) -> Result<Opened, Error> {
        let Some(contact) = self
            .storage
            .find_contact_by_address(&transaction.sender)?
            .filter(|contact| contact.active)
        else {
            return Ok(Opened::Ignored);
        };

        let opened = envelope::open_psk(&contact.initial_secret, &transaction.sender, envelope);
        let plaintext = match opened {
            Ok(plaintext) => plaintext,
            Err(e) => {
                tracing::debug!(tx_id = %transaction.tx_id, error = %e, "PSK envelope did not open");
                return Ok(Opened::Ignored);
            }
        };

        // Only authentic envelopes may move the window
        if !self.replay.accept(&contact, envelope.counter)? {
            return Ok(Opened::Replayed {
                sender: transaction.sender.clone(),
                counter: envelope.counter,
            });
        }

        Ok(Opened::Psk {
            sender: transaction.sender.clone(),
            plaintext,
        })
    }

    fn open_direct(&self, transaction: &InboundTransaction, envelope: &Envelope) -> Opened {
        let Some(identity) = self.identities.by_address(&transaction.receiver) else {
            return Opened::Ignored;
        };

        match identity.open(envelope) {
            Ok(plaintext) => Opened::Direct {
                sender: transaction.sender.clone(),
                group: transaction
                    .group_id
                    .clone()
                    .map(|group_id| (transaction.receiver.clone(), group_id)),
                counter: envelope.counter,
                plaintext,
            },
            Err(e) => {
                tracing::debug!(tx_id = %transaction.tx_id, error = %e, "Direct envelope did not open");
                Opened::Ignored
            }
        }
    }

    fn deliver(&self, sender: String, plaintext: &[u8]) -> InboundOutcome {
        let content = String::from_utf8_lossy(plaintext).into_owned();
        tracing::info!(participant = %sender, len = content.len(), "Received message");
        let _ = self.recorder.record(MessageEvent::now(
            sender.as_str(),
            content.as_str(),
            Direction::Inbound,
            None,
        ));
        InboundOutcome::Delivered {
            participant: sender,
            content,
        }
    }
}
