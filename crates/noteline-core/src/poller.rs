//! Discovery poller
//!
//! Scans recent inbound transactions for PSK envelopes that open under an
//! unmatched contact's secret. A contact that decrypts exactly one envelope
//! is promoted to matched with the sender's address, and its first message is
//! delivered to the first-message listeners once.
//!
//! The block cursor only moves forward and is stored after every tick. A
//! fresh poller resumes from the stored cursor; without one, the first tick
//! looks back a bounded number of blocks. The
//! background loop ends by itself once no unmatched contact remains.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use noteline_storage_traits::NotelineStorageProvider;
use noteline_storage_traits::contacts::error::ContactError;
use noteline_storage_traits::contacts::types::{Contact, Promotion};
use noteline_storage_traits::events::types::{Direction, MessageEvent};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::callback::{FirstMessage, FirstMessageListener, ListenerSet};
use crate::config::NotelineConfig;
use crate::constant::DISCOVERY_CURSOR;
use crate::envelope::{self, Envelope, EnvelopeKind};
use crate::error::Error;
use crate::identity::IdentityRegistry;
use crate::inbound::ReplayGuard;
use crate::ledger::{self, InboundTransaction, LedgerClient};
use crate::recorder::EventRecorder;

/// Result of one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick was still running
    Skipped,
    /// No unmatched contacts remain
    Idle,
    /// The ledger was scanned
    Polled {
        /// Transactions examined
        scanned: usize,
        /// Contacts promoted
        promoted: usize,
        /// Height the next tick starts from
        cursor: u64,
    },
}

/// Background contact discovery by trial decryption
pub struct DiscoveryPoller {
    ledger: Arc<dyn LedgerClient>,
    storage: Arc<dyn NotelineStorageProvider>,
    identities: Arc<IdentityRegistry>,
    recorder: Arc<EventRecorder>,
    first_message: Arc<ListenerSet<dyn FirstMessageListener>>,
    replay: Arc<ReplayGuard>,
    network: String,
    lookback_blocks: u64,
    poll_interval: Duration,
    query_timeout: Duration,
    cursor: Mutex<Option<u64>>,
    running: AtomicBool,
}

impl fmt::Debug for DiscoveryPoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryPoller")
            .field("network", &self.network)
            .field("cursor", &*self.cursor.lock())
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Clears the running flag when a tick ends, even by early return
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DiscoveryPoller {
    pub(crate) fn new(
        config: &NotelineConfig,
        ledger: Arc<dyn LedgerClient>,
        storage: Arc<dyn NotelineStorageProvider>,
        identities: Arc<IdentityRegistry>,
        recorder: Arc<EventRecorder>,
        first_message: Arc<ListenerSet<dyn FirstMessageListener>>,
        replay: Arc<ReplayGuard>,
    ) -> Self {
        Self {
            ledger,
            storage,
            identities,
            recorder,
            first_message,
            replay,
            network: config.network.clone(),
            lookback_blocks: config.discovery_lookback_blocks,
            poll_interval: config.poll_interval(),
            query_timeout: config.poll_query_timeout(),
            cursor: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    /// Height the next tick will start from, once established
    pub fn cursor(&self) -> Option<u64> {
        *self.cursor.lock()
    }

    /// Run one discovery pass
    pub async fn tick(&self) -> Result<TickOutcome, Error> {
        if self.running.swap(true, Ordering::AcqRel) {
            tracing::debug!("Discovery tick still running, skipping");
            return Ok(TickOutcome::Skipped);
        }
        let _running = RunningGuard(&self.running);

        let mut unmatched = self.storage.unmatched_contacts(&self.network)?;
        if unmatched.is_empty() {
            return Ok(TickOutcome::Idle);
        }

        let current =
            ledger::with_timeout(self.query_timeout, self.ledger.current_height()).await?;
        let held = *self.cursor.lock();
        let previous = match held {
            Some(height) => Some(height),
            None => self.storage.cursor(DISCOVERY_CURSOR)?,
        };
        let since = previous.unwrap_or_else(|| current.saturating_sub(self.lookback_blocks));

        let mut transactions = ledger::fetch_inbound(
            self.ledger.as_ref(),
            &self.identities.addresses(),
            since,
            self.query_timeout,
        )
        .await?;
        // Earliest first, so the original sender of a note wins over a copy
        transactions.sort_by_key(|tx| tx.height);

        let mut promoted = 0;
        for transaction in &transactions {
            if unmatched.is_empty() {
                break;
            }
            if self.examine(transaction, &mut unmatched)? {
                promoted += 1;
            }
        }

        let max_seen = transactions.iter().map(|tx| tx.height).max().unwrap_or(0);
        let cursor = since
            .max(current.saturating_add(1))
            .max(max_seen.saturating_add(1));
        self.storage.save_cursor(DISCOVERY_CURSOR, cursor)?;
        *self.cursor.lock() = Some(cursor);

        tracing::debug!(
            scanned = transactions.len(),
            promoted,
            cursor,
            remaining = unmatched.len(),
            "Discovery tick complete"
        );
        Ok(TickOutcome::Polled {
            scanned: transactions.len(),
            promoted,
            cursor,
        })
    }

    /// Trial-decrypt one transaction, promoting at most one contact
    fn examine(
        &self,
        transaction: &InboundTransaction,
        unmatched: &mut Vec<Contact>,
    ) -> Result<bool, Error> {
        let envelope = match Envelope::decode(&transaction.note) {
            Ok(envelope) if envelope.kind == EnvelopeKind::Psk => envelope,
            Ok(_) => return Ok(false),
            Err(e) => {
                tracing::debug!(tx_id = %transaction.tx_id, error = %e, "Note is not an envelope");
                return Ok(false);
            }
        };

        let mut matches: Vec<(usize, Vec<u8>)> = Vec::new();
        for (index, contact) in unmatched.iter().enumerate() {
            match envelope::open_psk(&contact.initial_secret, &transaction.sender, &envelope) {
                Ok(plaintext) => matches.push((index, plaintext)),
                Err(e) => tracing::debug!(
                    tx_id = %transaction.tx_id,
                    contact_id = %contact.id,
                    error = %e,
                    "Trial decryption missed"
                ),
            }
        }

        let (index, plaintext) = match matches.len() {
            0 => return Ok(false),
            1 => matches.swap_remove(0),
            n => {
                let contact_ids: Vec<&str> = matches
                    .iter()
                    .map(|(index, _)| unmatched[*index].id.as_str())
                    .collect();
                tracing::error!(
                    tx_id = %transaction.tx_id,
                    matches = n,
                    contact_ids = ?contact_ids,
                    "Integrity fault: envelope opened under more than one contact secret"
                );
                return Ok(false);
            }
        };

        let contact = &unmatched[index];
        match self.storage.promote_contact(&contact.id, &transaction.sender) {
            Ok(Promotion::Promoted) => {}
            Ok(Promotion::AlreadyMatched) => {
                unmatched.swap_remove(index);
                return Ok(false);
            }
            Err(ContactError::AddressConflict { address, owner_id }) => {
                tracing::warn!(
                    contact_id = %contact.id,
                    address = %address,
                    owner_id = %owner_id,
                    "Discovered address already belongs to another contact"
                );
                return Ok(false);
            }
            Err(ContactError::AlreadyMatched { id, address }) => {
                tracing::warn!(contact_id = %id, address = %address, "Contact was matched elsewhere");
                unmatched.swap_remove(index);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }

        let contact = unmatched.swap_remove(index);
        self.replay.accept(&contact, envelope.counter)?;

        let first = FirstMessage {
            contact_id: contact.id.clone(),
            sender: transaction.sender.clone(),
            plaintext: String::from_utf8_lossy(&plaintext).into_owned(),
            height: transaction.height,
            value: (transaction.amount > 0).then_some(transaction.amount),
        };
        tracing::info!(
            contact_id = %contact.id,
            nickname = %contact.nickname,
            address = %first.sender,
            height = first.height,
            "Promoted contact from first message"
        );

        self.first_message
            .notify(|listener| listener.on_first_message(&first));
        let _ = self.recorder.record(MessageEvent::now(
            first.sender.as_str(),
            first.plaintext.as_str(),
            Direction::Inbound,
            None,
        ));
        Ok(true)
    }

    /// Run ticks on the poll interval until stopped or idle.
    ///
    /// Dropping the returned handle also stops the loop.
    pub fn spawn(self: Arc<Self>) -> PollerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let poller = self;

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(poller.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            tracing::debug!("Discovery poller stop requested");
                            break;
                        }
                        continue;
                    }
                }

                match poller.tick().await {
                    Ok(TickOutcome::Idle) => {
                        tracing::info!("No unmatched contacts remain, discovery poller stopping");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "Discovery tick failed"),
                }
            }
        });

        PollerHandle {
            stop: stop_tx,
            task,
        }
    }
}

/// Control handle for a spawned [`DiscoveryPoller`]
#[derive(Debug)]
pub struct PollerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Ask the loop to stop after the current tick
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Whether the loop has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to exit
    pub async fn join(self) -> Result<(), Error> {
        let PollerHandle { stop, task } = self;
        let result = task.await.map_err(|e| Error::Task(e.to_string()));
        drop(stop);
        result
    }
}
