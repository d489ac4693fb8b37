//! Transmitter
//!
//! Orchestrates outbound delivery. A send never fails towards the caller:
//! every path ends in an outbound event, a truncated fallback or a dead
//! letter, and the result is reported as a [`SendOutcome`].
//!
//! Routing order:
//! 1. Matched PSK contact: chunk, then submit one envelope per chunk
//!    sequentially with a fixed delay, holding the contact's send lock.
//! 2. Otherwise seal to the participant's public key and submit all parts
//!    as one atomic group.
//! 3. If the group is rejected or too large, submit a single truncated
//!    transmission.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use noteline_storage_traits::NotelineStorageProvider;
use noteline_storage_traits::contacts::types::Contact;
use noteline_storage_traits::conversations::types::Conversation;
use noteline_storage_traits::events::types::{Direction, MessageEvent};
use parking_lot::Mutex;

use crate::chunker;
use crate::config::NotelineConfig;
use crate::dead_letter::{DeadLetterContext, DeadLetterLogger};
use crate::envelope;
use crate::error::Error;
use crate::identity::Identity;
use crate::key_cache::PublicKeyCache;
use crate::ledger::{LedgerClient, LedgerError, Transaction};
use crate::recorder::EventRecorder;
use crate::router::{Router, SendStrategy};
use crate::spending::SpendingGovernor;

/// What happened to a send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The whole message was delivered
    Delivered {
        /// Transactions submitted
        transactions: usize,
        /// Total fee charged
        fee: u64,
    },
    /// Grouped delivery failed and a truncated single transmission went out
    Truncated {
        /// Fee charged for the fallback transmission
        fee: u64,
    },
    /// Nothing (or only a prefix) was delivered; see the dead-letter log
    DeadLettered {
        /// Rendered failure
        reason: String,
    },
}

impl SendOutcome {
    /// Whether any content reached the participant in full or truncated form
    pub fn is_delivered(&self) -> bool {
        !matches!(self, Self::DeadLettered { .. })
    }
}

/// Shared collaborators of the transmitter
pub(crate) struct TransmitterParts {
    pub config: NotelineConfig,
    pub ledger: Arc<dyn LedgerClient>,
    pub storage: Arc<dyn NotelineStorageProvider>,
    pub router: Arc<dyn Router>,
    pub key_cache: Arc<PublicKeyCache>,
    pub governor: Arc<SpendingGovernor>,
    pub recorder: Arc<EventRecorder>,
    pub dead_letters: Arc<DeadLetterLogger>,
}

/// Outbound message orchestrator
pub struct Transmitter {
    config: NotelineConfig,
    ledger: Arc<dyn LedgerClient>,
    storage: Arc<dyn NotelineStorageProvider>,
    router: Arc<dyn Router>,
    key_cache: Arc<PublicKeyCache>,
    governor: Arc<SpendingGovernor>,
    recorder: Arc<EventRecorder>,
    dead_letters: Arc<DeadLetterLogger>,
    /// Per-contact send locks keyed by contact id
    contact_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl fmt::Debug for Transmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transmitter")
            .field("router", &self.router)
            .field("governor", &self.governor)
            .finish_non_exhaustive()
    }
}

impl Transmitter {
    pub(crate) fn new(parts: TransmitterParts) -> Self {
        Self {
            config: parts.config,
            ledger: parts.ledger,
            storage: parts.storage,
            router: parts.router,
            key_cache: parts.key_cache,
            governor: parts.governor,
            recorder: parts.recorder,
            dead_letters: parts.dead_letters,
            contact_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Deliver `content` to `participant`
    pub async fn send(&self, participant: &str, content: &str) -> SendOutcome {
        let strategy = match self.router.resolve(participant) {
            Ok(Some(strategy)) => strategy,
            Ok(None) => {
                let error = Error::NoRoute(participant.to_string());
                return self.dead_letter(participant, content, None, &error);
            }
            Err(e) => return self.dead_letter(participant, content, None, &e),
        };

        match strategy {
            SendStrategy::Psk {
                contact,
                sender,
                conversation,
            } => {
                self.send_psk(participant, content, &contact, &sender, conversation.as_ref())
                    .await
            }
            SendStrategy::Direct {
                sender,
                conversation,
            } => {
                self.send_direct(participant, content, &sender, conversation.as_ref())
                    .await
            }
        }
    }

    async fn send_psk(
        &self,
        participant: &str,
        content: &str,
        contact: &Contact,
        sender: &Identity,
        conversation: Option<&Conversation>,
    ) -> SendOutcome {
        let parts = match chunker::split(content, self.config.psk_chunk_bytes) {
            Ok(parts) => parts,
            Err(e) => return self.dead_letter(participant, content, conversation, &Error::from(e)),
        };

        let estimate = self.estimate(parts.len());
        let reservation = match self.governor.reserve(estimate) {
            Ok(reservation) => reservation,
            Err(e) => return self.dead_letter(participant, content, conversation, &Error::from(e)),
        };

        let lock = self.contact_lock(&contact.id);
        let _serialized = lock.lock().await;

        let mut fee = 0u64;
        let mut sent = 0usize;
        let mut failure = None;

        for (index, part) in parts.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.chunk_delay()).await;
            }

            match self.submit_psk_part(contact, sender, participant, part).await {
                Ok(part_fee) => {
                    fee = fee.saturating_add(part_fee);
                    sent += 1;
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let Some(error) = failure else {
            reservation.commit(fee, participant);
            tracing::info!(
                participant = %participant,
                chunks = sent,
                fee,
                "Delivered PSK message"
            );
            self.record_outbound(participant, content, fee);
            return SendOutcome::Delivered {
                transactions: sent,
                fee,
            };
        };

        if sent == 0 {
            reservation.release();
            return self.dead_letter(participant, content, conversation, &error);
        }

        // Sent chunks are never retried: bill them, record the delivered
        // prefix and dead-letter the remainder.
        reservation.commit(fee, participant);
        let delivered = parts[..sent].concat();
        let remainder = parts[sent..].concat();
        self.record_outbound(participant, &delivered, fee);

        let error = match error {
            Error::Ledger(source) => Error::PartialDelivery {
                sent,
                total: parts.len(),
                source,
            },
            other => other,
        };
        self.dead_letter(participant, &remainder, conversation, &error)
    }

    async fn submit_psk_part(
        &self,
        contact: &Contact,
        sender: &Identity,
        participant: &str,
        part: &str,
    ) -> Result<u64, Error> {
        let counter = self.storage.next_outbound_counter(&contact.id)?;
        let sealed = envelope::seal_psk(
            &contact.initial_secret,
            sender.address(),
            counter,
            part.as_bytes(),
        )?;
        let receipt = self
            .ledger
            .submit_transaction(self.transaction(sender, participant, sealed.encode()))
            .await?;

        tracing::debug!(
            participant = %participant,
            counter,
            tx_id = %receipt.tx_id,
            height = receipt.height,
            "Submitted PSK chunk"
        );
        Ok(receipt.fee.unwrap_or(self.config.fee_per_transaction))
    }

    async fn send_direct(
        &self,
        participant: &str,
        content: &str,
        sender: &Identity,
        conversation: Option<&Conversation>,
    ) -> SendOutcome {
        let recipient_key = match self.key_cache.get_public_key(participant).await {
            Ok(key) => key,
            Err(e) => {
                return self.dead_letter(participant, content, conversation, &Error::from(e));
            }
        };

        let parts = match chunker::split(content, self.config.direct_chunk_bytes) {
            Ok(parts) => parts,
            Err(e) => return self.dead_letter(participant, content, conversation, &Error::from(e)),
        };

        if parts.len() == 1 {
            return self
                .send_single(participant, content, sender, &recipient_key, conversation)
                .await;
        }

        let group_error = if parts.len() > self.config.max_group_size {
            LedgerError::Unsupported(format!(
                "message needs {} parts, group limit is {}",
                parts.len(),
                self.config.max_group_size
            ))
        } else {
            let reservation = match self.governor.reserve(self.estimate(parts.len())) {
                Ok(reservation) => reservation,
                Err(e) => {
                    return self.dead_letter(participant, content, conversation, &Error::from(e));
                }
            };

            match self
                .submit_group(participant, &parts, sender, &recipient_key)
                .await
            {
                Ok(fee) => {
                    reservation.commit(fee, participant);
                    tracing::info!(
                        participant = %participant,
                        parts = parts.len(),
                        fee,
                        "Delivered grouped message"
                    );
                    self.record_outbound(participant, content, fee);
                    return SendOutcome::Delivered {
                        transactions: parts.len(),
                        fee,
                    };
                }
                Err(Error::Ledger(e)) => {
                    reservation.release();
                    e
                }
                Err(e) => {
                    reservation.release();
                    return self.dead_letter(participant, content, conversation, &e);
                }
            }
        };

        tracing::warn!(
            participant = %participant,
            error = %group_error,
            "Grouped transmission failed, falling back to truncated single transmission"
        );
        self.send_fallback(participant, content, sender, &recipient_key, conversation, group_error)
            .await
    }

    async fn submit_group(
        &self,
        participant: &str,
        parts: &[&str],
        sender: &Identity,
        recipient_key: &[u8; 32],
    ) -> Result<u64, Error> {
        let mut transactions = Vec::with_capacity(parts.len());
        for (index, part) in parts.iter().enumerate() {
            let sealed = envelope::seal_direct(recipient_key, index as u64, part.as_bytes())?;
            transactions.push(self.transaction(sender, participant, sealed.encode()));
        }

        let receipt = self.ledger.submit_group(transactions).await?;
        tracing::debug!(
            participant = %participant,
            tx_ids = ?receipt.tx_ids,
            height = receipt.height,
            "Submitted transaction group"
        );
        Ok(receipt.fee.unwrap_or(self.estimate(parts.len())))
    }

    async fn send_single(
        &self,
        participant: &str,
        content: &str,
        sender: &Identity,
        recipient_key: &[u8; 32],
        conversation: Option<&Conversation>,
    ) -> SendOutcome {
        let reservation = match self.governor.reserve(self.estimate(1)) {
            Ok(reservation) => reservation,
            Err(e) => return self.dead_letter(participant, content, conversation, &Error::from(e)),
        };

        match self
            .submit_single(participant, content, sender, recipient_key)
            .await
        {
            Ok(fee) => {
                reservation.commit(fee, participant);
                tracing::info!(participant = %participant, fee, "Delivered direct message");
                self.record_outbound(participant, content, fee);
                SendOutcome::Delivered {
                    transactions: 1,
                    fee,
                }
            }
            Err(e) => {
                reservation.release();
                self.dead_letter(participant, content, conversation, &e)
            }
        }
    }

    async fn send_fallback(
        &self,
        participant: &str,
        content: &str,
        sender: &Identity,
        recipient_key: &[u8; 32],
        conversation: Option<&Conversation>,
        group_error: LedgerError,
    ) -> SendOutcome {
        let truncated = chunker::truncate_with_marker(content, self.config.direct_chunk_bytes);
        let reservation = match self.governor.reserve(self.estimate(1)) {
            Ok(reservation) => reservation,
            Err(e) => return self.dead_letter(participant, content, conversation, &Error::from(e)),
        };

        match self
            .submit_single(participant, &truncated, sender, recipient_key)
            .await
        {
            Ok(fee) => {
                reservation.commit(fee, participant);
                tracing::info!(
                    participant = %participant,
                    original_len = content.len(),
                    sent_len = truncated.len(),
                    fee,
                    "Delivered truncated fallback message"
                );
                self.record_outbound(participant, &truncated, fee);
                SendOutcome::Truncated { fee }
            }
            Err(Error::Ledger(fallback)) => {
                reservation.release();
                let error = Error::FallbackFailed {
                    group: group_error,
                    fallback,
                };
                self.dead_letter(participant, content, conversation, &error)
            }
            Err(e) => {
                reservation.release();
                self.dead_letter(participant, content, conversation, &e)
            }
        }
    }

    async fn submit_single(
        &self,
        participant: &str,
        content: &str,
        sender: &Identity,
        recipient_key: &[u8; 32],
    ) -> Result<u64, Error> {
        let sealed = envelope::seal_direct(recipient_key, 0, content.as_bytes())?;
        let receipt = self
            .ledger
            .submit_transaction(self.transaction(sender, participant, sealed.encode()))
            .await?;
        tracing::debug!(
            participant = %participant,
            tx_id = %receipt.tx_id,
            height = receipt.height,
            "Submitted direct transaction"
        );
        Ok(receipt.fee.unwrap_or(self.config.fee_per_transaction))
    }

    fn transaction(&self, sender: &Identity, participant: &str, note: Vec<u8>) -> Transaction {
        Transaction {
            sender: sender.address().to_string(),
            receiver: participant.to_string(),
            amount: 0,
            note,
        }
    }

    fn estimate(&self, transactions: usize) -> u64 {
        (transactions as u64).saturating_mul(self.config.fee_per_transaction)
    }

    fn contact_lock(&self, contact_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            self.contact_locks
                .lock()
                .entry(contact_id.to_string())
                .or_default(),
        )
    }

    fn record_outbound(&self, participant: &str, content: &str, fee: u64) {
        // Persistence failures are logged by the recorder
        let _ = self.recorder.record(MessageEvent::now(
            participant,
            content,
            Direction::Outbound,
            Some(fee),
        ));
    }

    fn dead_letter(
        &self,
        participant: &str,
        content: &str,
        conversation: Option<&Conversation>,
        error: &Error,
    ) -> SendOutcome {
        let context = DeadLetterContext {
            conversation_id: conversation.map(|c| c.id.as_str()),
            session_id: conversation.and_then(|c| c.session_id.as_deref()),
            agent_id: conversation.and_then(|c| c.agent_id.as_deref()),
        };
        let letter = self
            .dead_letters
            .record(participant, content, context, error);
        SendOutcome::DeadLettered {
            reason: letter.error,
        }
    }
}
