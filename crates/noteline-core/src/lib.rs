//! Confidential messaging over a public ledger
//!
//! This crate lets a local owner and its agents exchange authenticated,
//! encrypted messages with remote participants using nothing but ledger
//! transactions. It covers the PSK key ratchet and envelope format, contact
//! discovery by trial decryption, chunked and paced delivery, the spending
//! circuit breaker and dead-letter logging.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]
#![doc = include_str!("../README.md")]

use std::fmt;
use std::sync::Arc;

use noteline_storage_traits::NotelineStorageProvider;
use noteline_storage_traits::contacts::types::Contact;
use noteline_storage_traits::conversations::types::Conversation;
use noteline_storage_traits::events::Pagination;
use noteline_storage_traits::events::types::StoredEvent;

pub mod callback;
pub mod chunker;
pub mod config;
pub mod constant;
pub mod dead_letter;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod inbound;
pub mod key_cache;
pub mod ledger;
pub mod poller;
pub mod prelude;
pub mod ratchet;
pub mod recorder;
pub mod router;
pub mod spending;
pub mod transmitter;

use self::callback::{EventListener, FirstMessageListener, ListenerId, ListenerSet};
pub use self::config::NotelineConfig;
use self::dead_letter::{DeadLetter, DeadLetterLogger};
pub use self::error::Error;
use self::identity::{Identity, IdentityRegistry};
use self::inbound::{InboundOutcome, InboundRouter, ReplayGuard};
use self::key_cache::PublicKeyCache;
use self::ledger::{InboundTransaction, LedgerClient};
use self::poller::{DiscoveryPoller, PollerHandle, TickOutcome};
use self::recorder::EventRecorder;
use self::router::{Router, StorageRouter};
use self::spending::{Clock, SpendingGovernor, SpendingSnapshot};
use self::transmitter::{SendOutcome, Transmitter, TransmitterParts};

/// Builder for constructing [`Noteline`] instances
///
/// # Examples
///
/// ```no_run
/// # use std::sync::Arc;
/// # use noteline_core::prelude::*;
/// # use noteline_memory_storage::NotelineMemoryStorage;
/// # fn build(ledger: Arc<dyn LedgerClient>) -> Result<Noteline, Error> {
/// let noteline = Noteline::builder(Arc::new(NotelineMemoryStorage::default()), ledger)
///     .with_config(NotelineConfig::new())
///     .with_default_identity(Identity::generate("OWNER-ADDRESS"))
///     .with_agent_identity("agent-1", Identity::generate("AGENT-ADDRESS"))
///     .build()?;
/// # Ok(noteline)
/// # }
/// ```
pub struct NotelineBuilder {
    storage: Arc<dyn NotelineStorageProvider>,
    ledger: Arc<dyn LedgerClient>,
    config: NotelineConfig,
    identities: IdentityRegistry,
    router: Option<Arc<dyn Router>>,
    event_listeners: Vec<Arc<dyn EventListener>>,
    first_message_listeners: Vec<Arc<dyn FirstMessageListener>>,
    clock: Option<Clock>,
}

impl fmt::Debug for NotelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotelineBuilder")
            .field("backend", &self.storage.backend())
            .field("ledger", &self.ledger)
            .field("config", &self.config)
            .field("identities", &self.identities)
            .finish_non_exhaustive()
    }
}

impl NotelineBuilder {
    /// Create a builder over `storage` and `ledger`
    pub fn new(storage: Arc<dyn NotelineStorageProvider>, ledger: Arc<dyn LedgerClient>) -> Self {
        Self {
            storage,
            ledger,
            config: NotelineConfig::default(),
            identities: IdentityRegistry::new(),
            router: None,
            event_listeners: Vec::new(),
            first_message_listeners: Vec::new(),
            clock: None,
        }
    }

    /// Set a custom configuration
    pub fn with_config(mut self, config: NotelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the identity used for owner conversations and as fallback
    pub fn with_default_identity(mut self, identity: Identity) -> Self {
        self.identities.set_default(identity);
        self
    }

    /// Register the identity used for conversations owned by `agent_id`
    pub fn with_agent_identity<S>(mut self, agent_id: S, identity: Identity) -> Self
    where
        S: Into<String>,
    {
        self.identities.insert_agent(agent_id, identity);
        self
    }

    /// Replace the storage-backed router
    pub fn with_router(mut self, router: Arc<dyn Router>) -> Self {
        self.router = Some(router);
        self
    }

    /// Register an event listener before anything can be recorded
    pub fn with_event_listener(mut self, listener: Arc<dyn EventListener>) -> Self {
        self.event_listeners.push(listener);
        self
    }

    /// Register a first-message listener before discovery can run
    pub fn with_first_message_listener(mut self, listener: Arc<dyn FirstMessageListener>) -> Self {
        self.first_message_listeners.push(listener);
        self
    }

    /// Use `clock` (unix seconds) for spending periods
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the instance, validating the configuration
    pub fn build(self) -> Result<Noteline, Error> {
        self.config.validate()?;
        if self.identities.default_identity().is_none() {
            return Err(Error::MissingDefaultIdentity);
        }

        let config = self.config;
        let identities = Arc::new(self.identities);

        let recorder = Arc::new(EventRecorder::new(Arc::clone(&self.storage)));
        for listener in self.event_listeners {
            recorder.listeners().add(listener);
        }
        let first_message: Arc<ListenerSet<dyn FirstMessageListener>> =
            Arc::new(ListenerSet::default());
        for listener in self.first_message_listeners {
            first_message.add(listener);
        }

        let governor = match self.clock {
            Some(clock) => SpendingGovernor::with_clock(
                config.spending_ceiling,
                config.spending_period_secs,
                clock,
            ),
            None => SpendingGovernor::new(config.spending_ceiling, config.spending_period_secs),
        };
        let governor = Arc::new(governor.with_storage(Arc::clone(&self.storage))?);

        let key_cache = Arc::new(PublicKeyCache::new(
            Arc::clone(&self.ledger),
            config.key_cache_ttl(),
            config.key_cache_capacity,
        ));
        let dead_letters = Arc::new(DeadLetterLogger::new(
            config.dead_letter_preview_chars,
            config.dead_letter_capacity,
        ));
        let router: Arc<dyn Router> = match self.router {
            Some(router) => router,
            None => Arc::new(StorageRouter::new(
                Arc::clone(&self.storage),
                Arc::clone(&identities),
            )),
        };

        let transmitter = Transmitter::new(TransmitterParts {
            config: config.clone(),
            ledger: Arc::clone(&self.ledger),
            storage: Arc::clone(&self.storage),
            router,
            key_cache: Arc::clone(&key_cache),
            governor: Arc::clone(&governor),
            recorder: Arc::clone(&recorder),
            dead_letters: Arc::clone(&dead_letters),
        });

        let replay = Arc::new(ReplayGuard::new(Arc::clone(&self.storage)));
        let poller = Arc::new(DiscoveryPoller::new(
            &config,
            Arc::clone(&self.ledger),
            Arc::clone(&self.storage),
            Arc::clone(&identities),
            Arc::clone(&recorder),
            Arc::clone(&first_message),
            Arc::clone(&replay),
        ));
        let inbound = InboundRouter::new(
            Arc::clone(&self.ledger),
            Arc::clone(&self.storage),
            Arc::clone(&identities),
            Arc::clone(&recorder),
            replay,
            config.discovery_lookback_blocks,
            config.poll_query_timeout(),
        );

        tracing::debug!(
            network = %config.network,
            backend = ?self.storage.backend(),
            identities = identities.addresses().len(),
            "Built noteline instance"
        );

        Ok(Noteline {
            config,
            storage: self.storage,
            identities,
            recorder,
            first_message,
            governor,
            key_cache,
            dead_letters,
            transmitter,
            poller,
            inbound,
        })
    }
}

/// The messaging subsystem.
///
/// Constructed once at startup and shared by reference. All components hold
/// their own state; there are no process-wide singletons.
pub struct Noteline {
    config: NotelineConfig,
    storage: Arc<dyn NotelineStorageProvider>,
    identities: Arc<IdentityRegistry>,
    recorder: Arc<EventRecorder>,
    first_message: Arc<ListenerSet<dyn FirstMessageListener>>,
    governor: Arc<SpendingGovernor>,
    key_cache: Arc<PublicKeyCache>,
    dead_letters: Arc<DeadLetterLogger>,
    transmitter: Transmitter,
    poller: Arc<DiscoveryPoller>,
    inbound: InboundRouter,
}

impl fmt::Debug for Noteline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Noteline")
            .field("config", &self.config)
            .field("backend", &self.storage.backend())
            .field("identities", &self.identities)
            .field("poller", &self.poller)
            .finish_non_exhaustive()
    }
}

impl Noteline {
    /// Start building an instance
    pub fn builder(
        storage: Arc<dyn NotelineStorageProvider>,
        ledger: Arc<dyn LedgerClient>,
    ) -> NotelineBuilder {
        NotelineBuilder::new(storage, ledger)
    }

    /// Active configuration
    pub fn config(&self) -> &NotelineConfig {
        &self.config
    }

    /// Local identities
    pub fn identities(&self) -> &IdentityRegistry {
        &self.identities
    }

    /// Deliver `content` to `participant`. Never fails; see [`SendOutcome`].
    pub async fn send(&self, participant: &str, content: &str) -> SendOutcome {
        self.transmitter.send(participant, content).await
    }

    /// Create an unmatched contact with a pre-shared secret
    pub fn add_contact(&self, nickname: &str, secret: &[u8]) -> Result<Contact, Error> {
        if secret.is_empty() {
            return Err(Error::Config("pre-shared secret must not be empty".to_string()));
        }
        let id = hex::encode(rand::random::<[u8; 16]>());
        let contact = Contact::new(id, nickname, secret, self.config.network.as_str());
        self.storage.save_contact(contact.clone())?;
        tracing::info!(contact_id = %contact.id, nickname = %nickname, "Added contact");
        Ok(contact)
    }

    /// Mark a contact inactive
    pub fn deactivate_contact(&self, id: &str) -> Result<(), Error> {
        self.storage.deactivate_contact(id)?;
        Ok(())
    }

    /// Every contact, active or not
    pub fn contacts(&self) -> Result<Vec<Contact>, Error> {
        Ok(self.storage.all_contacts()?)
    }

    /// Attach a participant to an agent or session
    pub fn save_conversation(&self, conversation: Conversation) -> Result<(), Error> {
        self.storage.save_conversation(conversation)?;
        Ok(())
    }

    /// Events for one participant, newest first
    pub fn events(
        &self,
        participant: &str,
        pagination: Pagination,
    ) -> Result<Vec<StoredEvent>, Error> {
        Ok(self.storage.events_for_participant(participant, pagination)?)
    }

    /// Most recent events across participants, newest first
    pub fn recent_events(&self, limit: usize) -> Result<Vec<StoredEvent>, Error> {
        Ok(self.storage.recent_events(limit)?)
    }

    /// Register an event listener
    pub fn on_event(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        self.recorder.listeners().add(listener)
    }

    /// Unregister an event listener
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.recorder.listeners().remove(id)
    }

    /// Register a first-message listener
    pub fn on_first_message(&self, listener: Arc<dyn FirstMessageListener>) -> ListenerId {
        self.first_message.add(listener)
    }

    /// Unregister a first-message listener
    pub fn remove_first_message_listener(&self, id: ListenerId) -> bool {
        self.first_message.remove(id)
    }

    /// Start the background discovery loop
    pub fn spawn_discovery(&self) -> PollerHandle {
        Arc::clone(&self.poller).spawn()
    }

    /// Run one discovery pass now
    pub async fn tick_discovery(&self) -> Result<TickOutcome, Error> {
        self.poller.tick().await
    }

    /// Fetch and route inbound messages for matched contacts and identities
    pub async fn sync_inbound(&self) -> Result<Vec<InboundOutcome>, Error> {
        self.inbound.sync().await
    }

    /// Route already fetched inbound transactions
    pub fn process_inbound(&self, transactions: &[InboundTransaction]) -> Vec<InboundOutcome> {
        self.inbound.process_batch(transactions)
    }

    /// Recently dead-lettered sends, oldest first
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.recent()
    }

    /// Current spending budget
    pub fn spending(&self) -> SpendingSnapshot {
        self.governor.snapshot()
    }

    /// Forget the cached public key for `address`
    pub fn invalidate_public_key(&self, address: &str) {
        self.key_cache.invalidate(address);
    }
}

#[cfg(test)]
mod tests {
    use noteline_memory_storage::NotelineMemoryStorage;

    use super::*;

    #[derive(Debug)]
    struct UnusedLedger;

    #[async_trait::async_trait]
    impl LedgerClient for UnusedLedger {
        async fn submit_transaction(
            &self,
            _transaction: ledger::Transaction,
        ) -> Result<ledger::TxReceipt, ledger::LedgerError> {
            Err(ledger::LedgerError::Unsupported("test".into()))
        }

        async fn submit_group(
            &self,
            _transactions: Vec<ledger::Transaction>,
        ) -> Result<ledger::GroupReceipt, ledger::LedgerError> {
            Err(ledger::LedgerError::Unsupported("test".into()))
        }

        async fn query_transactions_to(
            &self,
            _address: &str,
            _since_height: u64,
            _page: Option<String>,
        ) -> Result<ledger::TransactionPage, ledger::LedgerError> {
            Ok(ledger::TransactionPage::default())
        }

        async fn current_height(&self) -> Result<u64, ledger::LedgerError> {
            Ok(0)
        }

        async fn discover_public_key(&self, address: &str) -> Result<[u8; 32], ledger::LedgerError> {
            Err(ledger::LedgerError::NotFound(address.to_string()))
        }
    }

    fn builder() -> NotelineBuilder {
        Noteline::builder(
            Arc::new(NotelineMemoryStorage::default()),
            Arc::new(UnusedLedger),
        )
    }

    #[test]
    fn test_build_requires_default_identity() {
        let err = builder().build().unwrap_err();
        assert!(matches!(err, Error::MissingDefaultIdentity));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let config = NotelineConfig {
            psk_chunk_bytes: 0,
            ..Default::default()
        };
        let err = builder()
            .with_config(config)
            .with_default_identity(Identity::from_bytes("OWNER", [1u8; 32]))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_add_contact_is_unmatched_in_configured_network() {
        let noteline = builder()
            .with_default_identity(Identity::from_bytes("OWNER", [1u8; 32]))
            .build()
            .unwrap();

        let contact = noteline.add_contact("alice", b"shared secret").unwrap();
        assert_eq!(contact.id.len(), 32);
        assert_eq!(contact.network, "testnet");
        assert!(!contact.is_matched());
        assert_eq!(noteline.contacts().unwrap(), vec![contact.clone()]);

        noteline.deactivate_contact(&contact.id).unwrap();
        assert!(!noteline.contacts().unwrap()[0].active);
        assert!(noteline.add_contact("empty", b"").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_direct_send_is_dead_lettered() {
        let noteline = builder()
            .with_default_identity(Identity::from_bytes("OWNER", [1u8; 32]))
            .build()
            .unwrap();

        let outcome = noteline.send("BOB", "hello").await;
        assert!(matches!(outcome, SendOutcome::DeadLettered { .. }));
        assert_eq!(noteline.dead_letters().len(), 1);
        assert_eq!(noteline.spending().spent, 0);
        assert!(noteline.recent_events(10).unwrap().is_empty());
    }
}
