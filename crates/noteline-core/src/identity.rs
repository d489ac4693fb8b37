//! Sending identities
//!
//! An identity is a ledger account this node controls, together with the
//! X25519 secret whose public half other parties discover and seal direct
//! envelopes to. Agents may own their own identity; everything else sends
//! from the default identity.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::envelope::{self, Envelope};
use crate::error::Error;

/// A local ledger account and its key agreement secret
pub struct Identity {
    address: String,
    secret: StaticSecret,
}

impl Identity {
    /// Wrap an existing secret
    pub fn new<A>(address: A, secret: StaticSecret) -> Self
    where
        A: Into<String>,
    {
        Self {
            address: address.into(),
            secret,
        }
    }

    /// Build an identity from 32 secret bytes
    pub fn from_bytes<A>(address: A, secret: [u8; 32]) -> Self
    where
        A: Into<String>,
    {
        Self::new(address, StaticSecret::from(secret))
    }

    /// Generate an identity with a fresh random secret
    pub fn generate<A>(address: A) -> Self
    where
        A: Into<String>,
    {
        Self::new(address, StaticSecret::random_from_rng(OsRng))
    }

    /// Ledger address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// X25519 public key published for this identity
    pub fn public_key(&self) -> [u8; 32] {
        PublicKey::from(&self.secret).to_bytes()
    }

    /// Open a direct envelope sealed to this identity
    pub fn open(&self, envelope: &Envelope) -> Result<Vec<u8>, Error> {
        envelope::open_direct(&self.secret, envelope)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("address", &self.address)
            .field("public_key", &hex::encode(self.public_key()))
            .finish()
    }
}

/// The default identity plus any per-agent identities
#[derive(Debug, Default, Clone)]
pub struct IdentityRegistry {
    default: Option<Arc<Identity>>,
    agents: HashMap<String, Arc<Identity>>,
}

impl IdentityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the identity used when no agent identity applies
    pub fn set_default(&mut self, identity: Identity) {
        self.default = Some(Arc::new(identity));
    }

    /// Register the identity owned by `agent_id`
    pub fn insert_agent<S>(&mut self, agent_id: S, identity: Identity)
    where
        S: Into<String>,
    {
        self.agents.insert(agent_id.into(), Arc::new(identity));
    }

    /// The default identity, if configured
    pub fn default_identity(&self) -> Option<Arc<Identity>> {
        self.default.clone()
    }

    /// Sending identity for a conversation owned by `agent_id`.
    ///
    /// Falls back to the default identity when the agent has none of its own
    /// or when the conversation belongs to the owner.
    pub fn resolve(&self, agent_id: Option<&str>) -> Option<Arc<Identity>> {
        agent_id
            .and_then(|id| self.agents.get(id))
            .or(self.default.as_ref())
            .cloned()
    }

    /// Identity whose ledger address is `address`
    pub fn by_address(&self, address: &str) -> Option<Arc<Identity>> {
        self.default
            .iter()
            .chain(self.agents.values())
            .find(|identity| identity.address() == address)
            .cloned()
    }

    /// Every distinct local address
    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self
            .default
            .iter()
            .chain(self.agents.values())
            .map(|identity| identity.address().to_string())
            .collect();
        addresses.sort();
        addresses.dedup();
        addresses
    }
}
