//! Outbound routing
//!
//! Decides, once per send, whether a participant is reached through a
//! matched PSK contact or by sealing directly to their public key, and which
//! local identity signs the transactions.

use std::fmt;
use std::sync::Arc;

use noteline_storage_traits::NotelineStorageProvider;
use noteline_storage_traits::contacts::types::Contact;
use noteline_storage_traits::conversations::types::Conversation;

use crate::error::Error;
use crate::identity::{Identity, IdentityRegistry};

/// How to reach one participant
#[derive(Debug, Clone)]
pub enum SendStrategy {
    /// Ratchet-keyed envelopes to a matched contact
    Psk {
        /// Matched, active contact
        contact: Contact,
        /// Identity submitting the transactions
        sender: Arc<Identity>,
        /// Conversation with the participant, if any
        conversation: Option<Conversation>,
    },
    /// Envelopes sealed to the participant's discovered public key
    Direct {
        /// Identity submitting the transactions
        sender: Arc<Identity>,
        /// Conversation with the participant, if any
        conversation: Option<Conversation>,
    },
}

impl SendStrategy {
    /// Conversation the send belongs to
    pub fn conversation(&self) -> Option<&Conversation> {
        match self {
            Self::Psk { conversation, .. } | Self::Direct { conversation, .. } => {
                conversation.as_ref()
            }
        }
    }

    /// Identity submitting the transactions
    pub fn sender(&self) -> &Arc<Identity> {
        match self {
            Self::Psk { sender, .. } | Self::Direct { sender, .. } => sender,
        }
    }
}

/// Resolves a participant address to a [`SendStrategy`]
pub trait Router: Send + Sync + fmt::Debug {
    /// `Ok(None)` when the participant cannot be reached at all
    fn resolve(&self, participant: &str) -> Result<Option<SendStrategy>, Error>;
}

/// Router backed by contact and conversation storage
pub struct StorageRouter {
    storage: Arc<dyn NotelineStorageProvider>,
    identities: Arc<IdentityRegistry>,
}

impl fmt::Debug for StorageRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageRouter")
            .field("backend", &self.storage.backend())
            .field("identities", &self.identities)
            .finish()
    }
}

impl StorageRouter {
    /// Create a router over `storage` and the local identities
    pub fn new(storage: Arc<dyn NotelineStorageProvider>, identities: Arc<IdentityRegistry>) -> Self {
        Self {
            storage,
            identities,
        }
    }
}

impl Router for StorageRouter {
    fn resolve(&self, participant: &str) -> Result<Option<SendStrategy>, Error> {
        let conversation = self.storage.find_conversation_by_participant(participant)?;
        let agent_id = conversation.as_ref().and_then(|c| c.agent_id.as_deref());
        let Some(sender) = self.identities.resolve(agent_id) else {
            return Ok(None);
        };

        let contact = self
            .storage
            .find_contact_by_address(participant)?
            .filter(|contact| contact.active);

        Ok(Some(match contact {
            Some(contact) => SendStrategy::Psk {
                contact,
                sender,
                conversation,
            },
            None => SendStrategy::Direct {
                sender,
                conversation,
            },
        }))
    }
}
