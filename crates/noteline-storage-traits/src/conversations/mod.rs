//! Conversations module
//!
//! A conversation pairs a remote participant with the local party that talks
//! to it: either an agent (with an optional session) or the owner, who has no
//! agent id. The transmitter uses it to pick the sending identity.

pub mod error;
pub mod types;

use self::error::ConversationError;
use self::types::Conversation;

/// Storage traits for the conversations module
pub trait ConversationStorage {
    /// Insert or update a conversation
    fn save_conversation(&self, conversation: Conversation) -> Result<(), ConversationError>;

    /// Find a conversation by id
    fn find_conversation(&self, id: &str) -> Result<Option<Conversation>, ConversationError>;

    /// Most recently created conversation with a participant
    fn find_conversation_by_participant(
        &self,
        participant_address: &str,
    ) -> Result<Option<Conversation>, ConversationError>;
}
