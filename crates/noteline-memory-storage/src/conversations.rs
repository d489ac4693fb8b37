//! Memory-based storage implementation of the ConversationStorage trait

use noteline_storage_traits::conversations::ConversationStorage;
use noteline_storage_traits::conversations::error::ConversationError;
use noteline_storage_traits::conversations::types::Conversation;

use crate::NotelineMemoryStorage;

impl ConversationStorage for NotelineMemoryStorage {
    fn save_conversation(&self, conversation: Conversation) -> Result<(), ConversationError> {
        if conversation.id.is_empty() {
            return Err(ConversationError::InvalidParameters(
                "Conversation id must not be empty".to_string(),
            ));
        }

        let mut inner = self.inner.write();
        match inner
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation.id)
        {
            Some(existing) => *existing = conversation,
            None => inner.conversations.push(conversation),
        }
        Ok(())
    }

    fn find_conversation(&self, id: &str) -> Result<Option<Conversation>, ConversationError> {
        let inner = self.inner.read();
        Ok(inner.conversations.iter().find(|c| c.id == id).cloned())
    }

    fn find_conversation_by_participant(
        &self,
        participant_address: &str,
    ) -> Result<Option<Conversation>, ConversationError> {
        let inner = self.inner.read();
        // Later insertions win ties on created_at
        Ok(inner
            .conversations
            .iter()
            .enumerate()
            .filter(|(_, c)| c.participant_address == participant_address)
            .max_by_key(|(idx, c)| (c.created_at, *idx))
            .map(|(_, c)| c.clone()))
    }
}
