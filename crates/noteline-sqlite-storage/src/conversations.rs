//! Implementation of ConversationStorage trait for SQLite storage.

use noteline_storage_traits::conversations::ConversationStorage;
use noteline_storage_traits::conversations::error::ConversationError;
use noteline_storage_traits::conversations::types::Conversation;
use rusqlite::{OptionalExtension, params};

use crate::{NotelineSqliteStorage, db};

#[inline]
fn into_conversation_err<T>(e: T) -> ConversationError
where
    T: std::error::Error,
{
    ConversationError::DatabaseError(e.to_string())
}

impl ConversationStorage for NotelineSqliteStorage {
    fn save_conversation(&self, conversation: Conversation) -> Result<(), ConversationError> {
        if conversation.id.is_empty() {
            return Err(ConversationError::InvalidParameters(
                "Conversation id must not be empty".to_string(),
            ));
        }

        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, participant_address, agent_id, session_id, created_at)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    participant_address = excluded.participant_address,
                    agent_id = excluded.agent_id,
                    session_id = excluded.session_id,
                    created_at = excluded.created_at",
                params![
                    conversation.id,
                    conversation.participant_address,
                    conversation.agent_id,
                    conversation.session_id,
                    conversation.created_at,
                ],
            )
            .map_err(into_conversation_err)?;
            Ok(())
        })
    }

    fn find_conversation(&self, id: &str) -> Result<Option<Conversation>, ConversationError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM conversations WHERE id = ?")
                .map_err(into_conversation_err)?;

            stmt.query_row([id], db::row_to_conversation)
                .optional()
                .map_err(into_conversation_err)
        })
    }

    fn find_conversation_by_participant(
        &self,
        participant_address: &str,
    ) -> Result<Option<Conversation>, ConversationError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM conversations WHERE participant_address = ?
                     ORDER BY created_at DESC, rowid DESC LIMIT 1",
                )
                .map_err(into_conversation_err)?;

            stmt.query_row([participant_address], db::row_to_conversation)
                .optional()
                .map_err(into_conversation_err)
        })
    }
}
