//! Row mapping helpers

use std::io::{Error as IoError, ErrorKind};
use std::str::FromStr;

use noteline_storage_traits::Secret;
use noteline_storage_traits::contacts::types::Contact;
use noteline_storage_traits::conversations::types::Conversation;
use noteline_storage_traits::events::types::{Direction, MessageEvent, StoredEvent};
use rusqlite::types::Type;
use rusqlite::{Error, Result as SqliteResult, Row};

#[inline]
fn map_invalid_text_data(msg: &str) -> Error {
    Error::FromSqlConversionFailure(
        0,
        Type::Text,
        Box::new(IoError::new(ErrorKind::InvalidData, msg)),
    )
}

/// Convert a row to a Contact struct
pub fn row_to_contact(row: &Row) -> SqliteResult<Contact> {
    let initial_secret: Vec<u8> = row.get("initial_secret")?;
    Ok(Contact {
        id: row.get("id")?,
        nickname: row.get("nickname")?,
        initial_secret: Secret::new(initial_secret),
        mobile_address: row.get("mobile_address")?,
        active: row.get("active")?,
        network: row.get("network")?,
        outbound_counter: row.get("outbound_counter")?,
        inbound_counter: row.get("inbound_counter")?,
        created_at: row.get("created_at")?,
    })
}

/// Convert a row to a Conversation struct
pub fn row_to_conversation(row: &Row) -> SqliteResult<Conversation> {
    Ok(Conversation {
        id: row.get("id")?,
        participant_address: row.get("participant_address")?,
        agent_id: row.get("agent_id")?,
        session_id: row.get("session_id")?,
        created_at: row.get("created_at")?,
    })
}

/// Convert a row to a StoredEvent struct
pub fn row_to_stored_event(row: &Row) -> SqliteResult<StoredEvent> {
    let direction: &str = row.get_ref("direction")?.as_str()?;
    let direction: Direction = Direction::from_str(direction)
        .map_err(|_| map_invalid_text_data("Invalid event direction"))?;

    Ok(StoredEvent {
        seq: row.get("seq")?,
        event: MessageEvent {
            participant: row.get("participant")?,
            content: row.get("content")?,
            direction,
            fee: row.get("fee")?,
            timestamp: row.get("timestamp")?,
        },
    })
}
