//! Dead-letter logger
//!
//! Sends that cannot be delivered are never silently dropped. Each one is
//! written as a structured `error` record under [`DEAD_LETTER_TARGET`] and
//! kept in a small in-memory ring for inspection.

use std::collections::VecDeque;

use noteline_storage_traits::unix_now;
use parking_lot::Mutex;
use serde::Serialize;

use crate::constant::DEAD_LETTER_TARGET;

/// A message that could not be delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadLetter {
    /// Intended recipient
    pub participant: String,
    /// Conversation the message belonged to, if known
    pub conversation_id: Option<String>,
    /// Session the message belonged to, if known
    pub session_id: Option<String>,
    /// Agent that tried to send, if any
    pub agent_id: Option<String>,
    /// Full content length in bytes
    pub content_length: usize,
    /// Leading characters of the content
    pub preview: String,
    /// Rendered failure
    pub error: String,
    /// Unix seconds
    pub recorded_at: u64,
}

/// Context attached to a dead letter
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadLetterContext<'a> {
    /// Conversation id
    pub conversation_id: Option<&'a str>,
    /// Session id
    pub session_id: Option<&'a str>,
    /// Agent id
    pub agent_id: Option<&'a str>,
}

/// Structured logger for undeliverable messages
#[derive(Debug)]
pub struct DeadLetterLogger {
    preview_chars: usize,
    capacity: usize,
    ring: Mutex<VecDeque<DeadLetter>>,
}

impl DeadLetterLogger {
    /// Keep `capacity` recent letters with `preview_chars` of content each
    pub fn new(preview_chars: usize, capacity: usize) -> Self {
        Self {
            preview_chars,
            capacity,
            ring: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    /// Log a failed send and remember it
    pub fn record<E>(
        &self,
        participant: &str,
        content: &str,
        context: DeadLetterContext<'_>,
        error: &E,
    ) -> DeadLetter
    where
        E: std::fmt::Display + ?Sized,
    {
        let letter = DeadLetter {
            participant: participant.to_string(),
            conversation_id: context.conversation_id.map(str::to_string),
            session_id: context.session_id.map(str::to_string),
            agent_id: context.agent_id.map(str::to_string),
            content_length: content.len(),
            preview: content.chars().take(self.preview_chars).collect(),
            error: error.to_string(),
            recorded_at: unix_now(),
        };

        tracing::error!(
            target: DEAD_LETTER_TARGET,
            participant = %letter.participant,
            conversation_id = letter.conversation_id.as_deref(),
            session_id = letter.session_id.as_deref(),
            agent_id = letter.agent_id.as_deref(),
            content_length = letter.content_length,
            preview = %letter.preview,
            error = %letter.error,
            "Message dead-lettered"
        );

        if self.capacity > 0 {
            let mut ring = self.ring.lock();
            if ring.len() == self.capacity {
                ring.pop_front();
            }
            ring.push_back(letter.clone());
        }
        letter
    }

    /// Remembered letters, oldest first
    pub fn recent(&self) -> Vec<DeadLetter> {
        self.ring.lock().iter().cloned().collect()
    }
}
