//! Types for the events module

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::EventError;

/// Which way a message event flowed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Received from the participant
    Inbound,
    /// Sent to the participant
    Outbound,
    /// Local status note about the participant
    Status,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Direction {
    /// Get as `&str`
    pub fn as_str(&self) -> &str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
            Self::Status => "status",
        }
    }
}

impl FromStr for Direction {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbound" => Ok(Self::Inbound),
            "outbound" => Ok(Self::Outbound),
            "status" => Ok(Self::Status),
            _ => Err(EventError::InvalidParameters(format!(
                "Invalid direction: {}",
                s
            ))),
        }
    }
}

/// A message event about to be appended to the log
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Ledger address of the remote participant
    pub participant: String,
    /// Plaintext content as delivered
    pub content: String,
    /// Direction of the event
    pub direction: Direction,
    /// Transmission fee, when known
    pub fee: Option<u64>,
    /// Unix seconds
    pub timestamp: u64,
}

impl MessageEvent {
    /// Create an event stamped with the current time
    pub fn now<P, C>(participant: P, content: C, direction: Direction, fee: Option<u64>) -> Self
    where
        P: Into<String>,
        C: Into<String>,
    {
        Self {
            participant: participant.into(),
            content: content.into(),
            direction,
            fee,
            timestamp: crate::unix_now(),
        }
    }
}

/// A message event as read back from the log
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Sequence number assigned on append
    pub seq: u64,
    /// The event itself
    #[serde(flatten)]
    pub event: MessageEvent,
}
