//! Types for the conversations module

/// Logical pairing of a remote participant with a local agent or the owner
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Conversation {
    /// Opaque identifier
    pub id: String,
    /// Ledger address of the remote participant
    pub participant_address: String,
    /// Owning agent, `None` for owner conversations
    pub agent_id: Option<String>,
    /// Owning session, if any
    pub session_id: Option<String>,
    /// Unix seconds when the conversation was created
    pub created_at: u64,
}

impl Conversation {
    /// Create an owner conversation (no agent, no session)
    pub fn owner<I, P>(id: I, participant_address: P) -> Self
    where
        I: Into<String>,
        P: Into<String>,
    {
        Self {
            id: id.into(),
            participant_address: participant_address.into(),
            agent_id: None,
            session_id: None,
            created_at: crate::unix_now(),
        }
    }

    /// Attach the conversation to an agent
    pub fn with_agent<A: Into<String>>(mut self, agent_id: A) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Attach the conversation to a session
    pub fn with_session<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}
